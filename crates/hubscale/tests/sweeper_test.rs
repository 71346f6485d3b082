//! lifecycle sweeper integration tests.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use hubscale::{LifecycleSweeper, StateNotifier};
use hubscale_db::HubscaleDb;
use hubscale_state::State;
use hubscale_types::test_utils::TestNodeBuilder;
use hubscale_types::{Config, Node, StateUpdate};
use tokio::time::timeout;

async fn setup() -> (State, StateNotifier, LifecycleSweeper) {
    let mut config = Config::default();
    config.lifecycle.ephemeral_inactivity_timeout_secs = 60;

    let db = HubscaleDb::new_in_memory().await.unwrap();
    let state = State::with_db(config, db);
    let notifier = StateNotifier::new();
    let sweeper = LifecycleSweeper::new(state.clone(), notifier.clone());
    (state, notifier, sweeper)
}

async fn register(state: &State, node: Node) -> Node {
    let user = match state.get_user_by_name("sweeper").await {
        Ok(user) => user,
        Err(_) => state.create_user("sweeper").await.unwrap(),
    };
    let mut node = node;
    node.set_user_id(user.id);
    state.register_node(node).await.unwrap().0
}

#[tokio::test]
async fn test_ephemeral_sweep_publishes_removals() {
    let (state, notifier, sweeper) = setup().await;
    let mut rx = notifier.subscribe();

    let stale = register(
        &state,
        TestNodeBuilder::new(0)
            .with_key_seed(1)
            .ephemeral()
            .with_last_seen(Utc::now() - TimeDelta::minutes(10))
            .build(),
    )
    .await;
    register(
        &state,
        TestNodeBuilder::new(0)
            .with_key_seed(2)
            .ephemeral()
            .with_last_seen(Utc::now())
            .build(),
    )
    .await;

    assert_eq!(sweeper.sweep_ephemeral().await, 1);

    let update = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("sweep result should be published")
        .unwrap();
    assert_eq!(update, StateUpdate::peer_removed(stale.id()));

    // a sweep with nothing to do publishes nothing
    assert_eq!(sweeper.sweep_ephemeral().await, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_expiry_sweep_carries_cursor() {
    let (state, notifier, sweeper) = setup().await;
    let mut rx = notifier.subscribe();

    let node = register(
        &state,
        TestNodeBuilder::new(0)
            .with_key_seed(1)
            .with_expiry(Utc::now() - TimeDelta::seconds(5))
            .build(),
    )
    .await;

    let cursor = sweeper.sweep_expired(DateTime::<Utc>::UNIX_EPOCH).await;
    let update = rx.try_recv().expect("expiry patch should be published");
    assert_eq!(update.node_ids(), vec![node.id()]);
    assert_eq!(update.kind(), "peer_changed_patch");

    let next = sweeper.sweep_expired(cursor).await;
    assert!(next >= cursor);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_spawned_sweeper_runs_on_interval() {
    let (state, notifier, sweeper) = setup().await;
    let mut rx = notifier.subscribe();

    let stale = register(
        &state,
        TestNodeBuilder::new(0)
            .with_key_seed(1)
            .ephemeral()
            .with_last_seen(Utc::now() - TimeDelta::minutes(10))
            .build(),
    )
    .await;

    let handle = sweeper.spawn_ephemeral(Duration::from_millis(10));
    let update = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("background sweep should publish")
        .unwrap();
    handle.abort();

    assert_eq!(update, StateUpdate::peer_removed(stale.id()));
    assert!(state.list_nodes().await.unwrap().is_empty());
}
