//! time-based node lifecycle.
//!
//! two sweeps, both scheduled by the caller:
//! - ephemeral nodes that have been gone longer than the inactivity
//!   threshold are deleted
//! - nodes whose key expiry passed since the previous sweep are stamped
//!   expired and reported as patches
//!
//! each sweep runs in one write transaction. a failure on a single node is
//! logged and the sweep moves on. the ephemeral sweep walks users one at a
//! time and its listing failures follow [`SweepFailurePolicy`]; the expiry
//! sweep reads every node at once and fails as a whole.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::{error, info, warn};

use hubscale_db::query;
use hubscale_types::{Node, NodeId, PeerChange, StateUpdate, SweepFailurePolicy, User};

use crate::{Result, State};

/// delete a node inside a savepoint so a failure leaves the sweep usable.
async fn delete_isolated(txn: &DatabaseTransaction, id: NodeId) -> Result<()> {
    let savepoint = txn.begin().await.map_err(hubscale_db::Error::from)?;
    query::node::delete_node(&savepoint, id).await?;
    savepoint.commit().await.map_err(hubscale_db::Error::from)?;
    Ok(())
}

/// stamp a node's expiry inside a savepoint.
async fn expire_isolated(txn: &DatabaseTransaction, id: NodeId, at: DateTime<Utc>) -> Result<()> {
    let savepoint = txn.begin().await.map_err(hubscale_db::Error::from)?;
    query::node::set_expiry(&savepoint, id, at).await?;
    savepoint.commit().await.map_err(hubscale_db::Error::from)?;
    Ok(())
}

fn is_inactive_ephemeral(node: &Node, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    if !node.ephemeral() {
        return false;
    }
    match node.last_seen() {
        Some(last_seen) => last_seen
            .checked_add_signed(threshold)
            .is_some_and(|deadline| now > deadline),
        None => false,
    }
}

impl State {
    /// list a user's nodes for the ephemeral sweep.
    ///
    /// `Ok(None)` means the user is skipped under
    /// [`SweepFailurePolicy::Continue`].
    async fn sweep_listing(
        &self,
        txn: &DatabaseTransaction,
        user: &User,
    ) -> Result<Option<Vec<Node>>> {
        match query::node::list_nodes_for_user(txn, user.id).await {
            Ok(nodes) => Ok(Some(nodes)),
            Err(e) => match self.config.lifecycle.listing_failure {
                SweepFailurePolicy::Abort => {
                    error!(user_id = %user.id, error = %e, "listing nodes failed, aborting sweep");
                    Err(e.into())
                }
                SweepFailurePolicy::Continue => {
                    warn!(user_id = %user.id, error = %e, "listing nodes failed, skipping user");
                    Ok(None)
                }
            },
        }
    }

    /// delete ephemeral nodes not seen for longer than `inactivity`.
    ///
    /// returns a `PeerRemoved` with the deleted ids, or `None` when nothing
    /// was removed.
    pub async fn expire_ephemeral_nodes(
        &self,
        inactivity: Duration,
    ) -> Result<Option<StateUpdate>> {
        let now = Utc::now();
        let threshold = TimeDelta::from_std(inactivity).unwrap_or(TimeDelta::MAX);

        let txn = self.db.write().await?;
        let conn = txn.conn();
        let mut removed = Vec::new();

        for user in query::user::list_users(conn).await? {
            let Some(nodes) = self.sweep_listing(conn, &user).await? else {
                continue;
            };
            for node in nodes {
                if !is_inactive_ephemeral(&node, threshold, now) {
                    continue;
                }
                match delete_isolated(conn, node.id()).await {
                    Ok(()) => {
                        info!(
                            node_id = %node.id(),
                            hostname = node.hostname(),
                            "deleted inactive ephemeral node"
                        );
                        removed.push(node.id());
                    }
                    Err(e) => {
                        error!(node_id = %node.id(), error = %e, "failed to delete ephemeral node");
                    }
                }
            }
        }

        txn.commit().await?;

        if removed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(StateUpdate::PeerRemoved { removed }))
        }
    }

    /// mark nodes whose key expired after `last_check`.
    ///
    /// each such node has its expiry set to the sweep start time. returns
    /// that start time, to be passed as `last_check` next time, and a
    /// `PeerChangedPatch` for the stamped nodes or `None`.
    pub async fn expire_expired_nodes(
        &self,
        last_check: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, Option<StateUpdate>)> {
        let started = Utc::now();

        let txn = self.db.write().await?;
        let conn = txn.conn();
        let mut patches = Vec::new();

        for node in query::node::list_nodes(conn).await? {
            let Some(expiry) = node.expiry() else {
                continue;
            };
            if !node.is_expired_at(started) || expiry <= last_check {
                continue;
            }
            match expire_isolated(conn, node.id(), started).await {
                Ok(()) => {
                    info!(node_id = %node.id(), %expiry, "node key expired");
                    patches.push(PeerChange::key_expiry(node.id(), started));
                }
                Err(e) => {
                    error!(node_id = %node.id(), error = %e, "failed to expire node");
                }
            }
        }

        txn.commit().await?;

        if patches.is_empty() {
            Ok((started, None))
        } else {
            Ok((started, Some(StateUpdate::PeerChangedPatch { patches })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use hubscale_types::test_utils::TestNodeBuilder;
    use hubscale_types::Config;
    use sea_orm::ConnectionTrait;

    const HOUR: Duration = Duration::from_secs(3600);

    fn ago(secs: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::seconds(secs)
    }

    #[tokio::test]
    async fn test_ephemeral_sweep_removes_only_stale_ephemeral_nodes() {
        let state = test_support::state().await;
        let user = test_support::user(&state, "ci").await;

        let stale = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(1)
                .ephemeral()
                .with_last_seen(ago(7200))
                .build(),
        )
        .await;
        let fresh = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(2)
                .ephemeral()
                .with_last_seen(ago(60))
                .build(),
        )
        .await;
        let never_seen = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0).with_key_seed(3).ephemeral().build(),
        )
        .await;
        let permanent = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(4)
                .with_last_seen(ago(7200))
                .build(),
        )
        .await;

        let update = state.expire_ephemeral_nodes(HOUR).await.unwrap();
        assert_eq!(update, Some(StateUpdate::peer_removed(stale.id())));

        let remaining: Vec<_> = state
            .list_nodes()
            .await
            .unwrap()
            .iter()
            .map(Node::id)
            .collect();
        assert_eq!(remaining, vec![fresh.id(), never_seen.id(), permanent.id()]);

        // nothing left to do
        assert!(state.expire_ephemeral_nodes(HOUR).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ephemeral_sweep_cascades_routes() {
        let state = test_support::state().await;
        let user = test_support::user(&state, "ci").await;
        let node = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(1)
                .ephemeral()
                .with_last_seen(ago(7200))
                .build(),
        )
        .await;
        state
            .save_advertised_routes(node.id(), &["10.0.1.0/24".parse().unwrap()])
            .await
            .unwrap();

        state.expire_ephemeral_nodes(HOUR).await.unwrap().unwrap();

        let txn = state.db().read().await.unwrap();
        assert!(
            query::route::list_for_node(txn.conn(), node.id())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_expiry_sweep_cursor() {
        let state = test_support::state().await;
        let user = test_support::user(&state, "alice").await;

        let expired = test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(1)
                .with_expiry(ago(10))
                .build(),
        )
        .await;
        test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(2)
                .with_expiry(Utc::now() + TimeDelta::hours(1))
                .build(),
        )
        .await;
        test_support::registered(&state, &user, TestNodeBuilder::new(0).with_key_seed(3).build())
            .await;

        let (cursor, update) = state
            .expire_expired_nodes(DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(
            update,
            Some(StateUpdate::patch(PeerChange::key_expiry(
                expired.id(),
                cursor
            )))
        );
        assert_eq!(state.get_node(expired.id()).await.unwrap().expiry(), Some(cursor));

        // the stamped node is not reported again
        let (next, update) = state.expire_expired_nodes(cursor).await.unwrap();
        assert!(update.is_none());
        assert!(next >= cursor);
    }

    #[tokio::test]
    async fn test_expiry_sweep_covers_every_owner() {
        let state = test_support::state().await;
        let alice = test_support::user(&state, "alice").await;
        let bob = test_support::user(&state, "bob").await;

        let a = test_support::registered(
            &state,
            &alice,
            TestNodeBuilder::new(0)
                .with_key_seed(1)
                .with_expiry(ago(10))
                .build(),
        )
        .await;
        let b = test_support::registered(
            &state,
            &bob,
            TestNodeBuilder::new(0)
                .with_key_seed(2)
                .with_expiry(ago(10))
                .build(),
        )
        .await;

        let (cursor, update) = state
            .expire_expired_nodes(DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap();
        let update = update.expect("both nodes should be reported");
        assert_eq!(update.node_ids(), vec![a.id(), b.id()]);
        for id in [a.id(), b.id()] {
            assert_eq!(state.get_node(id).await.unwrap().expiry(), Some(cursor));
        }
    }

    #[tokio::test]
    async fn test_expiry_sweep_skips_expiries_before_cursor() {
        let state = test_support::state().await;
        let user = test_support::user(&state, "alice").await;
        test_support::registered(
            &state,
            &user,
            TestNodeBuilder::new(0)
                .with_key_seed(1)
                .with_expiry(ago(3600))
                .build(),
        )
        .await;

        let (_, update) = state.expire_expired_nodes(ago(60)).await.unwrap();
        assert!(update.is_none());
    }

    /// a route row whose prefix cannot be parsed makes listing that user's
    /// nodes fail.
    async fn corrupt_listing(state: &State, node_id: NodeId) {
        let txn = state.db().write().await.unwrap();
        txn.conn()
            .execute_unprepared(&format!(
                "INSERT INTO routes (node_id, prefix, advertised, enabled, is_primary, created_at, updated_at) \
                 VALUES ({}, 'not-a-prefix', 1, 0, 0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                node_id.as_i64()
            ))
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    async fn setup_listing_failure(config: Config) -> (State, Node) {
        let state = test_support::state_with(config).await;
        let broken_user = test_support::user(&state, "broken").await;
        let ok_user = test_support::user(&state, "ok").await;

        let broken = test_support::registered(
            &state,
            &broken_user,
            TestNodeBuilder::new(0).with_key_seed(1).build(),
        )
        .await;
        corrupt_listing(&state, broken.id()).await;

        let stale = test_support::registered(
            &state,
            &ok_user,
            TestNodeBuilder::new(0)
                .with_key_seed(2)
                .ephemeral()
                .with_last_seen(ago(7200))
                .build(),
        )
        .await;
        (state, stale)
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_by_default() {
        let (state, stale) = setup_listing_failure(Config::default()).await;

        assert!(state.expire_ephemeral_nodes(HOUR).await.is_err());

        let txn = state.db().read().await.unwrap();
        assert!(
            query::node::get_node(txn.conn(), stale.id())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_listing_failure_can_skip_user() {
        let mut config = Config::default();
        config.lifecycle.listing_failure = SweepFailurePolicy::Continue;
        let (state, stale) = setup_listing_failure(config).await;

        let update = state.expire_ephemeral_nodes(HOUR).await.unwrap();
        assert_eq!(update, Some(StateUpdate::peer_removed(stale.id())));
    }
}
