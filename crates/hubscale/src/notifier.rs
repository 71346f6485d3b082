//! change notification fan-out
//!
//! the [`StateNotifier`] carries every [`StateUpdate`] the registry produces
//! to the distribution layer, which turns them into network-map updates for
//! connected peers

use tokio::sync::broadcast;
use tracing::trace;

use hubscale_types::StateUpdate;

/// capacity of the broadcast channel.
const CHANNEL_CAPACITY: usize = 64;

/// broadcaster for registry change notifications
///
/// uses `tokio::sync::broadcast` for one-to-many delivery. a subscriber that
/// falls behind receives `RecvError::Lagged` and should re-read full state.
/// clones share the same channel.
#[derive(Clone)]
pub struct StateNotifier {
    sender: broadcast::Sender<StateUpdate>,
}

impl StateNotifier {
    /// create a notifier with no subscribers
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.sender.subscribe()
    }

    /// publish an update. returns how many subscribers received it.
    pub fn publish(&self, update: StateUpdate) -> usize {
        trace!(kind = update.kind(), nodes = ?update.node_ids(), "publishing state update");
        // no receivers is fine
        self.sender.send(update).unwrap_or(0)
    }

    /// publish an update if there is one.
    pub fn publish_opt(&self, update: Option<StateUpdate>) -> usize {
        update.map_or(0, |update| self.publish(update))
    }
}

impl Default for StateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubscale_types::NodeId;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn test_subscribe_receives_update() {
        let notifier = StateNotifier::new();
        let mut rx = notifier.subscribe();

        assert_eq!(notifier.publish(StateUpdate::peer_removed(NodeId::new(1))), 1);

        let update = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("subscriber should receive update")
            .unwrap();
        assert_eq!(update, StateUpdate::peer_removed(NodeId::new(1)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let notifier = StateNotifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.clone().subscribe();

        notifier.publish(StateUpdate::peer_removed(NodeId::new(2)));

        let r1 = timeout(Duration::from_millis(100), rx1.recv()).await;
        let r2 = timeout(Duration::from_millis(100), rx2.recv()).await;
        assert!(r1.is_ok(), "first subscriber should receive");
        assert!(r2.is_ok(), "second subscriber should receive");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let notifier = StateNotifier::new();
        assert_eq!(notifier.publish(StateUpdate::peer_removed(NodeId::new(3))), 0);
        assert_eq!(notifier.publish_opt(None), 0);
    }
}
