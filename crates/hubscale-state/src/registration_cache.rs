//! pending registrations awaiting authorization.
//!
//! a node lands here when it first contacts the control plane and waits
//! until a user authorizes it. entries expire after a fixed ttl and are
//! never visible to queries over persisted nodes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use hubscale_types::{MachineKey, Node};

/// a node waiting for a user to authorize it.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    node: Node,
    expires_at: Instant,
}

impl PendingRegistration {
    /// the node as it will be registered.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// ttl-bounded map from machine key to pending node.
///
/// clones share the same entries.
#[derive(Clone)]
pub struct RegistrationCache {
    entries: Arc<RwLock<HashMap<MachineKey, PendingRegistration>>>,
    ttl: Duration,
}

impl RegistrationCache {
    /// create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// add or replace the pending entry for the node's machine key.
    pub async fn insert(&self, node: Node) {
        let key = node.machine_key().clone();
        debug!(machine_key = %key.short_string(), "caching pending registration");
        let entry = PendingRegistration {
            node,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// get the pending node for a machine key, unless it has expired.
    pub async fn get(&self, key: &MachineKey) -> Option<Node> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(Instant::now()))
            .map(|entry| entry.node.clone())
    }

    /// remove the entry for a machine key.
    pub async fn remove(&self, key: &MachineKey) -> Option<Node> {
        self.entries.write().await.remove(key).map(|e| e.node)
    }

    /// number of entries, expired ones included until the next purge.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// drop every expired entry. returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// spawn the background purge task.
    ///
    /// runs every `interval` until the returned handle is aborted.
    pub fn spawn_cleanup(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                ttl_secs = self.ttl.as_secs(),
                interval_secs = interval.as_secs(),
                "starting registration cache cleanup"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "purged expired pending registrations");
                }
            }
        })
    }
}
