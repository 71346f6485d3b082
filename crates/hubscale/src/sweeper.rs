//! periodic lifecycle sweeps.
//!
//! deletes ephemeral nodes after they stay away longer than the configured
//! inactivity timeout and marks nodes whose key expiry has passed. every
//! sweep result is published on the [`StateNotifier`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use hubscale_state::State;
use tracing::{debug, error, info};

use crate::StateNotifier;

/// runs the registry's lifecycle sweeps on a timer.
#[derive(Clone)]
pub struct LifecycleSweeper {
    state: State,
    notifier: StateNotifier,
    /// inactivity timeout before an ephemeral node is deleted.
    inactivity: Duration,
}

impl LifecycleSweeper {
    /// create a sweeper using the lifecycle settings from the state's config.
    pub fn new(state: State, notifier: StateNotifier) -> Self {
        let inactivity = state.config().lifecycle.ephemeral_inactivity_timeout();
        Self {
            state,
            notifier,
            inactivity,
        }
    }

    /// run one ephemeral sweep. returns the number of nodes deleted.
    pub async fn sweep_ephemeral(&self) -> usize {
        match self.state.expire_ephemeral_nodes(self.inactivity).await {
            Ok(Some(update)) => {
                let deleted = update.node_ids().len();
                self.notifier.publish(update);
                deleted
            }
            Ok(None) => 0,
            Err(e) => {
                error!(error = %e, "ephemeral sweep failed");
                0
            }
        }
    }

    /// run one expiry sweep from `last_check`. returns the cursor for the
    /// next sweep; on failure the old cursor is kept.
    pub async fn sweep_expired(&self, last_check: DateTime<Utc>) -> DateTime<Utc> {
        match self.state.expire_expired_nodes(last_check).await {
            Ok((cursor, update)) => {
                self.notifier.publish_opt(update);
                cursor
            }
            Err(e) => {
                error!(error = %e, "expiry sweep failed");
                last_check
            }
        }
    }

    /// spawn the background ephemeral sweep.
    ///
    /// runs every `interval` until the returned handle is aborted.
    pub fn spawn_ephemeral(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                timeout_secs = self.inactivity.as_secs(),
                interval_secs = interval.as_secs(),
                "starting ephemeral node sweeper"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let deleted = self.sweep_ephemeral().await;
                if deleted > 0 {
                    debug!(deleted, "ephemeral sweep completed");
                }
            }
        })
    }

    /// spawn the background expiry sweep, starting from the unix epoch.
    pub fn spawn_expiry(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "starting expiry sweeper");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut last_check = DateTime::<Utc>::UNIX_EPOCH;
            loop {
                ticker.tick().await;
                last_check = self.sweep_expired(last_check).await;
            }
        })
    }
}
