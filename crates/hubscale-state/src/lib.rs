//! state management for hubscale
//!
//! the [`State`] struct is the entry point for every registry operation:
//! - registration from the pending cache and direct registration
//! - given name resolution
//! - key rotation, rename, tags, expiry and deletion
//! - route advertisement, enablement and primary election
//! - ephemeral and expiry sweeps
//!
//! every mutation runs in one write transaction and returns the
//! [`StateUpdate`](hubscale_types::StateUpdate) the distribution layer
//! should fan out.

mod error;
mod given_name;
mod lifecycle;
mod nodes;
mod registration;
mod registration_cache;
mod routes;
mod users;

pub use error::Error;
pub use given_name::{GIVEN_NAME_SUFFIX_LEN, GIVEN_NAME_TRIM_LEN};
pub use registration_cache::{PendingRegistration, RegistrationCache};

use std::sync::Arc;

use hubscale_db::HubscaleDb;
use hubscale_types::Config;

/// result type for state operations
pub type Result<T> = std::result::Result<T, Error>;

/// central state coordinator for hubscale
///
/// cheap to clone; clones share the database pool and the pending cache.
#[derive(Clone)]
pub struct State {
    config: Arc<Config>,
    db: HubscaleDb,
    registration_cache: RegistrationCache,
}

impl State {
    /// open the database described by `config` and build the state.
    pub async fn new(config: Config) -> Result<Self> {
        let db = HubscaleDb::new(&config).await?;
        Ok(Self::with_db(config, db))
    }

    /// build state over an already opened database.
    pub fn with_db(config: Config, db: HubscaleDb) -> Self {
        let registration_cache = RegistrationCache::new(config.registration.cache_expiration());
        Self {
            config: Arc::new(config),
            db,
            registration_cache,
        }
    }

    /// get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// the underlying database.
    pub fn db(&self) -> &HubscaleDb {
        &self.db
    }

    /// nodes waiting for authorization.
    pub fn registration_cache(&self) -> &RegistrationCache {
        &self.registration_cache
    }
}
