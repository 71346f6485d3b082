//! configuration types for hubscale

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

use crate::Error;

/// main configuration for hubscale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// prefixes addresses are allocated from, one address per prefix per node.
    pub ip_prefixes: Vec<IpNet>,

    /// database configuration.
    pub database: DatabaseConfig,

    /// pending registration cache.
    pub registration: RegistrationConfig,

    /// ephemeral and expiry sweeps.
    pub lifecycle: LifecycleConfig,

    /// log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip_prefixes: vec![
                IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(100, 64, 0, 0), 10)),
                IpNet::V6(Ipv6Net::new_assert(
                    Ipv6Addr::new(0xfd7a, 0x115c, 0xa1e0, 0, 0, 0, 0, 0),
                    48,
                )),
            ],
            database: DatabaseConfig::default(),
            registration: RegistrationConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// reject configurations the registry cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.ip_prefixes.is_empty() {
            return Err(Error::Config(
                "at least one ip prefix is required".to_string(),
            ));
        }
        if self.registration.cache_expiration_secs == 0 {
            return Err(Error::Config(
                "registration.cache_expiration_secs must be greater than zero".to_string(),
            ));
        }
        if self.registration.cache_cleanup_secs == 0 {
            return Err(Error::Config(
                "registration.cache_cleanup_secs must be greater than zero".to_string(),
            ));
        }
        if self.lifecycle.ephemeral_sweep_interval_secs == 0
            || self.lifecycle.expiry_sweep_interval_secs == 0
        {
            return Err(Error::Config(
                "lifecycle sweep intervals must be greater than zero".to_string(),
            ));
        }
        match self.database.db_type.as_str() {
            "sqlite" | "postgres" | "postgresql" => Ok(()),
            other => Err(Error::Config(format!("unsupported database type: {other}"))),
        }
    }
}

/// database configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,

    /// sqlite-specific options.
    pub sqlite: SqliteConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "/var/lib/hubscale/db.sqlite".to_string(),
            sqlite: SqliteConfig::default(),
        }
    }
}

/// sqlite options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// enable write-ahead logging.
    pub write_ahead_log: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            write_ahead_log: true,
        }
    }
}

/// pending registration cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// how long a pending registration stays claimable, in seconds.
    pub cache_expiration_secs: u64,

    /// how often expired entries are purged, in seconds.
    pub cache_cleanup_secs: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            cache_expiration_secs: 900, // 15 minutes
            cache_cleanup_secs: 1200,   // 20 minutes
        }
    }
}

impl RegistrationConfig {
    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_secs)
    }
}

/// what the ephemeral sweep does when listing one user's nodes fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepFailurePolicy {
    /// roll back the whole pass and report the error.
    #[default]
    Abort,
    /// skip that user and keep sweeping the rest.
    Continue,
}

/// node lifecycle sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// ephemeral nodes unseen for longer than this are deleted, in seconds.
    pub ephemeral_inactivity_timeout_secs: u64,

    /// how often the ephemeral sweep runs, in seconds.
    pub ephemeral_sweep_interval_secs: u64,

    /// how often the key expiry sweep runs, in seconds.
    pub expiry_sweep_interval_secs: u64,

    /// behaviour when listing a user's nodes fails during the ephemeral sweep.
    pub listing_failure: SweepFailurePolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ephemeral_inactivity_timeout_secs: 1800, // 30 minutes
            ephemeral_sweep_interval_secs: 60,
            expiry_sweep_interval_secs: 5,
            listing_failure: SweepFailurePolicy::Abort,
        }
    }
}

impl LifecycleConfig {
    pub fn ephemeral_inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.ephemeral_inactivity_timeout_secs)
    }

    pub fn ephemeral_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.ephemeral_sweep_interval_secs)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }
}
