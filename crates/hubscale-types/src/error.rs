//! error types for hubscale-types

use thiserror::Error;

/// errors that can occur in hubscale-types
#[derive(Debug, Error)]
pub enum Error {
    /// invalid key format
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
