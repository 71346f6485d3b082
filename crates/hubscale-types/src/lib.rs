//! core types for hubscale - the node registry behind a mesh control plane.
//!
//! this crate provides the data structures shared by every other crate:
//! - [`Node`]: a registered device and its lifecycle fields
//! - [`Route`]: a subnet or exit route advertised by a node
//! - [`User`]: the owner namespace for nodes
//! - [`StateUpdate`]: the change notification emitted by every mutation
//! - [`Config`]: application configuration

mod config;
pub mod dns_label;
mod error;
mod keys;
mod node;
mod node_name;
mod route;
mod state_update;
mod tag;
pub mod test_utils;
mod user;

pub use config::{
    Config, DatabaseConfig, LifecycleConfig, RegistrationConfig, SqliteConfig, SweepFailurePolicy,
};
pub use error::Error;
pub use keys::{MachineKey, NodeKey};
pub use node::{Node, NodeBuilder, NodeId, RegisterMethod};
pub use node_name::{MAX_NODE_NAME_LEN, NodeName, NodeNameError};
pub use route::{Route, RouteId, is_exit_route};
pub use state_update::{PeerChange, StateUpdate};
pub use tag::{Tag, TagError};
pub use user::{User, UserId};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
