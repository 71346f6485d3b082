//! state management error types

use ipnet::IpNet;
use thiserror::Error;

use hubscale_types::{MachineKey, NodeId, NodeNameError, UserId};

/// errors that can occur in state operations
#[derive(Debug, Error)]
pub enum Error {
    /// node not found
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// no pending registration for this machine key
    #[error("no pending registration for {0}")]
    NotFoundInCache(MachineKey),

    /// user not found
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// a node cannot be registered without an owning user
    #[error("node {0} has no owning user")]
    MissingUser(MachineKey),

    /// the node is already registered to another user
    #[error("node is registered to a different user (current owner {current:?}, requested {requested})")]
    DifferentRegisteredUser {
        /// the owner on record
        current: Option<UserId>,
        /// the user the caller tried to register under
        requested: UserId,
    },

    /// the node does not advertise the prefix it was asked to enable
    #[error("route not available on node {node_id}: {prefix}")]
    RouteNotAvailable {
        /// the node
        node_id: NodeId,
        /// the prefix that is not advertised
        prefix: IpNet,
    },

    /// a route prefix could not be parsed
    #[error("invalid prefix {0:?}")]
    InvalidPrefix(String),

    /// every address in a configured prefix is taken
    #[error("address pool exhausted for prefix {0}")]
    AddressPoolExhausted(IpNet),

    /// the name is not a valid dns label
    #[error("invalid name: {0}")]
    InvalidName(#[from] NodeNameError),

    /// another node already holds this given name
    #[error("given name already in use: {0}")]
    GivenNameInUse(String),

    /// a unique value (user name, machine key) is already taken
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// database error
    #[error("database error: {0}")]
    Database(String),
}

impl From<hubscale_db::Error> for Error {
    fn from(err: hubscale_db::Error) -> Self {
        match err {
            hubscale_db::Error::AddressPoolExhausted(prefix) => Error::AddressPoolExhausted(prefix),
            hubscale_db::Error::AlreadyExists(what) => Error::AlreadyExists(what),
            other => Error::Database(other.to_string()),
        }
    }
}
