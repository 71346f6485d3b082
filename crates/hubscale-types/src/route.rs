//! routes a node advertises to the mesh.
//!
//! a route starts out advertised by the device. an administrator enables
//! it, and for non-exit prefixes exactly one offering node is elected primary.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// unique identifier for a route row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(pub u64);

impl RouteId {
    /// convert to i64 for database storage.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl From<i64> for RouteId {
    fn from(id: i64) -> Self {
        Self(id as u64)
    }
}

/// a prefix offered by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// unique identifier, 0 until persisted.
    pub id: RouteId,
    /// node offering this prefix.
    pub node_id: NodeId,
    /// the offered prefix.
    pub prefix: IpNet,
    /// the device currently announces this prefix.
    pub advertised: bool,
    /// an administrator approved this prefix.
    pub enabled: bool,
    /// this node is the elected router for the prefix.
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// create a freshly advertised, not yet enabled route.
    pub fn advertised(node_id: NodeId, prefix: IpNet) -> Self {
        let now = Utc::now();
        Self {
            id: RouteId(0),
            node_id,
            prefix,
            advertised: true,
            enabled: false,
            is_primary: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// whether this is a default route (`0.0.0.0/0` or `::/0`).
    pub fn is_exit_route(&self) -> bool {
        is_exit_route(&self.prefix)
    }
}

/// check if a prefix is an exit route (0.0.0.0/0 or ::/0).
pub fn is_exit_route(prefix: &IpNet) -> bool {
    prefix.prefix_len() == 0
}
