//! change notifications produced by registry mutations.
//!
//! every operation that changes what peers should see returns one of these.
//! the distribution layer turns them into incremental network-map updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeId};

/// a minimal per-node delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerChange {
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PeerChange {
    /// a patch carrying a new key expiry.
    pub fn key_expiry(node_id: NodeId, expiry: DateTime<Utc>) -> Self {
        Self {
            node_id,
            key_expiry: Some(expiry),
            last_seen: None,
        }
    }

    /// a patch carrying a new last-seen time.
    pub fn last_seen(node_id: NodeId, last_seen: DateTime<Utc>) -> Self {
        Self {
            node_id,
            key_expiry: None,
            last_seen: Some(last_seen),
        }
    }
}

/// what changed, shaped for the distribution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateUpdate {
    /// full records for nodes whose peers need the new state.
    PeerChanged { nodes: Vec<Node> },
    /// nodes that no longer exist.
    PeerRemoved { removed: Vec<NodeId> },
    /// narrow field updates that do not need a full record.
    PeerChangedPatch { patches: Vec<PeerChange> },
}

impl StateUpdate {
    /// a `PeerChanged` for a single node.
    pub fn peer_changed(node: Node) -> Self {
        StateUpdate::PeerChanged { nodes: vec![node] }
    }

    /// a `PeerRemoved` for a single node.
    pub fn peer_removed(id: NodeId) -> Self {
        StateUpdate::PeerRemoved { removed: vec![id] }
    }

    /// a `PeerChangedPatch` for a single node.
    pub fn patch(change: PeerChange) -> Self {
        StateUpdate::PeerChangedPatch {
            patches: vec![change],
        }
    }

    /// short name of the update kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StateUpdate::PeerChanged { .. } => "peer_changed",
            StateUpdate::PeerRemoved { .. } => "peer_removed",
            StateUpdate::PeerChangedPatch { .. } => "peer_changed_patch",
        }
    }

    /// ids of every node this update touches.
    pub fn node_ids(&self) -> Vec<NodeId> {
        match self {
            StateUpdate::PeerChanged { nodes } => nodes.iter().map(Node::id).collect(),
            StateUpdate::PeerRemoved { removed } => removed.clone(),
            StateUpdate::PeerChangedPatch { patches } => {
                patches.iter().map(|p| p.node_id).collect()
            }
        }
    }

    /// whether the update carries no nodes at all.
    pub fn is_empty(&self) -> bool {
        match self {
            StateUpdate::PeerChanged { nodes } => nodes.is_empty(),
            StateUpdate::PeerRemoved { removed } => removed.is_empty(),
            StateUpdate::PeerChangedPatch { patches } => patches.is_empty(),
        }
    }
}
