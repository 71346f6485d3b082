//! node queries and administrative mutations.

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use tracing::{debug, info};

use hubscale_db::query;
use hubscale_types::{
    MachineKey, Node, NodeId, NodeKey, NodeName, PeerChange, StateUpdate, Tag, UserId,
};

use crate::{Error, Result, State};

/// load a node or fail with `NodeNotFound`.
pub(crate) async fn require_node<C: ConnectionTrait>(db: &C, id: NodeId) -> Result<Node> {
    query::node::get_node(db, id)
        .await?
        .ok_or(Error::NodeNotFound(id))
}

impl State {
    // ─── Queries ─────────────────────────────────────────────────────────────

    /// get a node by id.
    pub async fn get_node(&self, id: NodeId) -> Result<Node> {
        let txn = self.db.read().await?;
        require_node(txn.conn(), id).await
    }

    /// get a node by machine key.
    pub async fn get_node_by_machine_key(&self, key: &MachineKey) -> Result<Option<Node>> {
        let txn = self.db.read().await?;
        Ok(query::node::get_node_by_machine_key(txn.conn(), key).await?)
    }

    /// get a node by its current node key.
    pub async fn get_node_by_node_key(&self, key: &NodeKey) -> Result<Option<Node>> {
        let txn = self.db.read().await?;
        Ok(query::node::get_node_by_node_key(txn.conn(), key).await?)
    }

    /// every persisted node, ordered by id.
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let txn = self.db.read().await?;
        Ok(query::node::list_nodes(txn.conn()).await?)
    }

    /// nodes owned by a user, ordered by id.
    pub async fn list_nodes_for_user(&self, user_id: UserId) -> Result<Vec<Node>> {
        let txn = self.db.read().await?;
        Ok(query::node::list_nodes_for_user(txn.conn(), user_id).await?)
    }

    /// every node other than `id`, ordered by id.
    pub async fn list_peers(&self, id: NodeId) -> Result<Vec<Node>> {
        let txn = self.db.read().await?;
        Ok(query::node::list_peers(txn.conn(), id).await?)
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// replace the node (session) key.
    pub async fn set_node_key(&self, id: NodeId, key: &NodeKey) -> Result<StateUpdate> {
        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        query::node::set_node_key(txn.conn(), id, key).await?;
        let node = require_node(txn.conn(), id).await?;
        txn.commit().await?;

        debug!(node_id = %id, "node key rotated");
        Ok(StateUpdate::peer_changed(node))
    }

    /// replace the machine key.
    pub async fn set_machine_key(&self, id: NodeId, key: &MachineKey) -> Result<StateUpdate> {
        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        query::node::set_machine_key(txn.conn(), id, key).await?;
        let node = require_node(txn.conn(), id).await?;
        txn.commit().await?;

        debug!(node_id = %id, machine_key = %key.short_string(), "machine key rotated");
        Ok(StateUpdate::peer_changed(node))
    }

    /// give a node a new name.
    ///
    /// the name must already be a valid dns label; it is not normalised.
    pub async fn rename_node(&self, id: NodeId, new_name: &str) -> Result<StateUpdate> {
        let name = NodeName::new(new_name)?;

        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        if let Some(holder) = query::node::get_node_by_given_name(txn.conn(), name.as_str()).await?
        {
            if holder.id() != id {
                return Err(Error::GivenNameInUse(name.into_inner()));
            }
        }
        query::node::set_given_name(txn.conn(), id, &name).await?;
        let node = require_node(txn.conn(), id).await?;
        txn.commit().await?;

        info!(node_id = %id, given_name = %name, "node renamed");
        Ok(StateUpdate::peer_changed(node))
    }

    /// set the key expiry.
    pub async fn set_expiry(&self, id: NodeId, expiry: DateTime<Utc>) -> Result<StateUpdate> {
        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        query::node::set_expiry(txn.conn(), id, expiry).await?;
        txn.commit().await?;

        debug!(node_id = %id, %expiry, "node expiry set");
        Ok(StateUpdate::patch(PeerChange::key_expiry(id, expiry)))
    }

    /// replace the forced tags. duplicates are dropped.
    ///
    /// an empty list leaves the node untouched and returns `None`.
    pub async fn set_tags(&self, id: NodeId, tags: Vec<Tag>) -> Result<Option<StateUpdate>> {
        if tags.is_empty() {
            return Ok(None);
        }

        let txn = self.db.write().await?;
        let mut node = require_node(txn.conn(), id).await?;
        node.set_forced_tags(tags);
        query::node::set_forced_tags(txn.conn(), id, node.forced_tags()).await?;
        let node = require_node(txn.conn(), id).await?;
        txn.commit().await?;

        debug!(node_id = %id, tags = ?node.forced_tags(), "node tags set");
        Ok(Some(StateUpdate::peer_changed(node)))
    }

    /// record that the node was seen at `at`.
    pub async fn update_last_seen(&self, id: NodeId, at: DateTime<Utc>) -> Result<StateUpdate> {
        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        query::node::set_last_seen(txn.conn(), id, at).await?;
        txn.commit().await?;

        Ok(StateUpdate::patch(PeerChange::last_seen(id, at)))
    }

    /// hard-delete a node and its routes.
    pub async fn delete_node(&self, id: NodeId) -> Result<StateUpdate> {
        let txn = self.db.write().await?;
        require_node(txn.conn(), id).await?;
        query::node::delete_node(txn.conn(), id).await?;
        txn.commit().await?;

        info!(node_id = %id, "node deleted");
        Ok(StateUpdate::peer_removed(id))
    }
}
