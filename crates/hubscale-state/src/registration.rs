//! node registration.
//!
//! a device moves from the pending cache to the node table when a user
//! authorizes it. addresses and the given name are chosen inside the same
//! write transaction that persists the node.

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use tracing::{debug, trace};

use hubscale_db::{Database, IpAllocator, query};
use hubscale_types::{MachineKey, Node, RegisterMethod, StateUpdate};

use crate::given_name::resolve_given_name;
use crate::{Error, Result, State};

impl State {
    /// authorize the pending registration for `machine_key` under `user_name`.
    ///
    /// the cache entry is evicted only after the node has been committed; on
    /// any error it stays in place so the flow can be retried.
    pub async fn register_from_cache(
        &self,
        machine_key: &MachineKey,
        user_name: &str,
        expiry: Option<DateTime<Utc>>,
        method: RegisterMethod,
    ) -> Result<(Node, StateUpdate)> {
        let mut node = self
            .registration_cache
            .get(machine_key)
            .await
            .ok_or_else(|| Error::NotFoundInCache(machine_key.clone()))?;

        let user = self
            .db
            .get_user_by_name(user_name)
            .await?
            .ok_or_else(|| Error::UserNotFound(user_name.to_string()))?;

        if node.id().is_persisted() && node.user_id() != Some(user.id) {
            return Err(Error::DifferentRegisteredUser {
                current: node.user_id(),
                requested: user.id,
            });
        }

        debug!(
            machine_key = %machine_key.short_string(),
            user = %user.name,
            method = method.as_str(),
            "registering node from pending cache"
        );

        node.set_user_id(user.id);
        if let Some(expiry) = expiry {
            node.set_expiry(expiry);
        }
        node.set_register_method(method);

        let registered = self.register_node(node).await?;
        self.registration_cache.remove(machine_key).await;
        Ok(registered)
    }

    /// persist a node, assigning addresses if it has none yet.
    pub async fn register_node(&self, node: Node) -> Result<(Node, StateUpdate)> {
        let txn = self.db.write().await?;
        let node = self.register_in(txn.conn(), node).await?;
        txn.commit().await?;

        trace!(
            node_id = %node.id(),
            given_name = %node.given_name(),
            "node registered"
        );
        Ok((node.clone(), StateUpdate::peer_changed(node)))
    }

    async fn register_in<C: ConnectionTrait>(&self, db: &C, mut node: Node) -> Result<Node> {
        let Some(user_id) = node.user_id() else {
            return Err(Error::MissingUser(node.machine_key().clone()));
        };

        if !node.id().is_persisted() {
            // a device that re-registers keeps its identity and addresses
            if let Some(existing) =
                query::node::get_node_by_machine_key(db, node.machine_key()).await?
            {
                if existing.user_id() != Some(user_id) {
                    return Err(Error::DifferentRegisteredUser {
                        current: existing.user_id(),
                        requested: user_id,
                    });
                }
                adopt_stored(&mut node, &existing);
            } else {
                let name = resolve_given_name(db, node.machine_key(), node.given_name()).await?;
                node.set_given_name(name);
            }
        }

        if node.has_ip_addresses() {
            debug!(node_id = %node.id(), "node already has addresses, re-authenticating");
            return Ok(query::node::save_node(db, &node).await?);
        }

        let mut allocator = IpAllocator::new(self.config.ip_prefixes.iter().copied());
        allocator.load_allocated(query::node::assigned_ips(db).await?);
        node.set_ip_addresses(allocator.allocate()?);

        Ok(query::node::save_node(db, &node).await?)
    }
}

/// carry the stored record's identity onto a fresh record for the same device.
///
/// forced tags and the ephemeral flag are set once and survive key rotation.
fn adopt_stored(node: &mut Node, existing: &Node) {
    node.set_id(existing.id());
    node.set_given_name(existing.given_name().clone());
    node.set_ip_addresses(existing.ip_addresses().to_vec());
    node.set_forced_tags(existing.forced_tags().to_vec());
    node.set_ephemeral(existing.ephemeral());
    node.set_auth_key_id(existing.auth_key_id());
    node.set_created_at(existing.created_at());
    if let (None, Some(last_seen)) = (node.last_seen(), existing.last_seen()) {
        node.set_last_seen(last_seen);
    }
}
