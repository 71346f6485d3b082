//! test utilities for creating test nodes and other fixtures.
//!
//! nodes built here get distinct keys and a hostname derived from the id,
//! so fixtures with different ids never collide on unique columns.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::{MachineKey, Node, NodeId, NodeKey, RegisterMethod, Route, Tag, UserId};

/// builder for creating test [`Node`] instances.
///
/// # example
/// ```
/// use hubscale_types::test_utils::TestNodeBuilder;
///
/// let node = TestNodeBuilder::new(1).build();
/// let ephemeral = TestNodeBuilder::new(0)
///     .with_hostname("ci-runner")
///     .ephemeral()
///     .build();
/// assert!(ephemeral.ephemeral());
/// ```
#[derive(Debug, Clone)]
pub struct TestNodeBuilder {
    id: u64,
    key_seed: u64,
    user_id: Option<UserId>,
    hostname: Option<String>,
    machine_key: Option<MachineKey>,
    ip_addresses: Vec<IpAddr>,
    tags: Vec<Tag>,
    routes: Vec<Route>,
    ephemeral: bool,
    expiry: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    register_method: RegisterMethod,
}

impl TestNodeBuilder {
    /// create a new builder with the given node id.
    ///
    /// id 0 produces an unpersisted node; its keys are still derived from
    /// `key_seed` (see [`Self::with_key_seed`]).
    pub fn new(id: u64) -> Self {
        Self {
            id,
            key_seed: id,
            user_id: None,
            hostname: None,
            machine_key: None,
            ip_addresses: vec![],
            tags: vec![],
            routes: vec![],
            ephemeral: false,
            expiry: None,
            last_seen: None,
            register_method: RegisterMethod::default(),
        }
    }

    /// derive keys from this seed instead of the id.
    pub fn with_key_seed(mut self, seed: u64) -> Self {
        self.key_seed = seed;
        self
    }

    /// set the owning user.
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// set a custom hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// set an explicit machine key.
    pub fn with_machine_key(mut self, key: MachineKey) -> Self {
        self.machine_key = Some(key);
        self
    }

    /// set assigned addresses.
    pub fn with_ip_addresses(mut self, ips: Vec<IpAddr>) -> Self {
        self.ip_addresses = ips;
        self
    }

    /// set forced tags.
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// attach routes.
    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = routes;
        self
    }

    /// mark the node ephemeral.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// set the key expiry.
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// set the last-seen time.
    pub fn with_last_seen(mut self, last_seen: DateTime<Utc>) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    /// set the registration method.
    pub fn with_register_method(mut self, method: RegisterMethod) -> Self {
        self.register_method = method;
        self
    }

    /// build the node.
    pub fn build(self) -> Node {
        let seed = self.key_seed.to_be_bytes();
        let machine_key = self
            .machine_key
            .unwrap_or_else(|| MachineKey::from_bytes(key_bytes(0x4d, &seed)));
        let node_key = NodeKey::from_bytes(key_bytes(0x4e, &seed));
        let hostname = self
            .hostname
            .unwrap_or_else(|| format!("test-node-{}", self.key_seed));

        let mut builder = Node::builder(machine_key, node_key, hostname)
            .id(NodeId::new(self.id))
            .ip_addresses(self.ip_addresses)
            .forced_tags(self.tags)
            .routes(self.routes)
            .ephemeral(self.ephemeral)
            .register_method(self.register_method);

        if let Some(user_id) = self.user_id {
            builder = builder.user_id(user_id);
        }
        if let Some(expiry) = self.expiry {
            builder = builder.expiry(expiry);
        }
        if let Some(last_seen) = self.last_seen {
            builder = builder.last_seen(last_seen);
        }

        builder.build()
    }
}

fn key_bytes(tag: u8, seed: &[u8; 8]) -> Vec<u8> {
    let mut bytes = vec![tag; 32];
    bytes[24..].copy_from_slice(seed);
    bytes
}
