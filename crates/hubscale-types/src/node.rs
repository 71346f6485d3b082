//! node type representing a device registered with the control plane.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::keys::{MachineKey, NodeKey};
use crate::node_name::NodeName;
use crate::route::Route;
use crate::tag::Tag;
use crate::user::UserId;

/// unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// get the raw u64 value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// convert to i64 for database storage.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// whether this id was assigned by storage.
    pub fn is_persisted(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id as u64)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// how a node was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegisterMethod {
    /// registered via pre-authentication key.
    #[default]
    AuthKey,
    /// registered via oidc.
    Oidc,
    /// registered via cli.
    Cli,
}

impl RegisterMethod {
    /// storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RegisterMethod::AuthKey => "authkey",
            RegisterMethod::Oidc => "oidc",
            RegisterMethod::Cli => "cli",
        }
    }

    /// parse the storage representation, defaulting to auth key.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "oidc" => RegisterMethod::Oidc,
            "cli" => RegisterMethod::Cli,
            _ => RegisterMethod::AuthKey,
        }
    }
}

/// a device in the mesh.
///
/// a node with id 0 has not been persisted yet; this is the shape held in
/// the registration cache while a login is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) machine_key: MachineKey,
    pub(crate) node_key: NodeKey,
    pub(crate) user_id: Option<UserId>,
    pub(crate) hostname: String,
    pub(crate) given_name: NodeName,
    pub(crate) ip_addresses: Vec<IpAddr>,
    pub(crate) forced_tags: Vec<Tag>,
    pub(crate) auth_key_id: Option<u64>,
    pub(crate) ephemeral: bool,
    pub(crate) expiry: Option<DateTime<Utc>>,
    pub(crate) last_seen: Option<DateTime<Utc>>,
    pub(crate) register_method: RegisterMethod,
    #[serde(default)]
    pub(crate) routes: Vec<Route>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// builder for constructing Node values
///
/// required fields: machine_key, node_key, hostname.
/// the given name defaults to the sanitised hostname.
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(machine_key: MachineKey, node_key: NodeKey, hostname: String) -> Self {
        let given_name = NodeName::sanitise(&hostname).unwrap_or_default();
        let now = Utc::now();
        Self {
            node: Node {
                id: NodeId::new(0),
                machine_key,
                node_key,
                user_id: None,
                hostname,
                given_name,
                ip_addresses: vec![],
                forced_tags: vec![],
                auth_key_id: None,
                ephemeral: false,
                expiry: None,
                last_seen: None,
                register_method: RegisterMethod::default(),
                routes: vec![],
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn id(mut self, id: NodeId) -> Self {
        self.node.id = id;
        self
    }

    pub fn user_id(mut self, id: UserId) -> Self {
        self.node.user_id = Some(id);
        self
    }

    pub fn given_name(mut self, name: NodeName) -> Self {
        self.node.given_name = name;
        self
    }

    pub fn ip_addresses(mut self, ips: Vec<IpAddr>) -> Self {
        self.node.ip_addresses = ips;
        self
    }

    pub fn forced_tags(mut self, tags: Vec<Tag>) -> Self {
        self.node.forced_tags = dedup_tags(tags);
        self
    }

    pub fn auth_key_id(mut self, id: u64) -> Self {
        self.node.auth_key_id = Some(id);
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.node.ephemeral = ephemeral;
        self
    }

    pub fn expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.node.expiry = Some(expiry);
        self
    }

    pub fn last_seen(mut self, last_seen: DateTime<Utc>) -> Self {
        self.node.last_seen = Some(last_seen);
        self
    }

    pub fn register_method(mut self, method: RegisterMethod) -> Self {
        self.node.register_method = method;
        self
    }

    pub fn routes(mut self, routes: Vec<Route>) -> Self {
        self.node.routes = routes;
        self
    }

    pub fn created_at(mut self, time: DateTime<Utc>) -> Self {
        self.node.created_at = time;
        self
    }

    pub fn updated_at(mut self, time: DateTime<Utc>) -> Self {
        self.node.updated_at = time;
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

impl Node {
    pub fn builder(machine_key: MachineKey, node_key: NodeKey, hostname: String) -> NodeBuilder {
        NodeBuilder::new(machine_key, node_key, hostname)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn machine_key(&self) -> &MachineKey {
        &self.machine_key
    }

    pub fn node_key(&self) -> &NodeKey {
        &self.node_key
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn given_name(&self) -> &NodeName {
        &self.given_name
    }

    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    pub fn forced_tags(&self) -> &[Tag] {
        &self.forced_tags
    }

    pub fn auth_key_id(&self) -> Option<u64> {
        self.auth_key_id
    }

    pub fn ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    pub fn register_method(&self) -> RegisterMethod {
        self.register_method
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    pub fn set_node_key(&mut self, key: NodeKey) {
        self.node_key = key;
    }

    pub fn set_machine_key(&mut self, key: MachineKey) {
        self.machine_key = key;
    }

    pub fn set_hostname(&mut self, hostname: String) {
        self.hostname = hostname;
    }

    pub fn set_given_name(&mut self, name: NodeName) {
        self.given_name = name;
    }

    pub fn set_ip_addresses(&mut self, ips: Vec<IpAddr>) {
        self.ip_addresses = ips;
    }

    /// replace the forced tags, dropping duplicates while keeping first-seen order.
    pub fn set_forced_tags(&mut self, tags: Vec<Tag>) {
        self.forced_tags = dedup_tags(tags);
    }

    pub fn set_auth_key_id(&mut self, id: Option<u64>) {
        self.auth_key_id = id;
    }

    pub fn set_ephemeral(&mut self, ephemeral: bool) {
        self.ephemeral = ephemeral;
    }

    pub fn set_expiry(&mut self, expiry: DateTime<Utc>) {
        self.expiry = Some(expiry);
    }

    pub fn set_last_seen(&mut self, last_seen: DateTime<Utc>) {
        self.last_seen = Some(last_seen);
    }

    pub fn set_register_method(&mut self, method: RegisterMethod) {
        self.register_method = method;
    }

    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.routes = routes;
    }

    pub fn set_created_at(&mut self, time: DateTime<Utc>) {
        self.created_at = time;
    }

    /// whether the node has been through address assignment.
    pub fn has_ip_addresses(&self) -> bool {
        !self.ip_addresses.is_empty()
    }

    /// returns whether the node's key has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// returns whether the node's key had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            None => false,
            Some(expiry) => now > expiry,
        }
    }

    /// returns whether the node has a specific forced tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.forced_tags.iter().any(|t| t == &tag)
    }

    /// prefixes the device currently announces.
    pub fn advertised_routes(&self) -> impl Iterator<Item = &IpNet> {
        self.routes
            .iter()
            .filter(|r| r.advertised)
            .map(|r| &r.prefix)
    }

    /// prefixes that are both announced and approved.
    pub fn enabled_routes(&self) -> impl Iterator<Item = &IpNet> {
        self.routes
            .iter()
            .filter(|r| r.advertised && r.enabled)
            .map(|r| &r.prefix)
    }
}

fn dedup_tags(tags: Vec<Tag>) -> Vec<Tag> {
    let mut out: Vec<Tag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
