//! node entity for database storage.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};
use tracing::warn;

use hubscale_types::{
    MachineKey, Node, NodeId, NodeKey, NodeName, RegisterMethod, Route, Tag, UserId,
};

/// node database model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// machine key bytes
    #[sea_orm(column_type = "VarBinary(StringLen::None)", unique)]
    pub machine_key: Vec<u8>,

    /// node key bytes
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub node_key: Vec<u8>,

    pub user_id: i64,

    pub hostname: String,
    #[sea_orm(unique)]
    pub given_name: String,

    /// json-serialized vec<ipaddr>
    #[sea_orm(column_type = "Text")]
    pub ip_addresses: String,

    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub forced_tags: String,

    pub auth_key_id: Option<i64>,

    /// whether this is an ephemeral node
    pub ephemeral: bool,

    pub expiry: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,

    /// registermethod as string
    pub register_method: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::route::Entity")]
    Routes,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::route::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Routes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// decode the json-encoded address list of a row.
pub(crate) fn parse_ip_addresses(node_id: i64, raw: &str) -> Vec<IpAddr> {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(node_id, error = %e, "failed to parse node ip_addresses JSON, using empty list");
            Vec::new()
        }
    }
}

impl Model {
    /// convert into a domain node carrying the given routes.
    pub(crate) fn into_node(self, routes: Vec<Route>) -> Node {
        let ip_addresses = parse_ip_addresses(self.id, &self.ip_addresses);
        // invalid tags from hand-edited rows are dropped
        let forced_tags: Vec<Tag> = match serde_json::from_str::<Vec<String>>(&self.forced_tags) {
            Ok(v) => v.into_iter().filter_map(|s| s.parse().ok()).collect(),
            Err(e) => {
                warn!(node_id = self.id, error = %e, "failed to parse node forced_tags JSON, using empty list");
                Vec::new()
            }
        };

        let given_name = NodeName::new(self.given_name.as_str()).unwrap_or_else(|e| {
            warn!(node_id = self.id, error = %e, given_name = %self.given_name, "stored given name is not a valid label, sanitising");
            NodeName::sanitise(&self.given_name).unwrap_or_default()
        });

        let mut builder = Node::builder(
            MachineKey::from_bytes(self.machine_key),
            NodeKey::from_bytes(self.node_key),
            self.hostname,
        )
        .id(NodeId::from(self.id))
        .user_id(UserId::from(self.user_id))
        .given_name(given_name)
        .ip_addresses(ip_addresses)
        .forced_tags(forced_tags)
        .ephemeral(self.ephemeral)
        .register_method(RegisterMethod::from_str_lossy(&self.register_method))
        .routes(routes)
        .created_at(self.created_at)
        .updated_at(self.updated_at);

        if let Some(id) = self.auth_key_id {
            builder = builder.auth_key_id(id as u64);
        }
        if let Some(exp) = self.expiry {
            builder = builder.expiry(exp);
        }
        if let Some(ls) = self.last_seen {
            builder = builder.last_seen(ls);
        }

        builder.build()
    }
}

impl From<Model> for Node {
    fn from(model: Model) -> Self {
        model.into_node(Vec::new())
    }
}

impl From<&Node> for ActiveModel {
    fn from(node: &Node) -> Self {
        let ip_json =
            serde_json::to_string(node.ip_addresses()).unwrap_or_else(|_| "[]".to_string());
        let tags_json =
            serde_json::to_string(node.forced_tags()).unwrap_or_else(|_| "[]".to_string());

        ActiveModel {
            id: if node.id().is_persisted() {
                Set(node.id().as_i64())
            } else {
                NotSet
            },
            machine_key: Set(node.machine_key().as_bytes().to_vec()),
            node_key: Set(node.node_key().as_bytes().to_vec()),
            user_id: match node.user_id() {
                Some(id) => Set(id.as_i64()),
                None => NotSet,
            },
            hostname: Set(node.hostname().to_string()),
            given_name: Set(node.given_name().to_string()),
            ip_addresses: Set(ip_json),
            forced_tags: Set(tags_json),
            auth_key_id: Set(node.auth_key_id().map(|id| id as i64)),
            ephemeral: Set(node.ephemeral()),
            expiry: Set(node.expiry()),
            last_seen: Set(node.last_seen()),
            register_method: Set(node.register_method().as_str().to_string()),
            created_at: Set(node.created_at()),
            updated_at: Set(node.updated_at()),
        }
    }
}
