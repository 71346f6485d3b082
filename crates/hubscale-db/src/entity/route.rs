//! route entity for database storage.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use hubscale_types::{NodeId, Route, RouteId};

use crate::Error;

/// route database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "routes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub node_id: i64,
    /// prefix in cidr notation
    pub prefix: String,
    pub advertised: bool,
    pub enabled: bool,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::NodeId",
        to = "super::node::Column::Id",
        on_delete = "Cascade"
    )]
    Node,
}

impl Related<super::node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Node.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Route {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let prefix: IpNet = model.prefix.parse().map_err(|e| {
            Error::InvalidData(format!("route {} has bad prefix {:?}: {e}", model.id, model.prefix))
        })?;
        Ok(Route {
            id: RouteId::from(model.id),
            node_id: NodeId::from(model.node_id),
            prefix,
            advertised: model.advertised,
            enabled: model.enabled,
            is_primary: model.is_primary,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Route> for ActiveModel {
    fn from(route: &Route) -> Self {
        ActiveModel {
            id: if route.id.0 == 0 {
                NotSet
            } else {
                Set(route.id.as_i64())
            },
            node_id: Set(route.node_id.as_i64()),
            prefix: Set(route.prefix.to_string()),
            advertised: Set(route.advertised),
            enabled: Set(route.enabled),
            is_primary: Set(route.is_primary),
            created_at: Set(route.created_at),
            updated_at: Set(route.updated_at),
        }
    }
}
