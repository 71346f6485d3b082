//! node queries.
//!
//! reads return nodes with their routes attached. column setters bump
//! `updated_at` and fail with [`Error::NotFound`] when no row matched.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, Value,
};

use hubscale_types::{MachineKey, Node, NodeId, NodeKey, NodeName, Route, Tag, UserId};

use crate::entity::{node, route};
use crate::query::route as route_query;
use crate::{Error, Result};

async fn attach_routes<C: ConnectionTrait>(db: &C, model: node::Model) -> Result<Node> {
    let routes = route_query::list_for_node(db, NodeId::from(model.id)).await?;
    Ok(model.into_node(routes))
}

fn assemble(rows: Vec<(node::Model, Vec<route::Model>)>) -> Result<Vec<Node>> {
    rows.into_iter()
        .map(|(model, routes)| {
            let mut routes = routes
                .into_iter()
                .map(Route::try_from)
                .collect::<Result<Vec<_>>>()?;
            routes.sort_by_key(|r| r.id.0);
            Ok(model.into_node(routes))
        })
        .collect()
}

/// get a node by id.
pub async fn get_node<C: ConnectionTrait>(db: &C, id: NodeId) -> Result<Option<Node>> {
    match node::Entity::find_by_id(id.as_i64()).one(db).await? {
        Some(model) => attach_routes(db, model).await.map(Some),
        None => Ok(None),
    }
}

/// get a node by its machine key.
pub async fn get_node_by_machine_key<C: ConnectionTrait>(
    db: &C,
    machine_key: &MachineKey,
) -> Result<Option<Node>> {
    let model = node::Entity::find()
        .filter(node::Column::MachineKey.eq(machine_key.as_bytes().to_vec()))
        .one(db)
        .await?;
    match model {
        Some(model) => attach_routes(db, model).await.map(Some),
        None => Ok(None),
    }
}

/// get a node by its current node (session) key.
pub async fn get_node_by_node_key<C: ConnectionTrait>(
    db: &C,
    node_key: &NodeKey,
) -> Result<Option<Node>> {
    let model = node::Entity::find()
        .filter(node::Column::NodeKey.eq(node_key.as_bytes().to_vec()))
        .one(db)
        .await?;
    match model {
        Some(model) => attach_routes(db, model).await.map(Some),
        None => Ok(None),
    }
}

/// get the node currently holding a given name.
pub async fn get_node_by_given_name<C: ConnectionTrait>(
    db: &C,
    given_name: &str,
) -> Result<Option<Node>> {
    let model = node::Entity::find()
        .filter(node::Column::GivenName.eq(given_name))
        .one(db)
        .await?;
    Ok(model.map(Into::into))
}

/// list all nodes ordered by id.
pub async fn list_nodes<C: ConnectionTrait>(db: &C) -> Result<Vec<Node>> {
    let rows = node::Entity::find()
        .order_by_asc(node::Column::Id)
        .find_with_related(route::Entity)
        .all(db)
        .await?;
    assemble(rows)
}

/// list the nodes owned by a user, ordered by id.
pub async fn list_nodes_for_user<C: ConnectionTrait>(db: &C, user_id: UserId) -> Result<Vec<Node>> {
    let rows = node::Entity::find()
        .filter(node::Column::UserId.eq(user_id.as_i64()))
        .order_by_asc(node::Column::Id)
        .find_with_related(route::Entity)
        .all(db)
        .await?;
    assemble(rows)
}

/// list every node except `id`, ordered by id.
pub async fn list_peers<C: ConnectionTrait>(db: &C, id: NodeId) -> Result<Vec<Node>> {
    let rows = node::Entity::find()
        .filter(node::Column::Id.ne(id.as_i64()))
        .order_by_asc(node::Column::Id)
        .find_with_related(route::Entity)
        .all(db)
        .await?;
    assemble(rows)
}

/// every address held by any persisted node.
pub async fn assigned_ips<C: ConnectionTrait>(db: &C) -> Result<Vec<IpAddr>> {
    let rows: Vec<(i64, String)> = node::Entity::find()
        .select_only()
        .column(node::Column::Id)
        .column(node::Column::IpAddresses)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .iter()
        .flat_map(|(id, raw)| node::parse_ip_addresses(*id, raw))
        .collect())
}

/// insert a node (id 0) or overwrite an existing row. returns the stored
/// node with its routes.
///
/// every stored node belongs to a user; an unowned node is rejected with
/// [`Error::InvalidData`].
pub async fn save_node<C: ConnectionTrait>(db: &C, node: &Node) -> Result<Node> {
    if node.user_id().is_none() {
        return Err(Error::InvalidData(format!(
            "node {} has no owning user",
            node.machine_key().short_string()
        )));
    }
    let mut model: node::ActiveModel = node.into();
    model.updated_at = Set(Utc::now());
    let saved = if node.id().is_persisted() {
        model.update(db).await?
    } else {
        model.insert(db).await?
    };
    attach_routes(db, saved).await
}

async fn update_column<C: ConnectionTrait>(
    db: &C,
    id: NodeId,
    column: node::Column,
    value: impl Into<Value>,
) -> Result<()> {
    let result = node::Entity::update_many()
        .col_expr(column, Expr::value(value.into()))
        .col_expr(node::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(node::Column::Id.eq(id.as_i64()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound(format!("node {id}")));
    }
    Ok(())
}

/// replace the node (session) key.
pub async fn set_node_key<C: ConnectionTrait>(db: &C, id: NodeId, key: &NodeKey) -> Result<()> {
    update_column(db, id, node::Column::NodeKey, key.as_bytes().to_vec()).await
}

/// replace the machine key.
pub async fn set_machine_key<C: ConnectionTrait>(
    db: &C,
    id: NodeId,
    key: &MachineKey,
) -> Result<()> {
    update_column(db, id, node::Column::MachineKey, key.as_bytes().to_vec()).await
}

/// replace the given name.
pub async fn set_given_name<C: ConnectionTrait>(db: &C, id: NodeId, name: &NodeName) -> Result<()> {
    update_column(db, id, node::Column::GivenName, name.as_str().to_string()).await
}

/// set the key expiry.
pub async fn set_expiry<C: ConnectionTrait>(
    db: &C,
    id: NodeId,
    expiry: DateTime<Utc>,
) -> Result<()> {
    update_column(db, id, node::Column::Expiry, Some(expiry)).await
}

/// set the last-seen time.
pub async fn set_last_seen<C: ConnectionTrait>(
    db: &C,
    id: NodeId,
    last_seen: DateTime<Utc>,
) -> Result<()> {
    update_column(db, id, node::Column::LastSeen, Some(last_seen)).await
}

/// replace the forced tags.
pub async fn set_forced_tags<C: ConnectionTrait>(db: &C, id: NodeId, tags: &[Tag]) -> Result<()> {
    let json = serde_json::to_string(tags).map_err(|e| Error::InvalidData(e.to_string()))?;
    update_column(db, id, node::Column::ForcedTags, json).await
}

/// hard-delete a node, removing its routes first.
pub async fn delete_node<C: ConnectionTrait>(db: &C, id: NodeId) -> Result<()> {
    route_query::delete_for_node(db, id).await?;
    let result = node::Entity::delete_by_id(id.as_i64()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound(format!("node {id}")));
    }
    Ok(())
}
