//! route queries.

use chrono::Utc;
use ipnet::IpNet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};

use hubscale_types::{NodeId, Route};

use crate::Result;
use crate::entity::route;

/// all routes of a node, ordered by id.
pub async fn list_for_node<C: ConnectionTrait>(db: &C, node_id: NodeId) -> Result<Vec<Route>> {
    let rows = route::Entity::find()
        .filter(route::Column::NodeId.eq(node_id.as_i64()))
        .order_by_asc(route::Column::Id)
        .all(db)
        .await?;
    rows.into_iter().map(Route::try_from).collect()
}

/// insert a new route row.
pub async fn insert<C: ConnectionTrait>(db: &C, route: &Route) -> Result<Route> {
    let model: route::ActiveModel = route.into();
    let created = model.insert(db).await?;
    Route::try_from(created)
}

/// persist the flags of an existing route.
pub async fn update<C: ConnectionTrait>(db: &C, route: &Route) -> Result<Route> {
    let mut model: route::ActiveModel = route.into();
    model.updated_at = sea_orm::Set(Utc::now());
    let updated = model.update(db).await?;
    Route::try_from(updated)
}

/// how many nodes other than `exclude` offer `prefix` (advertised or enabled).
pub async fn count_other_offerers<C: ConnectionTrait>(
    db: &C,
    prefix: &IpNet,
    exclude: NodeId,
) -> Result<u64> {
    let count = route::Entity::find()
        .filter(route::Column::Prefix.eq(prefix.to_string()))
        .filter(route::Column::NodeId.ne(exclude.as_i64()))
        .filter(
            Condition::any()
                .add(route::Column::Advertised.eq(true))
                .add(route::Column::Enabled.eq(true)),
        )
        .count(db)
        .await?;
    Ok(count)
}

/// delete every route of a node. returns the number of rows removed.
pub async fn delete_for_node<C: ConnectionTrait>(db: &C, node_id: NodeId) -> Result<u64> {
    let result = route::Entity::delete_many()
        .filter(route::Column::NodeId.eq(node_id.as_i64()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
