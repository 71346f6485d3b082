//! user queries.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use hubscale_types::{User, UserId};

use crate::Result;
use crate::entity::user;

/// insert a user. returns it with the assigned id.
pub async fn create_user<C: ConnectionTrait>(db: &C, user: &User) -> Result<User> {
    let model: user::ActiveModel = user.into();
    let created = model.insert(db).await?;
    Ok(created.into())
}

/// get a user by id.
pub async fn get_user<C: ConnectionTrait>(db: &C, id: UserId) -> Result<Option<User>> {
    let result = user::Entity::find_by_id(id.as_i64()).one(db).await?;
    Ok(result.map(Into::into))
}

/// get a user by login name.
pub async fn get_user_by_name<C: ConnectionTrait>(db: &C, name: &str) -> Result<Option<User>> {
    let result = user::Entity::find()
        .filter(user::Column::Name.eq(name))
        .one(db)
        .await?;
    Ok(result.map(Into::into))
}

/// list all users ordered by id.
pub async fn list_users<C: ConnectionTrait>(db: &C) -> Result<Vec<User>> {
    let results = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;
    Ok(results.into_iter().map(Into::into).collect())
}
