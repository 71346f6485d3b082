//! user directory.

use hubscale_db::Database;
use hubscale_types::{User, UserId};
use tracing::info;

use crate::{Error, Result, State};

impl State {
    /// create a user. fails if the name is taken.
    pub async fn create_user(&self, name: &str) -> Result<User> {
        let user = self
            .db
            .create_user(&User::new(UserId(0), name.to_string()))
            .await?;
        info!(user_id = %user.id, name = %user.name, "created user");
        Ok(user)
    }

    /// get a user by id.
    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    /// get a user by login name.
    pub async fn get_user_by_name(&self, name: &str) -> Result<User> {
        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| Error::UserNotFound(name.to_string()))
    }

    /// list all users ordered by id.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.db.list_users().await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support;
    use crate::Error;

    #[tokio::test]
    async fn test_user_directory() {
        let state = test_support::state().await;

        let alice = state.create_user("alice").await.unwrap();
        let bob = state.create_user("bob").await.unwrap();

        assert_eq!(state.get_user(alice.id).await.unwrap().name, "alice");
        assert_eq!(state.get_user_by_name("bob").await.unwrap().id, bob.id);
        assert_eq!(state.list_users().await.unwrap().len(), 2);

        assert!(matches!(
            state.get_user_by_name("carol").await,
            Err(Error::UserNotFound(_))
        ));
        assert!(matches!(
            state.create_user("alice").await,
            Err(Error::AlreadyExists(_))
        ));
    }
}
