//! user type - the owner namespace for nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// convert to i64 for database storage.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id as u64)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a user owning zero or more nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// unique identifier, 0 until persisted.
    pub id: UserId,

    /// unique login name, used to bind pending registrations.
    pub name: String,

    /// display name, typically the user's full name.
    pub display_name: Option<String>,

    /// when the user was created.
    pub created_at: DateTime<Utc>,

    /// when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// create a new user with the given name.
    pub fn new(id: UserId, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            display_name: None,
            created_at: now,
            updated_at: now,
        }
    }
}
