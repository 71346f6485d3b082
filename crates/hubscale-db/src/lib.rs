//! database layer for hubscale.
//!
//! this crate provides persistent storage for:
//! - Users
//! - Nodes
//! - Routes
//!
//! it also handles ip address allocation for new nodes and scoped
//! transactions for the registry's check-then-write operations.

#![warn(missing_docs)]

mod entity;
mod error;
mod ip_allocator;
mod migration;
pub mod query;
mod txn;

pub use error::Error;
pub use ip_allocator::IpAllocator;
pub use txn::{ReadTxn, WriteTxn};

use std::future::Future;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database as SeaOrmDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::Mutex;

use hubscale_types::{Config, MachineKey, Node, NodeId, User, UserId};

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// database trait for hubscale storage lookups outside a transaction.
///
/// mutations go through [`HubscaleDb::write`] so that invariant checks and
/// their writes share one transaction.
pub trait Database: Send + Sync {
    // ─── User Operations ─────────────────────────────────────────────────────

    /// create a new user. Returns the created user with its assigned ID.
    fn create_user(&self, user: &User) -> impl Future<Output = Result<User>> + Send;

    /// get a user by id.
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// get a user by name.
    fn get_user_by_name(&self, name: &str) -> impl Future<Output = Result<Option<User>>> + Send;

    /// list all users.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    // ─── Node Operations ─────────────────────────────────────────────────────

    /// get a node by id, routes included.
    fn get_node(&self, id: NodeId) -> impl Future<Output = Result<Option<Node>>> + Send;

    /// get a node by machine key, routes included.
    fn get_node_by_machine_key(
        &self,
        machine_key: &MachineKey,
    ) -> impl Future<Output = Result<Option<Node>>> + Send;

    /// list all nodes ordered by id.
    fn list_nodes(&self) -> impl Future<Output = Result<Vec<Node>>> + Send;

    /// list the nodes owned by a user.
    fn list_nodes_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Node>>> + Send;
}

/// the main database implementation using sea-orm.
#[derive(Clone)]
pub struct HubscaleDb {
    conn: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl HubscaleDb {
    /// create a new database connection from config and run migrations.
    pub async fn new(config: &Config) -> Result<Self> {
        let url = Self::build_connection_url(&config.database)?;
        let conn: DatabaseConnection = SeaOrmDatabase::connect(&url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self::from_connection(conn);

        // enable WAL mode for sqlite if configured
        if config.database.db_type == "sqlite" && config.database.sqlite.write_ahead_log {
            db.enable_wal_mode().await?;
        }

        db.migrate().await?;
        Ok(db)
    }

    fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// enable write-ahead logging mode for sqlite.
    async fn enable_wal_mode(&self) -> Result<()> {
        self.conn
            .execute_unprepared("PRAGMA journal_mode=WAL")
            .await
            .map_err(|e| Error::Connection(format!("failed to enable WAL mode: {}", e)))?;
        tracing::info!("sqlite WAL mode enabled");
        Ok(())
    }

    /// get the current sqlite journal mode.
    #[cfg(test)]
    async fn get_journal_mode(&self) -> Result<String> {
        use sea_orm::{DatabaseBackend, Statement};

        let row = self
            .conn
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "PRAGMA journal_mode".to_string(),
            ))
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<String>("", "journal_mode")?),
            None => Ok(String::new()),
        }
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &hubscale_types::DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // add ?mode=rwc to create file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self::from_connection(conn);
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }

    /// open a write transaction.
    ///
    /// waits for any other write transaction in this process to finish.
    /// on postgres the transaction runs at serializable isolation.
    pub async fn write(&self) -> Result<WriteTxn> {
        WriteTxn::begin(&self.conn, Arc::clone(&self.write_lock)).await
    }

    /// open a read transaction.
    pub async fn read(&self) -> Result<ReadTxn> {
        ReadTxn::begin(&self.conn).await
    }

    /// close the connection pool.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        tracing::debug!("database connection closed");
        Ok(())
    }
}

impl Database for HubscaleDb {
    async fn create_user(&self, user: &User) -> Result<User> {
        query::user::create_user(&self.conn, user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        query::user::get_user(&self.conn, id).await
    }

    async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        query::user::get_user_by_name(&self.conn, name).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        query::user::list_users(&self.conn).await
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        query::node::get_node(&self.conn, id).await
    }

    async fn get_node_by_machine_key(&self, machine_key: &MachineKey) -> Result<Option<Node>> {
        query::node::get_node_by_machine_key(&self.conn, machine_key).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        query::node::list_nodes(&self.conn).await
    }

    async fn list_nodes_for_user(&self, user_id: UserId) -> Result<Vec<Node>> {
        query::node::list_nodes_for_user(&self.conn, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hubscale_types::test_utils::TestNodeBuilder;
    use hubscale_types::{NodeKey, NodeName, Route, Tag};

    async fn setup_test_db() -> HubscaleDb {
        HubscaleDb::new_in_memory().await.unwrap()
    }

    async fn create_test_user(db: &HubscaleDb, name: &str) -> User {
        db.create_user(&User::new(UserId(0), name.to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_crud() {
        let db = setup_test_db().await;

        // create
        let created = create_test_user(&db, "testuser").await;
        assert!(created.id.0 > 0);

        // get by id
        let fetched = db.get_user(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "testuser");

        // get by name
        assert!(db.get_user_by_name("testuser").await.unwrap().is_some());
        assert!(db.get_user_by_name("nobody").await.unwrap().is_none());

        // list
        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_user_name_rejected() {
        let db = setup_test_db().await;
        create_test_user(&db, "dup").await;
        let err = db
            .create_user(&User::new(UserId(0), "dup".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_node_save_and_lookup() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;

        let node = TestNodeBuilder::new(0)
            .with_key_seed(1)
            .with_user_id(user.id)
            .with_ip_addresses(vec!["100.64.0.1".parse().unwrap()])
            .with_tags(vec!["tag:web".parse().unwrap()])
            .build();

        let txn = db.write().await.unwrap();
        let saved = query::node::save_node(txn.conn(), &node).await.unwrap();
        txn.commit().await.unwrap();

        assert!(saved.id().is_persisted());
        let fetched = db.get_node(saved.id()).await.unwrap().unwrap();
        assert_eq!(fetched.hostname(), "test-node-1");
        assert_eq!(fetched.ip_addresses(), node.ip_addresses());
        assert_eq!(fetched.forced_tags(), node.forced_tags());
        assert_eq!(fetched.user_id(), Some(user.id));

        let by_key = db
            .get_node_by_machine_key(node.machine_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_key.id(), saved.id());

        assert_eq!(db.list_nodes_for_user(user.id).await.unwrap().len(), 1);
    }

    /// a node owned by `user`, ready to be saved.
    fn owned(seed: u64, user: &User) -> Node {
        TestNodeBuilder::new(0)
            .with_key_seed(seed)
            .with_user_id(user.id)
            .build()
    }

    #[tokio::test]
    async fn test_unowned_node_rejected() {
        let db = setup_test_db().await;
        let txn = db.write().await.unwrap();
        let unowned = TestNodeBuilder::new(0).with_key_seed(1).build();
        let err = query::node::save_node(txn.conn(), &unowned)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)), "got {err:?}");
        assert!(query::node::list_nodes(txn.conn()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_machine_key_and_given_name() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;

        let txn = db.write().await.unwrap();
        let first = owned(1, &user);
        query::node::save_node(txn.conn(), &first).await.unwrap();

        // same machine key, different name
        let mut dup_key = owned(1, &user);
        dup_key.set_given_name(NodeName::new("other").unwrap());
        let err = query::node::save_node(txn.conn(), &dup_key)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)), "got {err:?}");
        drop(txn);

        // same given name, different machine key
        let txn = db.write().await.unwrap();
        query::node::save_node(txn.conn(), &first).await.unwrap();
        let mut dup_name = owned(2, &user);
        dup_name.set_given_name(first.given_name().clone());
        let err = query::node::save_node(txn.conn(), &dup_name)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_dropped_write_rolls_back() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;
        {
            let txn = db.write().await.unwrap();
            query::node::save_node(txn.conn(), &owned(3, &user)).await.unwrap();
        }
        assert!(db.list_nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_column_setters() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;
        let txn = db.write().await.unwrap();
        let conn = txn.conn();
        let node = query::node::save_node(conn, &owned(4, &user)).await.unwrap();
        let id = node.id();
        let now = Utc::now();

        let new_key = NodeKey::from_bytes(vec![9; 32]);
        query::node::set_node_key(conn, id, &new_key).await.unwrap();
        query::node::set_given_name(conn, id, &NodeName::new("renamed").unwrap())
            .await
            .unwrap();
        query::node::set_expiry(conn, id, now).await.unwrap();
        query::node::set_last_seen(conn, id, now).await.unwrap();
        let tags: Vec<Tag> = vec!["tag:a".parse().unwrap()];
        query::node::set_forced_tags(conn, id, &tags).await.unwrap();

        let fetched = query::node::get_node(conn, id).await.unwrap().unwrap();
        assert_eq!(fetched.node_key(), &new_key);
        assert_eq!(fetched.given_name().as_str(), "renamed");
        assert_eq!(fetched.expiry(), Some(now));
        assert_eq!(fetched.last_seen(), Some(now));
        assert_eq!(fetched.forced_tags(), tags.as_slice());
        assert_eq!(fetched.user_id(), Some(user.id));

        let by_node_key = query::node::get_node_by_node_key(conn, &new_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_node_key.id(), id);

        let missing = query::node::set_expiry(conn, NodeId::new(999), now).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_routes_and_cascading_delete() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;
        let txn = db.write().await.unwrap();
        let conn = txn.conn();

        let a = query::node::save_node(conn, &owned(5, &user)).await.unwrap();
        let b = query::node::save_node(conn, &owned(6, &user)).await.unwrap();

        let prefix = "10.0.1.0/24".parse().unwrap();
        query::route::insert(conn, &Route::advertised(a.id(), prefix))
            .await
            .unwrap();
        assert_eq!(
            query::route::count_other_offerers(conn, &prefix, a.id())
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            query::route::count_other_offerers(conn, &prefix, b.id())
                .await
                .unwrap(),
            1
        );

        let listed = query::node::list_nodes(conn).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].routes().len(), 1);
        assert!(listed[1].routes().is_empty());

        let peers = query::node::list_peers(conn, a.id()).await.unwrap();
        assert_eq!(peers.iter().map(|n| n.id()).collect::<Vec<_>>(), vec![b.id()]);

        query::node::delete_node(conn, a.id()).await.unwrap();
        assert!(query::node::get_node(conn, a.id()).await.unwrap().is_none());
        assert!(query::route::list_for_node(conn, a.id()).await.unwrap().is_empty());
        assert!(matches!(
            query::node::delete_node(conn, a.id()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_assigned_ips() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "owner").await;
        let txn = db.write().await.unwrap();
        let node = TestNodeBuilder::new(0)
            .with_key_seed(7)
            .with_user_id(user.id)
            .with_ip_addresses(vec![
                "100.64.0.1".parse().unwrap(),
                "fd7a:115c:a1e0::1".parse().unwrap(),
            ])
            .build();
        query::node::save_node(txn.conn(), &node).await.unwrap();
        query::node::save_node(txn.conn(), &owned(8, &user)).await.unwrap();

        let ips = query::node::assigned_ips(txn.conn()).await.unwrap();
        assert_eq!(ips, node.ip_addresses());
    }

    #[tokio::test]
    async fn test_sqlite_wal_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test_wal.db");

        let mut config = Config::default();
        config.database.db_type = "sqlite".to_string();
        config.database.connection_string = db_path.to_string_lossy().to_string();
        config.database.sqlite.write_ahead_log = true;

        let db = HubscaleDb::new(&config).await.unwrap();
        let mode = db.get_journal_mode().await.unwrap();
        assert_eq!(mode.to_lowercase(), "wal", "journal mode should be WAL");
    }

    #[test]
    fn test_connection_url() {
        let mut config = Config::default().database;
        config.connection_string = "/tmp/hub.db".to_string();
        assert_eq!(
            HubscaleDb::build_connection_url(&config).unwrap(),
            "sqlite:/tmp/hub.db?mode=rwc"
        );

        config.db_type = "mysql".to_string();
        assert!(HubscaleDb::build_connection_url(&config).is_err());
    }
}
