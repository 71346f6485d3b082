//! scoped read and write transactions.
//!
//! a [`WriteTxn`] holds the process-wide write lock for its whole lifetime,
//! so check-then-write sequences (free address scan, unique offerer check,
//! given name collision check) cannot interleave with another writer.
//! dropping either transaction without committing rolls it back.

use std::sync::Arc;

use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    IsolationLevel, TransactionTrait,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::Result;

/// a write transaction.
pub struct WriteTxn {
    // dropped before the guard, so rollback finishes while still serialized
    txn: DatabaseTransaction,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTxn {
    pub(crate) async fn begin(conn: &DatabaseConnection, lock: Arc<Mutex<()>>) -> Result<Self> {
        let guard = lock.lock_owned().await;
        let txn = match conn.get_database_backend() {
            DatabaseBackend::Postgres => {
                conn.begin_with_config(Some(IsolationLevel::Serializable), None)
                    .await?
            }
            _ => conn.begin().await?,
        };
        Ok(Self { txn, _guard: guard })
    }

    /// connection to run statements on.
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// commit and release the write lock.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }
}

/// a read-only transaction giving a consistent snapshot.
pub struct ReadTxn {
    txn: DatabaseTransaction,
}

impl ReadTxn {
    pub(crate) async fn begin(conn: &DatabaseConnection) -> Result<Self> {
        let txn = match conn.get_database_backend() {
            DatabaseBackend::Postgres => {
                conn.begin_with_config(
                    Some(IsolationLevel::RepeatableRead),
                    Some(AccessMode::ReadOnly),
                )
                .await?
            }
            _ => conn.begin().await?,
        };
        Ok(Self { txn })
    }

    /// connection to run statements on.
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }
}
