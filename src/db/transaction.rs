//! Ambient transaction context.
//!
//! A [`TransactionContext`] owns one pooled connection with an open
//! transaction for the duration of an atomic block. While the block runs, the
//! context is published in task-local storage so every [`Dao`] call made by
//! the same task (for the same DAO instance) is routed onto that connection
//! without repositories passing handles to each other.
//!
//! The slot is task-local: concurrent tasks sharing one `Dao` never observe
//! each other's transaction, and a task spawned from inside an atomic block
//! starts without one.

use crate::db::dao::Dao;
use crate::error::{CleanupOperation, DbError, DbResult};
use crate::impl_db_dispatch;
use clap::ValueEnum;
use sqlx::{Postgres, Sqlite, Transaction};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

tokio::task_local! {
    static CURRENT_TRANSACTION: Arc<TransactionContext>;
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL keyword form, as used in `SET TRANSACTION ISOLATION LEVEL`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Database-specific transaction wrapper.
///
/// Dropping an unfinished transaction returns its connection to the pool and
/// rolls it back.
pub enum DbTransaction {
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            Postgres(tx) => tx.commit().await.map_err(DbError::from),
            SQLite(tx) => tx.commit().await.map_err(DbError::from),
        })
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        })
    }
}

impl fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(_) => f.write_str("DbTransaction::Postgres"),
            Self::SQLite(_) => f.write_str("DbTransaction::SQLite"),
        }
    }
}

/// Scoped owner of one DAO transaction.
pub struct TransactionContext {
    id: String,
    dao: Dao,
    isolation: Option<IsolationLevel>,
    transaction: Mutex<Option<DbTransaction>>,
    active: AtomicBool,
}

impl TransactionContext {
    /// Open a transaction on `dao` and wrap it in a context.
    pub async fn begin(dao: &Dao, isolation: Option<IsolationLevel>) -> DbResult<Arc<Self>> {
        let tx = dao.begin_transaction(isolation).await?;
        let ctx = Arc::new(Self {
            id: generate_transaction_id(),
            dao: dao.clone(),
            isolation,
            transaction: Mutex::new(Some(tx)),
            active: AtomicBool::new(true),
        });

        info!(
            transaction_id = %ctx.id,
            isolation = ?ctx.isolation,
            "Transaction started"
        );
        Ok(ctx)
    }

    /// Unique identifier, `tx_<uuid>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// DAO this context belongs to.
    pub fn dao(&self) -> &Dao {
        &self.dao
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Lock the underlying transaction for one statement.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<DbTransaction>> {
        self.transaction.lock().await
    }

    /// Run `f` with this context as the ambient transaction, then end it.
    ///
    /// On `Ok` the transaction is committed; a commit failure is returned as a
    /// [`DbError::Cleanup`] converted into `E`. On `Err` the transaction is
    /// rolled back and the original error is returned unchanged, even when the
    /// rollback itself fails.
    pub async fn scope<F, Fut, T, E>(self: Arc<Self>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        let result = CURRENT_TRANSACTION
            .scope(Arc::clone(&self), async move { f().await })
            .await;
        self.finish(result).await
    }

    async fn finish<T, E>(&self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError> + fmt::Display,
    {
        let tx = self.transaction.lock().await.take();
        self.active.store(false, Ordering::Release);

        let Some(tx) = tx else {
            return Err(E::from(DbError::transaction(
                "Transaction is no longer active",
                &self.id,
            )));
        };

        match result {
            Ok(value) => match self.dao.commit_transaction(tx).await {
                Ok(()) => {
                    info!(transaction_id = %self.id, "Transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    error!(transaction_id = %self.id, error = %e, "Commit failed");
                    Err(E::from(DbError::cleanup(CleanupOperation::Commit, e)))
                }
            },
            Err(err) => {
                match self.dao.rollback_transaction(tx).await {
                    Ok(()) => {
                        info!(transaction_id = %self.id, error = %err, "Transaction rolled back")
                    }
                    Err(rollback_err) => {
                        // The caller gets the original error; the rollback
                        // failure stays visible in the log and the DAO stats.
                        let cleanup = DbError::cleanup(CleanupOperation::Rollback, rollback_err);
                        error!(
                            transaction_id = %self.id,
                            error = %err,
                            cleanup_error = %cleanup,
                            "Rollback failed"
                        )
                    }
                }
                Err(err)
            }
        }
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        // Still active here means the scope future was dropped mid-flight.
        if self.active.swap(false, Ordering::AcqRel) {
            let pending = self.transaction.get_mut().take();
            if pending.is_some() {
                warn!(
                    transaction_id = %self.id,
                    "Transaction scope cancelled; rolling back"
                );
                self.dao.record_abandoned();
            }
            drop(pending);
        }
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("isolation", &self.isolation)
            .field("active", &self.is_active())
            .finish()
    }
}

/// The active ambient context of the calling task, if any.
pub fn current() -> Option<Arc<TransactionContext>> {
    CURRENT_TRANSACTION
        .try_with(Arc::clone)
        .ok()
        .filter(|ctx| ctx.is_active())
}

/// The active ambient context of the calling task, if it belongs to `dao`.
pub(crate) fn current_for(dao: &Dao) -> Option<Arc<TransactionContext>> {
    let ctx = current()?;
    if ctx.dao.same_instance(dao) {
        Some(ctx)
    } else {
        debug!(
            transaction_id = %ctx.id,
            "Ambient transaction belongs to another DAO; using the pool"
        );
        None
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
    }

    #[test]
    fn test_generate_transaction_id_format() {
        let id = generate_transaction_id();
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), 3 + 32);
        assert_ne!(id, generate_transaction_id());
    }

    #[test]
    fn test_no_ambient_context_outside_scope() {
        assert!(current().is_none());
    }
}
