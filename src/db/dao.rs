//! Data Access Object.
//!
//! [`Dao`] is the only component that talks to a connection. It is a cheap
//! handle: clones share one inner value and count as the *same instance* for
//! the atomic orchestrator's identity check. Build one per database at wiring
//! time and hand clones to every repository.
//!
//! Statement execution is transaction-aware. When the calling task runs inside
//! an active [`TransactionContext`](crate::db::TransactionContext) of this DAO,
//! the statement goes to the context's connection; otherwise a connection is
//! borrowed from the pool for the single call.
//!
//! # Architecture
//!
//! Execution is generic over the sqlx executor and specialised per backend in
//! the `postgres` and `sqlite` submodules, so the pool path and the
//! transaction path share one implementation.

use crate::db::params::{PlaceholderStyle, QueryParam, expand_placeholders};
use crate::db::pool::DbPool;
use crate::db::transaction::{self, DbTransaction, IsolationLevel};
use crate::db::types::{JsonRow, from_row};
use crate::db::DatabaseType;
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// How many rows a statement should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// No result set; report the affected-row count.
    None,
    /// At most one row.
    One,
    /// Every row.
    All,
}

/// Result of [`Dao::execute`], shaped by the requested [`Fetch`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Affected(u64),
    Row(Option<JsonRow>),
    Rows(Vec<JsonRow>),
}

impl QueryOutput {
    /// Affected-row count, for `Fetch::None` results.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            _ => None,
        }
    }

    /// The single row, or the first of many.
    pub fn into_row(self) -> Option<JsonRow> {
        match self {
            Self::Row(row) => row,
            Self::Rows(rows) => rows.into_iter().next(),
            Self::Affected(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<JsonRow> {
        match self {
            Self::Rows(rows) => rows,
            Self::Row(row) => row.into_iter().collect(),
            Self::Affected(_) => Vec::new(),
        }
    }
}

/// Snapshot of transaction counters kept by a DAO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub commit_failures: u64,
    pub rollback_failures: u64,
    /// Transactions whose scope was dropped before completion.
    pub abandoned: u64,
}

#[derive(Default)]
struct StatsCounters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    commit_failures: AtomicU64,
    rollback_failures: AtomicU64,
    abandoned: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransactionStats {
        TransactionStats {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

struct DaoInner {
    pool: DbPool,
    stats: StatsCounters,
}

/// Shared, transaction-aware statement executor.
#[derive(Clone)]
pub struct Dao {
    inner: Arc<DaoInner>,
}

impl Dao {
    pub fn new(pool: DbPool) -> Self {
        Self {
            inner: Arc::new(DaoInner {
                pool,
                stats: StatsCounters::default(),
            }),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.inner.pool
    }

    pub fn db_type(&self) -> DatabaseType {
        self.inner.pool.db_type()
    }

    /// True when both handles share the same inner DAO.
    pub fn same_instance(&self, other: &Dao) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn stats(&self) -> TransactionStats {
        self.inner.stats.snapshot()
    }

    /// Execute one statement.
    ///
    /// `query` uses `%s` placeholders; `params` are bound in order. Inside an
    /// active transaction of this DAO the statement runs on the transaction's
    /// connection, otherwise on a connection borrowed from the pool.
    pub async fn execute(
        &self,
        query: &str,
        params: &[QueryParam],
        fetch: Fetch,
    ) -> DbResult<QueryOutput> {
        let sql = expand_placeholders(
            query,
            PlaceholderStyle::from(self.db_type()),
            params.len(),
        )?;

        match transaction::current_for(self) {
            Some(ctx) => {
                debug!(
                    transaction_id = %ctx.id(),
                    sql = %sql,
                    params = ?params,
                    fetch = ?fetch,
                    "Executing in transaction"
                );
                let mut guard = ctx.lock().await;
                let tx = guard.as_mut().ok_or_else(|| {
                    DbError::transaction("Transaction is no longer active", ctx.id())
                })?;
                impl_db_dispatch!(DbTransaction, tx, {
                    Postgres(tx) => postgres::run(&mut **tx, &sql, params, fetch).await,
                    SQLite(tx) => sqlite::run(&mut **tx, &sql, params, fetch).await,
                })
            }
            None => {
                debug!(sql = %sql, params = ?params, fetch = ?fetch, "Executing on pool");
                impl_db_dispatch!(DbPool, self.pool(), {
                    Postgres(pool) => postgres::run(pool, &sql, params, fetch).await,
                    SQLite(pool) => sqlite::run(pool, &sql, params, fetch).await,
                })
            }
        }
    }

    /// Execute a query and return every row.
    pub async fn fetch_all(&self, query: &str, params: &[QueryParam]) -> DbResult<Vec<JsonRow>> {
        Ok(self.execute(query, params, Fetch::All).await?.into_rows())
    }

    /// Execute a query and return the first row, if any.
    pub async fn fetch_optional(
        &self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<JsonRow>> {
        Ok(self.execute(query, params, Fetch::One).await?.into_row())
    }

    /// Execute a statement and return the affected-row count.
    pub async fn execute_statement(&self, query: &str, params: &[QueryParam]) -> DbResult<u64> {
        Ok(self
            .execute(query, params, Fetch::None)
            .await?
            .rows_affected()
            .unwrap_or(0))
    }

    /// Like [`fetch_all`](Self::fetch_all), deserializing each row into `T`.
    pub async fn fetch_all_as<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<T>> {
        self.fetch_all(query, params)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    /// Like [`fetch_optional`](Self::fetch_optional), deserializing into `T`.
    pub async fn fetch_optional_as<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<T>> {
        self.fetch_optional(query, params)
            .await?
            .map(from_row)
            .transpose()
    }

    /// Borrow a connection and open a transaction on it.
    ///
    /// Fails if the calling task already has an open transaction on this DAO.
    /// On PostgreSQL the isolation level is applied before any other
    /// statement; SQLite transactions are always serializable.
    pub async fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> DbResult<DbTransaction> {
        if let Some(ctx) = transaction::current_for(self) {
            return Err(DbError::transaction(
                "A transaction is already open on this DAO in the current task",
                ctx.id(),
            ));
        }

        let tx = match self.pool() {
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                if let Some(level) = isolation {
                    let stmt = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
                    sqlx::query(&stmt)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| DbError::from(e).with_label("Dao::begin_transaction"))?;
                }
                DbTransaction::Postgres(tx)
            }
            DbPool::SQLite(pool) => {
                if let Some(level) = isolation {
                    debug!(isolation = %level, "SQLite transactions are serializable; isolation level ignored");
                }
                DbTransaction::SQLite(pool.begin().await?)
            }
        };

        StatsCounters::bump(&self.inner.stats.begun);
        debug!(db_type = %self.db_type(), isolation = ?isolation, "Transaction opened");
        Ok(tx)
    }

    /// Commit a transaction and return its connection to the pool.
    pub async fn commit_transaction(&self, tx: DbTransaction) -> DbResult<()> {
        match tx.commit().await {
            Ok(()) => {
                StatsCounters::bump(&self.inner.stats.committed);
                Ok(())
            }
            Err(e) => {
                StatsCounters::bump(&self.inner.stats.commit_failures);
                error!(error = %e, "COMMIT failed");
                Err(e)
            }
        }
    }

    /// Roll back a transaction and return its connection to the pool.
    pub async fn rollback_transaction(&self, tx: DbTransaction) -> DbResult<()> {
        match tx.rollback().await {
            Ok(()) => {
                StatsCounters::bump(&self.inner.stats.rolled_back);
                Ok(())
            }
            Err(e) => {
                StatsCounters::bump(&self.inner.stats.rollback_failures);
                error!(error = %e, "ROLLBACK failed");
                Err(e)
            }
        }
    }

    pub(crate) fn record_abandoned(&self) {
        StatsCounters::bump(&self.inner.stats.abandoned);
    }
}

impl fmt::Debug for Dao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dao")
            .field("db_type", &self.db_type())
            .field("instance", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

// =============================================================================
// Backend-Specific Execution
// =============================================================================

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use crate::db::types::RowToJson;
    use futures_util::TryStreamExt;
    use sqlx::Postgres;

    pub async fn run<'c, E>(
        executor: E,
        sql: &str,
        params: &[QueryParam],
        fetch: Fetch,
    ) -> DbResult<QueryOutput>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }

        let output = match fetch {
            Fetch::None => QueryOutput::Affected(query.execute(executor).await?.rows_affected()),
            Fetch::One => QueryOutput::Row(
                query
                    .fetch_optional(executor)
                    .await?
                    .map(|row| row.to_json_map()),
            ),
            Fetch::All => QueryOutput::Rows(
                query
                    .fetch(executor)
                    .map_ok(|row| row.to_json_map())
                    .try_collect()
                    .await?,
            ),
        };
        Ok(output)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use crate::db::types::RowToJson;
    use futures_util::TryStreamExt;
    use sqlx::Sqlite;

    pub async fn run<'c, E>(
        executor: E,
        sql: &str,
        params: &[QueryParam],
        fetch: Fetch,
    ) -> DbResult<QueryOutput>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }

        let output = match fetch {
            Fetch::None => QueryOutput::Affected(query.execute(executor).await?.rows_affected()),
            Fetch::One => QueryOutput::Row(
                query
                    .fetch_optional(executor)
                    .await?
                    .map(|row| row.to_json_map()),
            ),
            Fetch::All => QueryOutput::Rows(
                query
                    .fetch(executor)
                    .map_ok(|row| row.to_json_map())
                    .try_collect()
                    .await?,
            ),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_output_accessors() {
        let row: JsonRow = json!({ "id": 1 }).as_object().cloned().unwrap();

        assert_eq!(QueryOutput::Affected(3).rows_affected(), Some(3));
        assert_eq!(QueryOutput::Rows(vec![]).rows_affected(), None);
        assert_eq!(
            QueryOutput::Rows(vec![row.clone()]).into_row(),
            Some(row.clone())
        );
        assert_eq!(QueryOutput::Row(Some(row.clone())).into_rows().len(), 1);
        assert!(QueryOutput::Affected(1).into_rows().is_empty());
    }
}
