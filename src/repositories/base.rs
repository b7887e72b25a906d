//! Shared repository plumbing.
//!
//! [`RepositoryBase`] wraps a [`Dao`] with labelled execution helpers: every
//! statement is logged with its label, SQL and parameters, and driver failures
//! are relabelled so the error names the repository operation that failed.

use crate::db::{Dao, Fetch, JsonRow, Participant, QueryBuilder, QueryParam};
use crate::error::{DbError, DbResult};
use tracing::{debug, error};

/// Result of an UPDATE or DELETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The statement matched this many rows (at least one).
    Applied(u64),
    /// The statement was accepted but matched no rows.
    NoMatch,
}

impl UpdateOutcome {
    fn from_affected(rows: u64) -> Self {
        if rows == 0 { Self::NoMatch } else { Self::Applied(rows) }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryBase {
    dao: Dao,
    app: &'static str,
}

impl RepositoryBase {
    /// `app` prefixes table names, e.g. `accounts` gives `accounts_users`.
    pub fn new(dao: Dao, app: &'static str) -> Self {
        Self { dao, app }
    }

    pub fn dao(&self) -> &Dao {
        &self.dao
    }

    /// Prefixed table name.
    pub fn table(&self, name: &str) -> String {
        format!("{}_{}", self.app, name)
    }

    /// Run the builder's SELECT and return the first row.
    pub async fn fetch_one(&self, builder: &QueryBuilder, label: &str) -> DbResult<Option<JsonRow>> {
        let (sql, params) = builder.build();
        self.fetch_one_raw(&sql, &params, label).await
    }

    /// Run the builder's SELECT and return every row.
    pub async fn fetch_all(&self, builder: &QueryBuilder, label: &str) -> DbResult<Vec<JsonRow>> {
        let (sql, params) = builder.build();
        self.fetch_all_raw(&sql, &params, label).await
    }

    /// Run the builder's COUNT query. No row counts as zero.
    pub async fn fetch_count(&self, builder: &QueryBuilder, label: &str) -> DbResult<i64> {
        let (sql, params) = builder.build_count();
        let Some(row) = self.fetch_one_raw(&sql, &params, label).await? else {
            return Ok(0);
        };
        match row.values().next() {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| DbError::row_mapping(format!("{}: count is not an integer", label))),
            Some(serde_json::Value::Null) | None => Ok(0),
            Some(other) => Err(DbError::row_mapping(format!(
                "{}: unexpected count value {}",
                label, other
            ))),
        }
    }

    pub async fn fetch_one_raw(
        &self,
        sql: &str,
        params: &[QueryParam],
        label: &str,
    ) -> DbResult<Option<JsonRow>> {
        Ok(self.run(sql, params, Fetch::One, label).await?.into_row())
    }

    pub async fn fetch_all_raw(
        &self,
        sql: &str,
        params: &[QueryParam],
        label: &str,
    ) -> DbResult<Vec<JsonRow>> {
        Ok(self.run(sql, params, Fetch::All, label).await?.into_rows())
    }

    /// Run an UPDATE or DELETE, reporting whether any row matched.
    pub async fn execute_update(
        &self,
        sql: &str,
        params: &[QueryParam],
        label: &str,
    ) -> DbResult<UpdateOutcome> {
        let affected = self
            .run(sql, params, Fetch::None, label)
            .await?
            .rows_affected()
            .unwrap_or(0);
        Ok(UpdateOutcome::from_affected(affected))
    }

    /// DELETE from `table` (unprefixed) using the builder's WHERE state.
    pub fn build_delete(&self, table: &str, builder: &QueryBuilder) -> (String, Vec<QueryParam>) {
        let mut sql = format!("DELETE FROM {}", self.table(table));
        let conditions = builder.where_conditions();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        (sql, builder.where_params().to_vec())
    }

    async fn run(
        &self,
        sql: &str,
        params: &[QueryParam],
        fetch: Fetch,
        label: &str,
    ) -> DbResult<crate::db::QueryOutput> {
        debug!(label = label, sql = %sql, params = ?params, "Repository query");
        self.dao
            .execute(sql, params, fetch)
            .await
            .map_err(|e| {
                let e = e.with_label(label);
                error!(label = label, error = %e, "Repository query failed");
                e
            })
    }
}

impl Participant for RepositoryBase {
    fn dao(&self) -> Option<&Dao> {
        Some(&self.dao)
    }
}
