//! Dynamic SELECT assembly.
//!
//! [`QueryBuilder`] collects clause fragments and their `%s` parameters and
//! renders them in a fixed order, so parameters always line up with their
//! placeholders:
//!
//! ```text
//! SELECT <fields|*> FROM <table> [joins] [WHERE a AND b] [ORDER BY x, y] [LIMIT %s] [OFFSET %s]
//! ```
//!
//! [`QueryBuilder::build_count`] renders the matching `SELECT COUNT(*)` over
//! the same joins and conditions, with the WHERE parameters only. Taking both
//! from one builder state keeps a page and its total consistent.

use crate::db::params::QueryParam;

/// Stateful, resettable SELECT builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    table: String,
    fields: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<String>,
    order_clauses: Vec<String>,
    where_params: Vec<QueryParam>,
    order_params: Vec<QueryParam>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryBuilder {
    /// Create a builder selecting from `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Add to the selected fields. With none selected the query uses `*`.
    pub fn select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn from_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    /// Append a full join clause, e.g. `JOIN b ON a.id = b.a_id`. Blank
    /// clauses are ignored.
    pub fn join(&mut self, clause: impl Into<String>) -> &mut Self {
        let clause = clause.into();
        if !clause.trim().is_empty() {
            self.joins.push(clause);
        }
        self
    }

    /// Add a condition, AND-ed with the others.
    ///
    /// A blank condition adds no clause but its parameters are still kept.
    pub fn and_where(&mut self, condition: impl Into<String>, params: Vec<QueryParam>) -> &mut Self {
        let condition = condition.into();
        if !condition.trim().is_empty() {
            self.conditions.push(condition);
        }
        self.where_params.extend(params);
        self
    }

    /// Append an ORDER BY term; parameters are for expressions such as a rank.
    pub fn order_by(&mut self, clause: impl Into<String>, params: Vec<QueryParam>) -> &mut Self {
        let clause = clause.into();
        if !clause.trim().is_empty() {
            self.order_clauses.push(clause);
        }
        self.order_params.extend(params);
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Clear everything except the table.
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::new(std::mem::take(&mut self.table));
        self
    }

    /// Render the SELECT and its parameters in placeholder order.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", fields, self.table);
        let mut params = self.where_params.clone();

        self.push_joins_and_where(&mut sql);

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
            params.extend(self.order_params.iter().cloned());
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT %s");
            params.push(QueryParam::Int(limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET %s");
            params.push(QueryParam::Int(offset));
        }

        (sql, params)
    }

    /// Render `SELECT COUNT(*)` over the same joins and conditions.
    pub fn build_count(&self) -> (String, Vec<QueryParam>) {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        self.push_joins_and_where(&mut sql);
        (sql, self.where_params.clone())
    }

    fn push_joins_and_where(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn where_conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn where_params(&self) -> &[QueryParam] {
        &self.where_params
    }
}
