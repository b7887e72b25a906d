//! Query parameters and placeholder handling.
//!
//! SQL handed to the DAO is written with portable `%s` placeholders (and `%%`
//! for a literal percent sign). Before execution the placeholders are expanded
//! to the backend's native style and the [`QueryParam`] values are bound in
//! order.

use crate::db::DatabaseType;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{Postgres, Sqlite};

/// Timestamp layout matching SQLite's `CURRENT_TIMESTAMP`, so stored values
/// compare correctly as text.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared type of a NULL parameter.
///
/// PostgreSQL types every bind parameter, and will not assign a text NULL to
/// an integer column, so a NULL carries the type of the value it stands in for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullType {
    #[default]
    Text,
    Bool,
    Int,
    Float,
    Json,
    Timestamp,
    Date,
}

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value of the given type
    #[serde(serialize_with = "serialize_null")]
    Null(NullType),
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// JSON document
    Json(serde_json::Value),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
}

fn serialize_null<S: serde::Serializer>(_: &NullType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_none()
}

impl QueryParam {
    /// An untyped (text) NULL.
    pub const NULL: Self = Self::Null(NullType::Text);

    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&String> for QueryParam {
    fn from(v: &String) -> Self {
        Self::String(v.clone())
    }
}

impl From<serde_json::Value> for QueryParam {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<DateTime<Utc>> for QueryParam {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<NaiveDate> for QueryParam {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

/// Rust types that map onto a single parameter type, so `None` can be bound
/// as a NULL of that type.
pub trait ParamType {
    const NULL_TYPE: NullType;
}

macro_rules! param_type {
    ($null:ident: $($ty:ty),+) => {
        $(impl ParamType for $ty {
            const NULL_TYPE: NullType = NullType::$null;
        })+
    };
}

param_type!(Bool: bool);
param_type!(Int: i32, i64, u32);
param_type!(Float: f64);
param_type!(Text: &str, String, &String);
param_type!(Json: serde_json::Value);
param_type!(Timestamp: DateTime<Utc>);
param_type!(Date: NaiveDate);

impl<T: Into<QueryParam> + ParamType> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null(T::NULL_TYPE), Into::into)
    }
}

/// Build a `Vec<QueryParam>` from heterogeneous values.
///
/// ```ignore
/// let params = params![42, "Men", true];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::db::params::QueryParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::params::QueryParam::from($value)),+]
    };
}

/// Native placeholder syntax of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` (PostgreSQL)
    Numbered,
    /// `?` (SQLite)
    Question,
}

impl From<DatabaseType> for PlaceholderStyle {
    fn from(db: DatabaseType) -> Self {
        match db {
            DatabaseType::Postgres => Self::Numbered,
            DatabaseType::SQLite => Self::Question,
        }
    }
}

/// Rewrite `%s` placeholders into the backend style and `%%` into `%`.
///
/// Fails when the number of placeholders differs from `param_count`, so a
/// misaligned parameter list never reaches the driver.
pub fn expand_placeholders(
    sql: &str,
    style: PlaceholderStyle,
    param_count: usize,
) -> DbResult<String> {
    let mut out = String::with_capacity(sql.len() + param_count * 2);
    let mut chars = sql.chars().peekable();
    let mut index = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                index += 1;
                match style {
                    PlaceholderStyle::Numbered => {
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                    PlaceholderStyle::Question => out.push('?'),
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    if index != param_count {
        return Err(DbError::invalid_input(format!(
            "Query has {} placeholder(s) but {} parameter(s) were supplied",
            index, param_count
        )));
    }
    Ok(out)
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null(NullType::Text) => query.bind(None::<String>),
        QueryParam::Null(NullType::Bool) => query.bind(None::<bool>),
        QueryParam::Null(NullType::Int) => query.bind(None::<i64>),
        QueryParam::Null(NullType::Float) => query.bind(None::<f64>),
        QueryParam::Null(NullType::Json) => query.bind(None::<Json<serde_json::Value>>),
        QueryParam::Null(NullType::Timestamp) => query.bind(None::<DateTime<Utc>>),
        QueryParam::Null(NullType::Date) => query.bind(None::<NaiveDate>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
        QueryParam::Timestamp(v) => query.bind(*v),
        QueryParam::Date(v) => query.bind(*v),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        // SQLite NULLs are untyped
        QueryParam::Null(_) => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite doesn't have native JSON type, store as string
        QueryParam::Json(v) => query.bind(v.to_string()),
        QueryParam::Timestamp(v) => query.bind(v.format(SQLITE_TIMESTAMP_FORMAT).to_string()),
        QueryParam::Date(v) => query.bind(v.format("%Y-%m-%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        let sql = expand_placeholders(
            "SELECT * FROM t WHERE a = %s AND b = %s",
            PlaceholderStyle::Numbered,
            2,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
    }

    #[test]
    fn test_question_placeholders() {
        let sql = expand_placeholders("LIMIT %s OFFSET %s", PlaceholderStyle::Question, 2).unwrap();
        assert_eq!(sql, "LIMIT ? OFFSET ?");
    }

    #[test]
    fn test_escaped_percent() {
        let sql = expand_placeholders(
            "SELECT * FROM t WHERE name LIKE 'a%%' AND id = %s",
            PlaceholderStyle::Numbered,
            1,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name LIKE 'a%' AND id = $1");
    }

    #[test]
    fn test_lone_percent_is_kept() {
        let sql = expand_placeholders("SELECT 10 % 3", PlaceholderStyle::Question, 0).unwrap();
        assert_eq!(sql, "SELECT 10 % 3");
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let err = expand_placeholders("WHERE a = %s", PlaceholderStyle::Question, 2).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_params_macro_converts_values() {
        let params = params![1, "Men", true, None::<i64>];
        assert_eq!(
            params,
            vec![
                QueryParam::Int(1),
                QueryParam::String("Men".into()),
                QueryParam::Bool(true),
                QueryParam::Null(NullType::Int),
            ]
        );
        assert!(params![].is_empty());
    }

    #[test]
    fn test_type_name() {
        assert_eq!(QueryParam::NULL.type_name(), "null");
        assert_eq!(QueryParam::from(2.5).type_name(), "float");
        assert!(QueryParam::from(None::<String>).is_null());
    }

    #[test]
    fn test_none_keeps_its_type() {
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null(NullType::Int));
        assert_eq!(QueryParam::from(None::<bool>), QueryParam::Null(NullType::Bool));
        assert_eq!(QueryParam::from(None::<&str>), QueryParam::Null(NullType::Text));
        assert_eq!(
            QueryParam::from(None::<DateTime<Utc>>),
            QueryParam::Null(NullType::Timestamp)
        );
        assert_eq!(QueryParam::from(Some(7i64)), QueryParam::Int(7));
    }

    #[test]
    fn test_typed_null_serializes_as_null() {
        let json = serde_json::to_value(params![None::<i64>, 1]).unwrap();
        assert_eq!(json, serde_json::json!([null, 1]));
    }
}
