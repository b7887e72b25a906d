//! Row decoding.
//!
//! Rows coming back from the DAO are decoded into JSON maps ([`JsonRow`]) so
//! repositories can stay backend-agnostic. Decoding uses a two-phase approach:
//!
//! 1. `TypeCategory` classifies a column into a logical category
//! 2. backend-specific decoders extract the value
//!
//! PostgreSQL classifies by the column's declared type. SQLite is dynamically
//! typed, so it classifies by the storage class of each value and only uses the
//! declared type to recognise booleans.
//!
//! [`RowExt`] provides typed accessors over decoded rows.

use crate::db::DatabaseType;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// A decoded row: column name to JSON value.
pub type JsonRow = serde_json::Map<String, JsonValue>;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // SQLite NUMERIC affinity holds integers or reals; decode as float
    if db == DatabaseType::SQLite && lower == "numeric" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower == "timestamptz" {
        return TypeCategory::TimestampTz;
    }
    if lower == "timestamp" {
        return TypeCategory::Timestamp;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower.contains("blob") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower == "text" || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Decode binary data to JSON value: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> JsonRow;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::Postgres);
                let value = postgres::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, declared);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;
    use chrono::NaiveDate;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::TimestampTz => decode_timestamptz(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Date => decode_date(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_binary_col(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.hyphenated().to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_timestamptz(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<DateTime<Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_rfc3339()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.and_utc().to_rfc3339()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_date(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!(column = idx, "Failed to decode column as text: {:?}", e);
                JsonValue::Null
            }
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, declared: TypeCategory) -> JsonValue {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return JsonValue::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(e) => {
                tracing::error!(column = idx, "Failed to read SQLite value: {:?}", e);
                return JsonValue::Null;
            }
        };

        // Declared types are advisory in SQLite, so decode unchecked by storage class.
        match storage.as_str() {
            "INTEGER" if declared == TypeCategory::Boolean => row
                .try_get_unchecked::<i64, _>(idx)
                .map(|v| JsonValue::Bool(v != 0))
                .unwrap_or(JsonValue::Null),
            "INTEGER" => row
                .try_get_unchecked::<i64, _>(idx)
                .map(|v| JsonValue::Number(v.into()))
                .unwrap_or(JsonValue::Null),
            "REAL" => row
                .try_get_unchecked::<f64, _>(idx)
                .map(float_value)
                .unwrap_or(JsonValue::Null),
            "BLOB" => row
                .try_get_unchecked::<Vec<u8>, _>(idx)
                .map(|v| decode_binary_value(&v))
                .unwrap_or(JsonValue::Null),
            _ => decode_text(row, idx, declared),
        }
    }

    fn decode_text(row: &SqliteRow, idx: usize, declared: TypeCategory) -> JsonValue {
        match row.try_get_unchecked::<String, _>(idx) {
            Ok(v) => {
                if declared == TypeCategory::Json {
                    if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                        return json;
                    }
                }
                JsonValue::String(v)
            }
            Err(e) => {
                tracing::error!(column = idx, "Failed to decode column as text: {:?}", e);
                JsonValue::Null
            }
        }
    }
}

// =============================================================================
// Typed Access
// =============================================================================

/// Typed accessors over a decoded row.
///
/// Accessors accept the representations both backends produce: SQLite
/// booleans arrive as `0`/`1` and its timestamps as `YYYY-MM-DD HH:MM:SS`.
pub trait RowExt {
    fn get_i64(&self, column: &str) -> DbResult<i64>;
    fn get_opt_i64(&self, column: &str) -> DbResult<Option<i64>>;
    fn get_str(&self, column: &str) -> DbResult<&str>;
    fn get_opt_str(&self, column: &str) -> DbResult<Option<&str>>;
    fn get_bool(&self, column: &str) -> DbResult<bool>;
    fn get_datetime(&self, column: &str) -> DbResult<DateTime<Utc>>;
    fn get_opt_date(&self, column: &str) -> DbResult<Option<NaiveDate>>;
}

/// An integral float within `i64` range, e.g. a SQLite NUMERIC `2019.0`.
fn integral_f64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn column<'a>(row: &'a JsonRow, name: &str) -> DbResult<&'a JsonValue> {
    row.get(name)
        .ok_or_else(|| DbError::row_mapping(format!("column '{}' missing from row", name)))
}

fn mismatch(name: &str, expected: &str, value: &JsonValue) -> DbError {
    DbError::row_mapping(format!(
        "column '{}' expected {}, found {}",
        name, expected, value
    ))
}

impl RowExt for JsonRow {
    fn get_i64(&self, name: &str) -> DbResult<i64> {
        self.get_opt_i64(name)?
            .ok_or_else(|| DbError::row_mapping(format!("column '{}' is NULL", name)))
    }

    fn get_opt_i64(&self, name: &str) -> DbResult<Option<i64>> {
        match column(self, name)? {
            JsonValue::Null => Ok(None),
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(Some)
                .ok_or_else(|| mismatch(name, "integer", &JsonValue::Number(n.clone()))),
            JsonValue::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| mismatch(name, "integer", &JsonValue::String(s.clone()))),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    fn get_str(&self, name: &str) -> DbResult<&str> {
        self.get_opt_str(name)?
            .ok_or_else(|| DbError::row_mapping(format!("column '{}' is NULL", name)))
    }

    fn get_opt_str(&self, name: &str) -> DbResult<Option<&str>> {
        match column(self, name)? {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => Ok(Some(s.as_str())),
            other => Err(mismatch(name, "text", other)),
        }
    }

    fn get_bool(&self, name: &str) -> DbResult<bool> {
        match column(self, name)? {
            JsonValue::Bool(b) => Ok(*b),
            JsonValue::Number(n) if n.as_i64() == Some(0) => Ok(false),
            JsonValue::Number(n) if n.as_i64() == Some(1) => Ok(true),
            other => Err(mismatch(name, "boolean", other)),
        }
    }

    fn get_datetime(&self, name: &str) -> DbResult<DateTime<Utc>> {
        let raw = self.get_str(name)?;
        parse_datetime(raw).ok_or_else(|| {
            DbError::row_mapping(format!("column '{}' is not a timestamp: {}", name, raw))
        })
    }

    fn get_opt_date(&self, name: &str) -> DbResult<Option<NaiveDate>> {
        let Some(raw) = self.get_opt_str(name)? else {
            return Ok(None);
        };
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| DbError::row_mapping(format!("column '{}' is not a date: {}", name, raw)))
    }
}

/// Parse RFC 3339 or SQLite's `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Deserialize a decoded row into a caller-supplied row shape.
pub fn from_row<T: DeserializeOwned>(row: JsonRow) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(row)).map_err(|e| DbError::row_mapping(e.to_string()))
}
