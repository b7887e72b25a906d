//! Error types for the data-access layer.
//!
//! All failures raised by the DAO, the transaction context and the atomic
//! orchestrator are expressed as [`DbError`]. Driver failures are never
//! swallowed: they are wrapped with the label of the operation that issued
//! them and keep the original `sqlx::Error` as their source.

use std::fmt;
use thiserror::Error;

/// SQLSTATE codes that indicate a transaction may succeed when retried.
const RETRYABLE_SQL_STATES: &[&str] = &["40001", "40P01"];

/// Which transaction-terminating statement failed during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOperation {
    Commit,
    Rollback,
}

impl fmt::Display for CleanupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Could not acquire a pooled connection: {source}")]
    ConnectionAcquisition {
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed ({label}): {source}")]
    QueryExecution {
        /// Operation label, e.g. "ProductRepository::find_products"
        label: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction integrity violation: {message}")]
    TransactionIntegrity { message: String },

    #[error("Transaction {operation} failed: {source}")]
    Cleanup {
        operation: CleanupOperation,
        #[source]
        source: Box<DbError>,
    },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Row mapping failed: {message}")]
    RowMapping { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Wrap a driver error raised while executing a labelled statement.
    pub fn query(label: impl Into<String>, source: sqlx::Error) -> Self {
        let sql_state = match &source {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.to_string()),
            _ => None,
        };
        Self::QueryExecution {
            label: label.into(),
            sql_state,
            source,
        }
    }

    /// Create a transaction integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::TransactionIntegrity {
            message: message.into(),
        }
    }

    /// Wrap a failure of the terminating commit or rollback.
    pub fn cleanup(operation: CleanupOperation, source: DbError) -> Self {
        Self::Cleanup {
            operation,
            source: Box::new(source),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a row mapping error.
    pub fn row_mapping(message: impl Into<String>) -> Self {
        Self::RowMapping {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Replace the operation label of a query execution error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        match self {
            Self::QueryExecution {
                sql_state, source, ..
            } => Self::QueryExecution {
                label: label.into(),
                sql_state,
                source,
            },
            other => other,
        }
    }

    /// SQLSTATE reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { sql_state, .. } => sql_state.as_deref(),
            Self::Cleanup { source, .. } => source.sql_state(),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::ConnectionAcquisition { .. } => {
                Some("Increase max_connections or acquire_timeout, or release connections sooner")
            }
            Self::TransactionIntegrity { .. } => {
                Some("Construct every participating repository from the same Dao")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::ConnectionAcquisition { .. } => true,
            Self::QueryExecution {
                sql_state: Some(code),
                ..
            } => RETRYABLE_SQL_STATES.contains(&code.as_str()),
            Self::Cleanup { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Statement failures get the generic "query" label; callers that know
/// which operation failed relabel them with [`DbError::with_label`].
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::ConnectionAcquisition { source: err }
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            other => DbError::query("query", other),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_pool_timeout_maps_to_acquisition() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::ConnectionAcquisition { .. }));
        assert!(err.is_retryable());
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_row_not_found_maps_to_query_execution() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        match err {
            DbError::QueryExecution {
                label, sql_state, ..
            } => {
                assert_eq!(label, "query");
                assert!(sql_state.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_with_label_replaces_label() {
        let err = DbError::from(sqlx::Error::RowNotFound).with_label("UserRepository::find_by_id");
        assert!(err.to_string().contains("UserRepository::find_by_id"));
    }

    #[test]
    fn test_with_label_leaves_other_variants() {
        let err = DbError::invalid_input("bad").with_label("ignored");
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_cleanup_display_names_operation() {
        let err = DbError::cleanup(CleanupOperation::Commit, DbError::internal("boom"));
        assert_eq!(
            err.to_string(),
            "Transaction commit failed: Internal error: boom"
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::integrity("mismatch").is_retryable());
        assert!(!DbError::not_found("user", 7).is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = DbError::not_found("user", 42);
        assert_eq!(err.to_string(), "user not found: 42");
    }
}
