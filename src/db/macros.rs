//! Backend dispatch helpers.
//!
//! The DAO keeps one code path per backend so each can use its native row and
//! argument types. The macro here removes the repetitive `match` over the pool
//! and transaction enums.

use std::fmt;

/// Database backend type for dispatch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Postgres,
    SQLite,
}

impl DatabaseType {
    /// Detect the backend from a connection URL scheme.
    pub fn from_connection_string(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgresql"),
            Self::SQLite => write!(f, "sqlite"),
        }
    }
}

/// Macro for generating backend dispatch match arms.
///
/// `$enum` names the enum being matched (`DbPool` or `DbTransaction`).
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($enum:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::$enum::$variant($p) => $body,
            )+
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_url() {
        assert_eq!(
            DatabaseType::from_connection_string("postgres://u:p@localhost/db"),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            DatabaseType::from_connection_string("postgresql://localhost/db"),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            DatabaseType::from_connection_string("sqlite:data.db"),
            Some(DatabaseType::SQLite)
        );
        assert_eq!(DatabaseType::from_connection_string("mysql://x/y"), None);
    }

    #[test]
    fn test_database_type_display() {
        assert_eq!(DatabaseType::Postgres.to_string(), "postgresql");
        assert_eq!(DatabaseType::SQLite.to_string(), "sqlite");
    }
}
