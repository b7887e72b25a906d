//! Database access layer.
//!
//! This module provides:
//! - Connection pool construction
//! - The transaction-aware [`Dao`]
//! - The task-local ambient [`TransactionContext`]
//! - Cross-repository atomicity ([`Atomic`], [`atomic`], [`UnitOfWork`])
//! - The [`QueryBuilder`] and portable `%s` parameters
//! - Row decoding into JSON maps

pub mod atomic;
pub mod dao;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod query_builder;
pub mod transaction;
pub mod types;

pub use atomic::{Atomic, Participant, UnitOfWork, atomic};
pub use dao::{Dao, Fetch, QueryOutput, TransactionStats};
pub use macros::DatabaseType;
pub use params::{NullType, QueryParam};
pub use pool::DbPool;
pub use query_builder::QueryBuilder;
pub use transaction::{DbTransaction, IsolationLevel, TransactionContext};
pub use types::{JsonRow, RowExt, RowToJson};
