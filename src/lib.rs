//! Transactional data-access layer for the storefront catalog and accounts.
//!
//! The [`db`] module holds the transaction-aware [`Dao`](db::Dao), the
//! task-local ambient transaction and the [`Atomic`](db::Atomic) orchestrator
//! that makes several repositories commit or roll back together. Queries are
//! assembled with [`QueryBuilder`](db::QueryBuilder) from composable
//! [`specifications`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod specifications;

pub use config::Config;
pub use error::{DbError, DbResult};
