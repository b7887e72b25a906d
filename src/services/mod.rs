//! Application services composing repositories into atomic operations.

mod account;
mod catalog;

pub use account::{AccountError, AccountService, Registration};
pub use catalog::CatalogService;
