//! Repositories over the catalog and accounts tables.
//!
//! Every repository holds a [`Dao`](crate::db::Dao) handle and nothing else;
//! statements issued inside an atomic block are routed to the ambient
//! transaction by the DAO, so repositories never pass connections around.

mod base;
mod category;
mod product;
mod token;
mod user;
mod user_group;
mod user_profile;

pub use base::{RepositoryBase, UpdateOutcome};
pub use category::CategoryRepository;
pub use product::{ProductCriteria, ProductRepository};
pub use token::TokenRepository;
pub use user::UserRepository;
pub use user_group::UserGroupRepository;
pub use user_profile::UserProfileRepository;
