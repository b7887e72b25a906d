//! Query specifications.
//!
//! A specification is an immutable value describing one query concern
//! (paging, ordering, filtering, search, category narrowing). It renders to a
//! standalone `(fragment, params)` pair via [`Specification::to_sql`] and can
//! fold itself into a [`QueryBuilder`] via [`Specification::apply_to`], which
//! places joins, predicates and ordering terms in the builder's separate
//! accumulators so parameters stay aligned.

mod category;
mod filtering;
mod ordering;
mod pagination;
mod search;

pub use category::Category;
pub use filtering::ProductFilter;
pub use ordering::{Ordering, OrderingField};
pub use pagination::Pagination;
pub use search::ProductSearch;

use crate::db::{QueryBuilder, QueryParam};

pub trait Specification {
    /// Render as a standalone SQL fragment with `%s` parameters.
    fn to_sql(&self) -> (String, Vec<QueryParam>);

    /// True when the specification contributes nothing.
    fn is_empty(&self) -> bool {
        false
    }

    /// Fold into `builder`.
    fn apply_to(&self, builder: &mut QueryBuilder);
}
