//! PostgreSQL full-text search over product names.

use super::Specification;
use crate::db::{QueryBuilder, QueryParam};

const TSVECTOR: &str = "to_tsvector('public.english_unaccent', product_display_name)";
const TSQUERY: &str = "plainto_tsquery('public.english_unaccent', %s)";

/// Ranked full-text search over product display names (PostgreSQL).
///
/// The match predicate and the rank ordering each take the query text, so
/// they are exposed separately and land in different builder accumulators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSearch {
    query: Option<String>,
}

impl ProductSearch {
    pub fn new(query: Option<&str>) -> Self {
        let query = query.map(str::trim).filter(|q| !q.is_empty()).map(String::from);
        Self { query }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The match predicate, without the `WHERE` keyword.
    pub fn where_clause(&self) -> Option<(String, Vec<QueryParam>)> {
        let q = self.query.as_ref()?;
        Some((format!("{} @@ {}", TSVECTOR, TSQUERY), vec![QueryParam::from(q)]))
    }

    /// The rank ordering term, without the `ORDER BY` keyword.
    pub fn order_clause(&self) -> Option<(String, Vec<QueryParam>)> {
        let q = self.query.as_ref()?;
        Some((
            format!("ts_rank({}, {}) DESC", TSVECTOR, TSQUERY),
            vec![QueryParam::from(q)],
        ))
    }
}

impl Specification for ProductSearch {
    fn to_sql(&self) -> (String, Vec<QueryParam>) {
        match (self.where_clause(), self.order_clause()) {
            (Some((predicate, mut params)), Some((rank, rank_params))) => {
                params.extend(rank_params);
                (format!("WHERE {} ORDER BY {}", predicate, rank), params)
            }
            _ => (String::new(), Vec::new()),
        }
    }

    fn is_empty(&self) -> bool {
        self.query.is_none()
    }

    fn apply_to(&self, builder: &mut QueryBuilder) {
        if let Some((predicate, params)) = self.where_clause() {
            builder.and_where(predicate, params);
        }
        if let Some((rank, params)) = self.order_clause() {
            builder.order_by(rank, params);
        }
    }
}
