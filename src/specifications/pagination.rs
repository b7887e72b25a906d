//! Page-number pagination.

use super::Specification;
use crate::db::{QueryBuilder, QueryParam};

/// Page-number pagination. Pages are 1-based; page 0 is treated as page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Rows to skip: `(page - 1) * per_page`.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// Number of pages needed for `total_items` rows.
    pub fn total_pages(&self, total_items: i64) -> i64 {
        if self.per_page == 0 || total_items <= 0 {
            return 0;
        }
        (total_items + self.limit() - 1) / self.limit()
    }
}

impl Specification for Pagination {
    fn to_sql(&self) -> (String, Vec<QueryParam>) {
        (
            "OFFSET %s LIMIT %s".to_string(),
            vec![QueryParam::Int(self.offset()), QueryParam::Int(self.limit())],
        )
    }

    fn apply_to(&self, builder: &mut QueryBuilder) {
        builder.limit(self.limit()).offset(self.offset());
    }
}
