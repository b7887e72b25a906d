//! Product listing with paging, filters and search.

use super::base::RepositoryBase;
use crate::db::{Dao, Participant, QueryBuilder, RowExt};
use crate::error::DbResult;
use crate::models::{AvailableFilters, Product, YearRange};
use crate::specifications::{
    Category, Ordering, Pagination, ProductFilter, ProductSearch, Specification,
};

const PRODUCT_COLUMNS: [&str; 5] = [
    "product_id",
    "gender",
    "year",
    "product_display_name",
    "image_url",
];

/// Everything that narrows or orders a product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCriteria {
    pub pagination: Pagination,
    pub ordering: Ordering,
    pub filter: ProductFilter,
    pub search: ProductSearch,
    pub category: Option<Category>,
}

impl ProductCriteria {
    /// Default product ordering, no filters.
    pub fn new(pagination: Pagination) -> Self {
        Self {
            pagination,
            ordering: Ordering::for_products(None),
            filter: ProductFilter::default(),
            search: ProductSearch::default(),
            category: None,
        }
    }

    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_filter(mut self, filter: ProductFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_search(mut self, search: ProductSearch) -> Self {
        self.search = search;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    base: RepositoryBase,
}

impl ProductRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "catalog"),
        }
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.base.table("products"))
    }

    /// One page of products matching `criteria`, plus the total match count.
    ///
    /// Search rank orders first, with the requested ordering as tie-breaker.
    pub async fn find_products(&self, criteria: &ProductCriteria) -> DbResult<(Vec<Product>, i64)> {
        let mut qb = self.builder();
        qb.select(PRODUCT_COLUMNS);

        if let Some(category) = &criteria.category {
            category.apply_to(&mut qb);
        }
        if !criteria.filter.is_empty() {
            criteria.filter.apply_to(&mut qb);
        }
        if !criteria.search.is_empty() {
            criteria.search.apply_to(&mut qb);
        }

        let total = self.base.fetch_count(&qb, "count_products").await?;

        criteria.ordering.apply_to(&mut qb);
        criteria.pagination.apply_to(&mut qb);

        let rows = self.base.fetch_all(&qb, "find_products").await?;
        let products = rows
            .iter()
            .map(Product::from_row)
            .collect::<DbResult<Vec<_>>>()?;
        Ok((products, total))
    }

    pub async fn find_by_id(&self, product_id: i64) -> DbResult<Option<Product>> {
        let mut qb = self.builder();
        qb.select(PRODUCT_COLUMNS)
            .and_where("product_id = %s", vec![product_id.into()]);
        self.base
            .fetch_one(&qb, "find_product_by_id")
            .await?
            .as_ref()
            .map(Product::from_row)
            .transpose()
    }

    /// Distinct genders and the year range present in the catalog.
    pub async fn available_filters(&self) -> DbResult<AvailableFilters> {
        let mut qb = self.builder();
        qb.select(["DISTINCT gender"])
            .and_where("gender IS NOT NULL", vec![])
            .order_by("gender", vec![]);
        let genders = self
            .base
            .fetch_all(&qb, "available_genders")
            .await?
            .iter()
            .map(|row| row.get_str("gender").map(String::from))
            .collect::<DbResult<Vec<_>>>()?;

        qb.reset()
            .select(["MIN(year) AS min_year", "MAX(year) AS max_year"]);
        let year = match self.base.fetch_one(&qb, "available_years").await? {
            Some(row) => match (row.get_opt_i64("min_year")?, row.get_opt_i64("max_year")?) {
                (Some(min), Some(max)) => Some(YearRange { min, max }),
                _ => None,
            },
            None => None,
        };

        Ok(AvailableFilters { genders, year })
    }
}

impl Participant for ProductRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}
