//! Catalog listing, filters and the category menu.

use crate::db::{IsolationLevel, UnitOfWork};
use crate::error::{DbError, DbResult};
use crate::models::{AvailableFilters, CatalogPage, CategoryMenu, MasterCategory, PageInfo};
use crate::repositories::{CategoryRepository, ProductCriteria, ProductRepository};
use crate::specifications::{Category, Ordering, Pagination};
use tracing::debug;

/// Read-side catalog operations.
#[derive(Debug, Clone)]
pub struct CatalogService {
    uow: UnitOfWork,
    products: ProductRepository,
    categories: CategoryRepository,
}

impl CatalogService {
    pub fn new(uow: &UnitOfWork) -> Self {
        Self {
            uow: uow.clone(),
            products: ProductRepository::new(uow.dao().clone()),
            categories: CategoryRepository::new(uow.dao().clone()),
        }
    }

    /// One page of products with pagination totals.
    ///
    /// The page and its total are read in one transaction so they describe the
    /// same snapshot. Without a configured level it runs as repeatable read.
    pub async fn catalog(&self, criteria: &ProductCriteria) -> DbResult<CatalogPage> {
        let level = self
            .uow
            .isolation()
            .unwrap_or(IsolationLevel::RepeatableRead);
        let (products, total_items) = self
            .uow
            .run_with_isolation(level, || self.products.find_products(criteria))
            .await?;

        let pagination = criteria.pagination;
        debug!(
            page = pagination.page(),
            returned = products.len(),
            total_items,
            "Catalog page loaded"
        );
        Ok(CatalogPage {
            products,
            pagination: PageInfo {
                page: pagination.page(),
                per_page: pagination.per_page(),
                total_items,
                total_pages: pagination.total_pages(total_items),
            },
        })
    }

    /// Products under a category, optionally narrowed to a sub category and
    /// article type.
    pub async fn category_products(
        &self,
        category: Category,
        pagination: Pagination,
        ordering: Option<&str>,
    ) -> DbResult<CatalogPage> {
        let criteria = ProductCriteria::new(pagination)
            .with_ordering(Ordering::for_products(ordering))
            .with_category(category);
        self.catalog(&criteria).await
    }

    pub async fn filters(&self) -> DbResult<AvailableFilters> {
        self.products.available_filters().await
    }

    pub async fn category_menu(&self) -> DbResult<CategoryMenu> {
        Ok(CategoryMenu {
            categories: self.categories.category_menu().await?,
        })
    }

    pub async fn master_category(&self, id: i64) -> DbResult<MasterCategory> {
        self.categories
            .master_category(id)
            .await?
            .ok_or_else(|| DbError::not_found("master category", id))
    }
}
