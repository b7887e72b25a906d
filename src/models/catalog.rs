//! Catalog data models.

use crate::db::{JsonRow, RowExt};
use crate::error::DbResult;
use serde::Serialize;

/// A product listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub product_id: i64,
    pub gender: String,
    pub year: i64,
    pub product_display_name: String,
    pub image_url: String,
}

impl Product {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            product_id: row.get_i64("product_id")?,
            gender: row.get_str("gender")?.to_string(),
            year: row.get_i64("year")?,
            product_display_name: row.get_str("product_display_name")?.to_string(),
            image_url: row.get_opt_str("image_url")?.unwrap_or_default().to_string(),
        })
    }
}

/// Paging information returned alongside a page of products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    pub pagination: PageInfo,
}

/// Inclusive range of product years present in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub min: i64,
    pub max: i64,
}

/// Filter values available to product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailableFilters {
    /// Distinct genders, sorted.
    pub genders: Vec<String>,
    /// `None` when the catalog is empty.
    pub year: Option<YearRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubCategory {
    pub id: i64,
    pub name: String,
    pub article_types: Vec<ArticleType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterCategory {
    pub id: i64,
    pub name: String,
    pub sub_categories: Vec<SubCategory>,
}

/// The full category hierarchy: master, sub category, article type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryMenu {
    pub categories: Vec<MasterCategory>,
}
