//! `-field,field` ordering input checked against an allow-list of columns.

use super::Specification;
use crate::db::{QueryBuilder, QueryParam};

/// A field callers may order by, and the column it sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingField {
    pub name: &'static str,
    pub column: &'static str,
}

impl OrderingField {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self { name, column }
    }
}

const DEFAULT_FIELDS: &[OrderingField] = &[
    OrderingField::new("id", "id"),
    OrderingField::new("year", "year"),
];

const PRODUCT_FIELDS: &[OrderingField] = &[
    OrderingField::new("id", "product_id"),
    OrderingField::new("year", "year"),
];

/// Ordering parsed from input such as `"-year,id"`.
///
/// A leading `-` sorts descending. Fields outside the allow-list are dropped;
/// when none remain the ordering falls back to `-id` (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    allowed: &'static [OrderingField],
    fields: Vec<String>,
}

impl Ordering {
    const DEFAULT: &'static str = "-id";

    /// Ordering over the generic `id` / `year` allow-list.
    pub fn new(input: Option<&str>) -> Self {
        Self::with_fields(input, DEFAULT_FIELDS)
    }

    /// Ordering for product listings; `id` sorts on `product_id`.
    pub fn for_products(input: Option<&str>) -> Self {
        Self::with_fields(input, PRODUCT_FIELDS)
    }

    pub fn with_fields(input: Option<&str>, allowed: &'static [OrderingField]) -> Self {
        let mut fields: Vec<String> = input
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| {
                let name = f.strip_prefix('-').unwrap_or(*f);
                allowed.iter().any(|a| a.name == name)
            })
            .map(String::from)
            .collect();

        if fields.is_empty() {
            fields.push(Self::DEFAULT.to_string());
        }
        Self { allowed, fields }
    }

    /// The accepted fields, in input order, with their `-` prefixes.
    pub fn ordering_fields(&self) -> &[String] {
        &self.fields
    }

    fn terms(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| {
                let (name, direction) = match field.strip_prefix('-') {
                    Some(name) => (name, "DESC"),
                    None => (field.as_str(), "ASC"),
                };
                let column = self
                    .allowed
                    .iter()
                    .find(|a| a.name == name)
                    .map_or(name, |a| a.column);
                format!("{} {}", column, direction)
            })
            .collect()
    }
}

impl Specification for Ordering {
    fn to_sql(&self) -> (String, Vec<QueryParam>) {
        (format!("ORDER BY {}", self.terms().join(", ")), Vec::new())
    }

    fn apply_to(&self, builder: &mut QueryBuilder) {
        for term in self.terms() {
            builder.order_by(term, Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_dropped() {
        let o = Ordering::new(Some("price,-year"));
        assert_eq!(o.ordering_fields(), ["-year"]);
    }

    #[test]
    fn test_whitespace_tolerated() {
        let o = Ordering::new(Some("year, -id"));
        assert_eq!(o.to_sql().0, "ORDER BY year ASC, id DESC");
    }

    #[test]
    fn test_product_id_column() {
        let o = Ordering::for_products(None);
        assert_eq!(o.to_sql().0, "ORDER BY product_id DESC");
    }
}
