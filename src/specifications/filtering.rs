//! Product filters over release year and gender.

use super::Specification;
use crate::db::{QueryBuilder, QueryParam};
use crate::error::{DbError, DbResult};
use std::collections::BTreeSet;

/// Product filters: an inclusive year range and a set of genders.
///
/// Gender input is case-insensitive and stored capitalized (`"men"` becomes
/// `"Men"`). Genders render in sorted order so the SQL is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    min_year: Option<i32>,
    max_year: Option<i32>,
    genders: BTreeSet<String>,
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_year_range(&mut self, min_year: Option<i32>, max_year: Option<i32>) -> &mut Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }

    /// Replace the gender set.
    pub fn set_genders<I, S>(&mut self, genders: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.genders = genders
            .into_iter()
            .filter_map(|g| capitalize(g.as_ref()))
            .collect();
        self
    }

    /// Replace the gender set from a comma-separated list such as `"men,women"`.
    pub fn set_genders_csv(&mut self, genders: &str) -> &mut Self {
        self.set_genders(genders.split(','))
    }

    /// Set a filter by name: `min_year`, `max_year` or `gender`.
    ///
    /// Unknown fields and blank values are ignored.
    pub fn add_filter(&mut self, field: &str, value: &str) -> DbResult<&mut Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self);
        }
        match field {
            "min_year" => self.min_year = Some(parse_year(field, value)?),
            "max_year" => self.max_year = Some(parse_year(field, value)?),
            "gender" => {
                self.set_genders_csv(value);
            }
            _ => {}
        }
        Ok(self)
    }

    pub fn min_year(&self) -> Option<i32> {
        self.min_year
    }

    pub fn max_year(&self) -> Option<i32> {
        self.max_year
    }

    pub fn genders(&self) -> impl Iterator<Item = &str> {
        self.genders.iter().map(String::as_str)
    }

    fn conditions(&self) -> Vec<(String, Vec<QueryParam>)> {
        let mut conditions = Vec::new();
        if let Some(min) = self.min_year {
            conditions.push(("year >= %s".to_string(), vec![QueryParam::from(min)]));
        }
        if let Some(max) = self.max_year {
            conditions.push(("year <= %s".to_string(), vec![QueryParam::from(max)]));
        }
        if !self.genders.is_empty() {
            let placeholders = vec!["%s"; self.genders.len()].join(", ");
            conditions.push((
                format!("gender IN ({})", placeholders),
                self.genders.iter().map(QueryParam::from).collect(),
            ));
        }
        conditions
    }
}

impl Specification for ProductFilter {
    fn to_sql(&self) -> (String, Vec<QueryParam>) {
        let conditions = self.conditions();
        if conditions.is_empty() {
            return (String::new(), Vec::new());
        }
        let (clauses, params): (Vec<String>, Vec<Vec<QueryParam>>) =
            conditions.into_iter().unzip();
        (
            format!("WHERE {}", clauses.join(" AND ")),
            params.into_iter().flatten().collect(),
        )
    }

    fn is_empty(&self) -> bool {
        self.min_year.is_none() && self.max_year.is_none() && self.genders.is_empty()
    }

    fn apply_to(&self, builder: &mut QueryBuilder) {
        for (condition, params) in self.conditions() {
            builder.and_where(condition, params);
        }
    }
}

fn capitalize(raw: &str) -> Option<String> {
    let mut chars = raw.trim().chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

fn parse_year(field: &str, value: &str) -> DbResult<i32> {
    value
        .parse()
        .map_err(|_| DbError::invalid_input(format!("{} must be an integer, got '{}'", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_filter() {
        let mut f = ProductFilter::new();
        f.set_year_range(Some(2020), Some(2023))
            .set_genders(["women", "MEN"]);
        let (sql, params) = f.to_sql();
        assert_eq!(
            sql,
            "WHERE year >= %s AND year <= %s AND gender IN (%s, %s)"
        );
        assert_eq!(
            params,
            vec![
                QueryParam::Int(2020),
                QueryParam::Int(2023),
                QueryParam::String("Men".into()),
                QueryParam::String("Women".into()),
            ]
        );
    }

    #[test]
    fn test_csv_genders_deduplicated() {
        let mut f = ProductFilter::new();
        f.set_genders_csv("men, Men ,,boys");
        assert_eq!(f.genders().collect::<Vec<_>>(), ["Boys", "Men"]);
    }

    #[test]
    fn test_add_filter() {
        let mut f = ProductFilter::new();
        f.add_filter("min_year", "2019").unwrap();
        f.add_filter("gender", "girls").unwrap();
        f.add_filter("color", "red").unwrap();
        assert_eq!(f.min_year(), Some(2019));
        assert_eq!(f.max_year(), None);
        assert_eq!(f.genders().collect::<Vec<_>>(), ["Girls"]);
        assert!(f.add_filter("max_year", "soon").is_err());
    }

    #[test]
    fn test_apply_to_builder() {
        let mut f = ProductFilter::new();
        f.set_year_range(Some(2020), None);
        let mut qb = QueryBuilder::new("catalog_products");
        f.apply_to(&mut qb);
        assert_eq!(
            qb.build_count(),
            (
                "SELECT COUNT(*) FROM catalog_products WHERE year >= %s".to_string(),
                vec![QueryParam::Int(2020)]
            )
        );
    }
}
