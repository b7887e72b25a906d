//! Category narrowing: joins from products up to the master category.

use super::Specification;
use crate::db::{QueryBuilder, QueryParam};

const APP_NAME: &str = "catalog";

/// Narrow products to a master category and optionally a sub category and
/// article type, joining through the category hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    master_category_id: i64,
    sub_category_id: Option<i64>,
    article_type_id: Option<i64>,
}

impl Category {
    pub fn new(
        master_category_id: i64,
        sub_category_id: Option<i64>,
        article_type_id: Option<i64>,
    ) -> Self {
        Self {
            master_category_id,
            sub_category_id,
            article_type_id,
        }
    }

    /// Join clauses from products up to the master category.
    pub fn joins(&self) -> Vec<String> {
        vec![
            format!(
                "JOIN {app}_article_type at ON {app}_products.article_type_id = at.article_type_id",
                app = APP_NAME
            ),
            format!(
                "JOIN {}_sub_category sc ON at.sub_category_id = sc.sub_category_id",
                APP_NAME
            ),
            format!(
                "JOIN {}_master_category mc ON sc.master_category_id = mc.master_category_id",
                APP_NAME
            ),
        ]
    }

    /// Conditions with their single parameter each, most general first.
    pub fn conditions(&self) -> Vec<(String, QueryParam)> {
        let mut conditions = vec![(
            "mc.master_category_id = %s".to_string(),
            QueryParam::Int(self.master_category_id),
        )];
        if let Some(sub) = self.sub_category_id {
            conditions.push(("sc.sub_category_id = %s".to_string(), QueryParam::Int(sub)));
        }
        if let Some(article) = self.article_type_id {
            conditions.push(("at.article_type_id = %s".to_string(), QueryParam::Int(article)));
        }
        conditions
    }
}

impl Specification for Category {
    fn to_sql(&self) -> (String, Vec<QueryParam>) {
        let (clauses, params): (Vec<String>, Vec<QueryParam>) =
            self.conditions().into_iter().unzip();
        (
            format!("{} WHERE {}", self.joins().join(" "), clauses.join(" AND ")),
            params,
        )
    }

    fn apply_to(&self, builder: &mut QueryBuilder) {
        for join in self.joins() {
            builder.join(join);
        }
        for (condition, param) in self.conditions() {
            builder.and_where(condition, vec![param]);
        }
    }
}
