//! Category tree queries for the storefront menu.

use super::base::RepositoryBase;
use crate::db::{Dao, JsonRow, Participant, QueryParam, RowExt};
use crate::error::DbResult;
use crate::models::{ArticleType, MasterCategory, SubCategory};

const MENU_SQL: &str = "SELECT mc.master_category_id, mc.name AS master_name, \
     sc.sub_category_id, sc.name AS sub_name, \
     at.article_type_id, at.name AS article_name \
     FROM catalog_master_category mc \
     LEFT JOIN catalog_sub_category sc ON sc.master_category_id = mc.master_category_id \
     LEFT JOIN catalog_article_type at ON at.sub_category_id = sc.sub_category_id";

const MENU_ORDER: &str = " ORDER BY mc.name, sc.name, at.name";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    base: RepositoryBase,
}

impl CategoryRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "catalog"),
        }
    }

    /// The whole hierarchy, sorted by name at every level.
    pub async fn category_menu(&self) -> DbResult<Vec<MasterCategory>> {
        let sql = format!("{}{}", MENU_SQL, MENU_ORDER);
        let rows = self.base.fetch_all_raw(&sql, &[], "category_menu").await?;
        assemble_menu(&rows)
    }

    /// One master category with its subtree.
    pub async fn master_category(&self, master_category_id: i64) -> DbResult<Option<MasterCategory>> {
        let sql = format!("{} WHERE mc.master_category_id = %s{}", MENU_SQL, MENU_ORDER);
        let rows = self
            .base
            .fetch_all_raw(&sql, &[QueryParam::Int(master_category_id)], "master_category")
            .await?;
        Ok(assemble_menu(&rows)?.into_iter().next())
    }
}

impl Participant for CategoryRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}

/// Fold flat LEFT JOIN rows into a tree, keeping row order at every level.
fn assemble_menu(rows: &[JsonRow]) -> DbResult<Vec<MasterCategory>> {
    let mut masters: Vec<MasterCategory> = Vec::new();

    for row in rows {
        let master_id = row.get_i64("master_category_id")?;
        let master = match masters.iter().position(|m| m.id == master_id) {
            Some(idx) => &mut masters[idx],
            None => {
                masters.push(MasterCategory {
                    id: master_id,
                    name: row.get_str("master_name")?.to_string(),
                    sub_categories: Vec::new(),
                });
                let last = masters.len() - 1;
                &mut masters[last]
            }
        };

        let Some(sub_id) = row.get_opt_i64("sub_category_id")? else {
            continue;
        };
        let sub = match master.sub_categories.iter().position(|s| s.id == sub_id) {
            Some(idx) => &mut master.sub_categories[idx],
            None => {
                master.sub_categories.push(SubCategory {
                    id: sub_id,
                    name: row.get_str("sub_name")?.to_string(),
                    article_types: Vec::new(),
                });
                let last = master.sub_categories.len() - 1;
                &mut master.sub_categories[last]
            }
        };

        if let Some(article_id) = row.get_opt_i64("article_type_id")? {
            sub.article_types.push(ArticleType {
                id: article_id,
                name: row.get_str("article_name")?.to_string(),
            });
        }
    }

    Ok(masters)
}
