//! User group lookups.

use super::base::RepositoryBase;
use crate::db::{Dao, Participant, QueryBuilder};
use crate::error::DbResult;
use crate::models::UserGroup;
use crate::params;

#[derive(Debug, Clone)]
pub struct UserGroupRepository {
    base: RepositoryBase,
}

impl UserGroupRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "accounts"),
        }
    }

    fn group_query(&self) -> QueryBuilder {
        let mut qb = QueryBuilder::new(self.base.table("user_groups"));
        qb.select(["id", "name"]);
        qb
    }

    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<UserGroup>> {
        let mut qb = self.group_query();
        qb.and_where("name = %s", params![name]);
        self.base
            .fetch_one(&qb, "find_group_by_name")
            .await?
            .as_ref()
            .map(UserGroup::from_row)
            .transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<UserGroup>> {
        let mut qb = self.group_query();
        qb.and_where("id = %s", params![id]);
        self.base
            .fetch_one(&qb, "find_group_by_id")
            .await?
            .as_ref()
            .map(UserGroup::from_row)
            .transpose()
    }

    pub async fn all(&self) -> DbResult<Vec<UserGroup>> {
        let mut qb = self.group_query();
        qb.order_by("id", vec![]);
        self.base
            .fetch_all(&qb, "all_groups")
            .await?
            .iter()
            .map(UserGroup::from_row)
            .collect()
    }
}

impl Participant for UserGroupRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}
