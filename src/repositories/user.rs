//! Users, joined with their group and optionally their profile.

use super::base::{RepositoryBase, UpdateOutcome};
use crate::db::{Dao, Participant, QueryBuilder, QueryParam, RowExt};
use crate::error::{DbError, DbResult};
use crate::models::{NewUser, User, UserWithProfile};
use crate::params;
use crate::specifications::{Pagination, Specification};

const USER_COLUMNS: [&str; 7] = [
    "u.id",
    "u.email",
    "u.is_active",
    "u.created_at",
    "u.updated_at",
    "u.group_id",
    "g.name AS group_name",
];

const PROFILE_COLUMNS: [&str; 6] = [
    "p.first_name",
    "p.last_name",
    "p.avatar",
    "p.gender",
    "p.date_of_birth",
    "p.info",
];

#[derive(Debug, Clone)]
pub struct UserRepository {
    base: RepositoryBase,
}

impl UserRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "accounts"),
        }
    }

    /// Users joined with their group name.
    fn user_query(&self) -> QueryBuilder {
        let mut qb = QueryBuilder::new(format!("{} u", self.base.table("users")));
        qb.select(USER_COLUMNS).join(format!(
            "LEFT JOIN {} g ON u.group_id = g.id",
            self.base.table("user_groups")
        ));
        qb
    }

    /// Users joined with their group name and profile.
    fn user_with_profile_query(&self) -> QueryBuilder {
        let mut qb = self.user_query();
        qb.select(PROFILE_COLUMNS).join(format!(
            "LEFT JOIN {} p ON u.id = p.user_id",
            self.base.table("user_profiles")
        ));
        qb
    }

    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let mut qb = self.user_query();
        qb.and_where("u.id = %s", params![id]);
        self.base
            .fetch_one(&qb, "find_user_by_id")
            .await?
            .as_ref()
            .map(User::from_row)
            .transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let mut qb = self.user_query();
        qb.and_where("u.email = %s", params![email]);
        self.base
            .fetch_one(&qb, "find_user_by_email")
            .await?
            .as_ref()
            .map(User::from_row)
            .transpose()
    }

    pub async fn find_with_profile_by_id(&self, id: i64) -> DbResult<Option<UserWithProfile>> {
        let mut qb = self.user_with_profile_query();
        qb.and_where("u.id = %s", params![id]);
        self.base
            .fetch_one(&qb, "find_user_with_profile_by_id")
            .await?
            .as_ref()
            .map(UserWithProfile::from_row)
            .transpose()
    }

    pub async fn find_with_profile_by_email(
        &self,
        email: &str,
    ) -> DbResult<Option<UserWithProfile>> {
        let mut qb = self.user_with_profile_query();
        qb.and_where("u.email = %s", params![email]);
        self.base
            .fetch_one(&qb, "find_user_with_profile_by_email")
            .await?
            .as_ref()
            .map(UserWithProfile::from_row)
            .transpose()
    }

    /// Insert an inactive user and return it with its group name.
    pub async fn create(&self, user: &NewUser) -> DbResult<User> {
        let (sql, params) = insert_user(&self.base.table("users"), user);
        let row = self
            .base
            .fetch_one_raw(&sql, &params, "create_user")
            .await?
            .ok_or_else(|| DbError::internal("INSERT ... RETURNING produced no row"))?;
        let id = row.get_i64("id")?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> DbResult<UpdateOutcome> {
        let sql = format!(
            "UPDATE {} SET is_active = %s, updated_at = CURRENT_TIMESTAMP WHERE id = %s",
            self.base.table("users")
        );
        self.base
            .execute_update(&sql, &params![is_active, id], "set_user_active")
            .await
    }

    /// Store a new password hash.
    pub async fn update_password(&self, id: i64, hashed_password: &str) -> DbResult<UpdateOutcome> {
        let sql = format!(
            "UPDATE {} SET hashed_password = %s, updated_at = CURRENT_TIMESTAMP WHERE id = %s",
            self.base.table("users")
        );
        self.base
            .execute_update(&sql, &params![hashed_password, id], "update_user_password")
            .await
    }

    pub async fn delete(&self, id: i64) -> DbResult<UpdateOutcome> {
        let mut qb = QueryBuilder::new(self.base.table("users"));
        qb.and_where("id = %s", params![id]);
        let (sql, params) = self.base.build_delete("users", &qb);
        self.base.execute_update(&sql, &params, "delete_user").await
    }

    /// One page of users with their profiles, newest first.
    pub async fn list(&self, pagination: Pagination) -> DbResult<Vec<UserWithProfile>> {
        let mut qb = self.user_with_profile_query();
        qb.order_by("u.created_at DESC", vec![])
            .order_by("u.id DESC", vec![]);
        pagination.apply_to(&mut qb);
        self.base
            .fetch_all(&qb, "list_users")
            .await?
            .iter()
            .map(UserWithProfile::from_row)
            .collect()
    }

    pub async fn count(&self) -> DbResult<i64> {
        let qb = QueryBuilder::new(self.base.table("users"));
        self.base.fetch_count(&qb, "count_users").await
    }
}

/// The INSERT for `user`. A missing group binds as an integer NULL so
/// PostgreSQL accepts it for the `group_id` column.
fn insert_user(table: &str, user: &NewUser) -> (String, Vec<QueryParam>) {
    let sql = format!(
        "INSERT INTO {} (email, hashed_password, is_active, created_at, updated_at, group_id) \
         VALUES (%s, %s, %s, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, %s) RETURNING id",
        table
    );
    let params = params![
        user.email.as_str(),
        user.hashed_password.as_str(),
        false,
        user.group_id,
    ];
    (sql, params)
}

impl Participant for UserRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NullType;

    #[test]
    fn test_insert_without_group_binds_integer_null() {
        let user = NewUser {
            email: "ann@example.com".to_string(),
            hashed_password: "hash".to_string(),
            group_id: None,
        };
        let (sql, params) = insert_user("accounts_users", &user);
        assert!(sql.starts_with("INSERT INTO accounts_users (email, hashed_password, is_active"));
        assert_eq!(sql.matches("%s").count(), params.len());
        assert_eq!(params[3], QueryParam::Null(NullType::Int));
    }

    #[test]
    fn test_insert_with_group() {
        let user = NewUser {
            email: "ann@example.com".to_string(),
            hashed_password: "hash".to_string(),
            group_id: Some(2),
        };
        let (_, params) = insert_user("accounts_users", &user);
        assert_eq!(
            params,
            vec![
                QueryParam::from("ann@example.com"),
                QueryParam::from("hash"),
                QueryParam::Bool(false),
                QueryParam::Int(2),
            ]
        );
    }
}
