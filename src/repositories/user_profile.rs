//! User profiles, one per user.

use super::base::{RepositoryBase, UpdateOutcome};
use crate::db::{Dao, Participant, QueryBuilder, QueryParam};
use crate::error::{DbError, DbResult};
use crate::models::{NewUserProfile, UserProfile, UserProfileUpdate};
use crate::params;

const PROFILE_COLUMNS: &str =
    "id, first_name, last_name, avatar, gender, date_of_birth, info, user_id";

#[derive(Debug, Clone)]
pub struct UserProfileRepository {
    base: RepositoryBase,
}

impl UserProfileRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "accounts"),
        }
    }

    pub async fn find_by_user_id(&self, user_id: i64) -> DbResult<Option<UserProfile>> {
        let mut qb = QueryBuilder::new(self.base.table("user_profiles"));
        qb.select(PROFILE_COLUMNS.split(", "))
            .and_where("user_id = %s", params![user_id]);
        self.base
            .fetch_one(&qb, "find_profile_by_user_id")
            .await?
            .as_ref()
            .map(UserProfile::from_row)
            .transpose()
    }

    pub async fn create(&self, user_id: i64, profile: &NewUserProfile) -> DbResult<UserProfile> {
        let sql = format!(
            "INSERT INTO {} (first_name, last_name, avatar, gender, date_of_birth, info, user_id) \
             VALUES (%s, %s, %s, %s, %s, %s, %s) RETURNING {}",
            self.base.table("user_profiles"),
            PROFILE_COLUMNS
        );
        let params = params![
            profile.first_name.as_deref(),
            profile.last_name.as_deref(),
            profile.avatar.as_deref(),
            profile.gender.as_deref(),
            profile.date_of_birth,
            profile.info.as_deref(),
            user_id,
        ];
        let row = self
            .base
            .fetch_one_raw(&sql, &params, "create_profile")
            .await?
            .ok_or_else(|| DbError::internal("profile insert returned no row"))?;
        UserProfile::from_row(&row)
    }

    /// Apply the fields set in `update`. An empty update reads the profile back
    /// unchanged; `None` means the user has no profile.
    pub async fn update(
        &self,
        user_id: i64,
        update: &UserProfileUpdate,
    ) -> DbResult<Option<UserProfile>> {
        let Some((sql, params)) = update_statement(&self.base.table("user_profiles"), user_id, update)
        else {
            return self.find_by_user_id(user_id).await;
        };
        self.base
            .fetch_one_raw(&sql, &params, "update_profile")
            .await?
            .as_ref()
            .map(UserProfile::from_row)
            .transpose()
    }

    pub async fn delete(&self, user_id: i64) -> DbResult<UpdateOutcome> {
        let mut qb = QueryBuilder::new(self.base.table("user_profiles"));
        qb.and_where("user_id = %s", params![user_id]);
        let (sql, params) = self.base.build_delete("user_profiles", &qb);
        self.base.execute_update(&sql, &params, "delete_profile").await
    }
}

/// `UPDATE ... SET` over the fields present in `update`, or `None` when there
/// is nothing to change.
fn update_statement(
    table: &str,
    user_id: i64,
    update: &UserProfileUpdate,
) -> Option<(String, Vec<QueryParam>)> {
    let mut assignments = Vec::new();
    let mut params = Vec::new();

    let mut set = |column: &str, value: Option<QueryParam>| {
        if let Some(value) = value {
            assignments.push(format!("{} = %s", column));
            params.push(value);
        }
    };
    set("first_name", update.first_name.as_ref().map(|v| v.as_deref().into()));
    set("last_name", update.last_name.as_ref().map(|v| v.as_deref().into()));
    set("avatar", update.avatar.as_ref().map(|v| v.as_deref().into()));
    set("gender", update.gender.as_ref().map(|v| v.as_deref().into()));
    set("date_of_birth", update.date_of_birth.map(QueryParam::from));
    set("info", update.info.as_ref().map(|v| v.as_deref().into()));

    if assignments.is_empty() {
        return None;
    }
    params.push(QueryParam::from(user_id));
    Some((
        format!(
            "UPDATE {} SET {} WHERE user_id = %s RETURNING {}",
            table,
            assignments.join(", "),
            PROFILE_COLUMNS
        ),
        params,
    ))
}

impl Participant for UserProfileRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NullType;
    use chrono::NaiveDate;

    #[test]
    fn test_update_statement_sets_only_present_fields() {
        let update = UserProfileUpdate {
            first_name: Some(Some("Ann".to_string())),
            date_of_birth: Some(None),
            ..Default::default()
        };
        let (sql, params) = update_statement("accounts_user_profiles", 7, &update).unwrap();
        assert_eq!(
            sql,
            "UPDATE accounts_user_profiles SET first_name = %s, date_of_birth = %s \
             WHERE user_id = %s RETURNING id, first_name, last_name, avatar, gender, date_of_birth, info, user_id"
        );
        assert_eq!(
            params,
            vec![
                QueryParam::from("Ann"),
                QueryParam::Null(NullType::Date),
                QueryParam::Int(7),
            ]
        );
    }

    #[test]
    fn test_empty_update_has_no_statement() {
        assert!(update_statement("p", 1, &UserProfileUpdate::default()).is_none());

        let update = UserProfileUpdate {
            date_of_birth: Some(NaiveDate::from_ymd_opt(2000, 1, 31)),
            ..Default::default()
        };
        let (_, params) = update_statement("p", 1, &update).unwrap();
        assert_eq!(params[0], QueryParam::Date(NaiveDate::from_ymd_opt(2000, 1, 31).unwrap()));
    }
}
