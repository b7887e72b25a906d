//! Account data models.

use crate::db::{JsonRow, RowExt};
use crate::error::DbResult;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A registered user, joined with its group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
}

impl User {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            email: row.get_str("email")?.to_string(),
            is_active: row.get_bool("is_active")?,
            created_at: row.get_datetime("created_at")?,
            updated_at: row.get_datetime("updated_at")?,
            group_id: row.get_opt_i64("group_id")?,
            group_name: row.get_opt_str("group_name")?.map(String::from),
        })
    }
}

/// A user joined with its group name and profile, as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWithProfile {
    #[serde(flatten)]
    pub user: User,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub info: Option<String>,
}

impl UserWithProfile {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            user: User::from_row(row)?,
            first_name: row.get_opt_str("first_name")?.map(String::from),
            last_name: row.get_opt_str("last_name")?.map(String::from),
            avatar: row.get_opt_str("avatar")?.map(String::from),
            gender: row.get_opt_str("gender")?.map(String::from),
            date_of_birth: row.get_opt_date("date_of_birth")?,
            info: row.get_opt_str("info")?.map(String::from),
        })
    }
}

/// Input for creating a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserGroup {
    pub id: i64,
    pub name: String,
}

impl UserGroup {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_str("name")?.to_string(),
        })
    }
}

/// Well-known user group names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserGroupKind {
    User,
    Moderator,
    Admin,
}

impl UserGroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

/// Personal details attached to a user, one profile per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub info: Option<String>,
    pub user_id: i64,
}

impl UserProfile {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            first_name: row.get_opt_str("first_name")?.map(String::from),
            last_name: row.get_opt_str("last_name")?.map(String::from),
            avatar: row.get_opt_str("avatar")?.map(String::from),
            gender: row.get_opt_str("gender")?.map(String::from),
            date_of_birth: row.get_opt_date("date_of_birth")?,
            info: row.get_opt_str("info")?.map(String::from),
            user_id: row.get_i64("user_id")?,
        })
    }
}

/// Input for creating a profile.
#[derive(Debug, Clone, Default)]
pub struct NewUserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub info: Option<String>,
}

/// Partial profile update. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub gender: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub info: Option<Option<String>>,
}

impl UserProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.avatar.is_none()
            && self.gender.is_none()
            && self.date_of_birth.is_none()
            && self.info.is_none()
    }
}

/// An expiring token issued to a user: activation, password reset or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: i64,
}

/// Single-use account activation token; at most one per user.
pub type ActivationToken = Token;
/// Password reset token; at most one per user.
pub type PasswordResetToken = Token;
/// Refresh token; a user may hold several.
pub type RefreshToken = Token;

impl Token {
    pub fn from_row(row: &JsonRow) -> DbResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            token: row.get_str("token")?.to_string(),
            expires_at: row.get_datetime("expires_at")?,
            user_id: row.get_i64("user_id")?,
        })
    }
}
