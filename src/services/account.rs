//! Account registration and activation.

use crate::db::{Atomic, UnitOfWork};
use crate::error::DbError;
use crate::models::{ActivationToken, NewUser, User, UserGroupKind};
use crate::repositories::{TokenRepository, UpdateOutcome, UserGroupRepository, UserRepository};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User with email '{0}' already exists")]
    EmailAlreadyExists(String),

    #[error("Default user group '{0}' not found")]
    GroupNotFound(String),

    #[error("Activation token is invalid or expired")]
    InvalidActivationToken,

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// A newly registered user and the token that activates it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub activation_token: ActivationToken,
}

/// Registration and activation, each atomic across the account repositories.
#[derive(Debug, Clone)]
pub struct AccountService {
    users: UserRepository,
    groups: UserGroupRepository,
    tokens: TokenRepository,
    token_ttl: Duration,
}

impl AccountService {
    pub fn new(uow: &UnitOfWork, token_ttl: Duration) -> Self {
        Self {
            users: UserRepository::new(uow.dao().clone()),
            groups: UserGroupRepository::new(uow.dao().clone()),
            tokens: TokenRepository::new(uow.dao().clone()),
            token_ttl,
        }
    }

    /// Build from individually constructed repositories. They must share one
    /// DAO or every atomic operation fails with a transaction-integrity error.
    pub fn from_repositories(
        users: UserRepository,
        groups: UserGroupRepository,
        tokens: TokenRepository,
        token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            groups,
            tokens,
            token_ttl,
        }
    }

    /// Create an inactive user in the default group together with its
    /// activation token. Nothing is written unless every step succeeds.
    pub async fn register_user(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> Result<Registration, AccountError> {
        let email = email.trim().to_lowercase();

        Atomic::new()
            .participant("user_repository", &self.users)
            .participant("user_group_repository", &self.groups)
            .participant("token_repository", &self.tokens)
            .run(|| async {
                if self.users.find_by_email(&email).await?.is_some() {
                    warn!(email = %email, "Registration rejected: email already exists");
                    return Err(AccountError::EmailAlreadyExists(email.clone()));
                }

                let group_name = UserGroupKind::User.as_str();
                let Some(group) = self.groups.find_by_name(group_name).await? else {
                    error!(group = group_name, "Default user group missing");
                    return Err(AccountError::GroupNotFound(group_name.to_string()));
                };

                let user = self
                    .users
                    .create(&NewUser {
                        email: email.clone(),
                        hashed_password: hashed_password.to_string(),
                        group_id: Some(group.id),
                    })
                    .await?;

                let token = uuid::Uuid::new_v4().to_string();
                let expires_at = token_expiry(Utc::now(), self.token_ttl)?;
                let activation_token = self
                    .tokens
                    .upsert_activation_token(user.id, &token, expires_at)
                    .await?;

                info!(user_id = user.id, group = %group.name, "User registered");
                Ok(Registration {
                    user,
                    activation_token,
                })
            })
            .await
    }

    /// Activate the user owning `token` and consume the token.
    pub async fn activate_user(&self, token: &str) -> Result<User, AccountError> {
        Atomic::new()
            .participant("user_repository", &self.users)
            .participant("token_repository", &self.tokens)
            .run(|| async {
                let Some(activation) = self.tokens.find_activation_token(token).await? else {
                    return Err(AccountError::InvalidActivationToken);
                };

                if let UpdateOutcome::NoMatch =
                    self.users.set_active(activation.user_id, true).await?
                {
                    return Err(AccountError::UserNotFound(activation.user_id));
                }
                self.tokens.delete_activation_token(token).await?;

                let user = self
                    .users
                    .find_by_id(activation.user_id)
                    .await?
                    .ok_or(AccountError::UserNotFound(activation.user_id))?;
                info!(user_id = user.id, "User activated");
                Ok(user)
            })
            .await
    }

    /// Remove expired tokens of every kind.
    pub async fn purge_expired_tokens(&self) -> Result<u64, AccountError> {
        Ok(self.tokens.delete_expired().await?)
    }
}

/// Expiry of a token issued at `now`; a lifetime past the representable
/// range is rejected rather than wrapped.
fn token_expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AccountError> {
    now.checked_add_signed(ttl).ok_or_else(|| {
        AccountError::Database(DbError::invalid_input(format!(
            "Activation token lifetime {} overflows the expiry timestamp",
            ttl
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_error_wraps_db_error() {
        let err: AccountError = DbError::integrity("mismatch").into();
        assert!(matches!(err, AccountError::Database(DbError::TransactionIntegrity { .. })));
        assert_eq!(
            AccountError::EmailAlreadyExists("a@b.c".into()).to_string(),
            "User with email 'a@b.c' already exists"
        );
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert_eq!(token_expiry(now, Duration::hours(24)).unwrap(), now + Duration::hours(24));

        let err = token_expiry(now, Duration::MAX).unwrap_err();
        assert!(matches!(err, AccountError::Database(DbError::InvalidInput { .. })));
    }
}
