//! Activation, password reset and refresh tokens.
//!
//! All three tables share one layout; expired rows are ignored by lookups
//! and removed by [`TokenRepository::delete_expired`].

use super::base::{RepositoryBase, UpdateOutcome};
use crate::db::{Dao, Participant, QueryBuilder, QueryParam};
use crate::error::{DbError, DbResult};
use crate::models::{ActivationToken, PasswordResetToken, RefreshToken, Token};
use crate::params;
use chrono::{DateTime, Utc};

const TOKEN_COLUMNS: [&str; 4] = ["id", "token", "expires_at", "user_id"];

/// The token tables share one layout and differ in how many rows a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Activation,
    PasswordReset,
    Refresh,
}

impl TokenKind {
    const ALL: [TokenKind; 3] = [Self::Activation, Self::PasswordReset, Self::Refresh];

    fn table(self) -> &'static str {
        match self {
            Self::Activation => "activation_tokens",
            Self::PasswordReset => "password_reset_tokens",
            Self::Refresh => "refresh_tokens",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password_reset",
            Self::Refresh => "refresh",
        }
    }

    /// Activation and reset tokens are unique per user; a new one replaces the old.
    fn one_per_user(self) -> bool {
        !matches!(self, Self::Refresh)
    }
}

#[derive(Debug, Clone)]
pub struct TokenRepository {
    base: RepositoryBase,
}

impl TokenRepository {
    pub fn new(dao: Dao) -> Self {
        Self {
            base: RepositoryBase::new(dao, "accounts"),
        }
    }

    /// Store the activation token for `user_id`, replacing any previous one.
    pub async fn upsert_activation_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<ActivationToken> {
        self.insert(TokenKind::Activation, user_id, token, expires_at)
            .await
    }

    /// An unexpired activation token.
    pub async fn find_activation_token(&self, token: &str) -> DbResult<Option<ActivationToken>> {
        self.find(TokenKind::Activation, "token", token).await
    }

    pub async fn find_activation_token_for_user(
        &self,
        user_id: i64,
    ) -> DbResult<Option<ActivationToken>> {
        self.find(TokenKind::Activation, "user_id", user_id).await
    }

    pub async fn delete_activation_token(&self, token: &str) -> DbResult<UpdateOutcome> {
        self.delete(TokenKind::Activation, token).await
    }

    /// Store the password reset token for `user_id`, replacing any previous one.
    pub async fn upsert_password_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<PasswordResetToken> {
        self.insert(TokenKind::PasswordReset, user_id, token, expires_at)
            .await
    }

    pub async fn find_password_reset_token(
        &self,
        token: &str,
    ) -> DbResult<Option<PasswordResetToken>> {
        self.find(TokenKind::PasswordReset, "token", token).await
    }

    pub async fn find_password_reset_token_for_user(
        &self,
        user_id: i64,
    ) -> DbResult<Option<PasswordResetToken>> {
        self.find(TokenKind::PasswordReset, "user_id", user_id)
            .await
    }

    pub async fn delete_password_reset_token(&self, token: &str) -> DbResult<UpdateOutcome> {
        self.delete(TokenKind::PasswordReset, token).await
    }

    /// Add a refresh token. A user may hold several, one per session.
    pub async fn create_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<RefreshToken> {
        self.insert(TokenKind::Refresh, user_id, token, expires_at)
            .await
    }

    pub async fn find_refresh_token(&self, token: &str) -> DbResult<Option<RefreshToken>> {
        self.find(TokenKind::Refresh, "token", token).await
    }

    /// Unexpired refresh tokens of a user, latest expiry first.
    pub async fn refresh_tokens_for_user(&self, user_id: i64) -> DbResult<Vec<RefreshToken>> {
        let mut qb = self.token_query(TokenKind::Refresh);
        qb.and_where("user_id = %s", params![user_id])
            .and_where("expires_at > CURRENT_TIMESTAMP", vec![])
            .order_by("expires_at DESC", vec![]);
        self.base
            .fetch_all(&qb, "refresh_tokens_for_user")
            .await?
            .iter()
            .map(Token::from_row)
            .collect()
    }

    pub async fn delete_refresh_token(&self, token: &str) -> DbResult<UpdateOutcome> {
        self.delete(TokenKind::Refresh, token).await
    }

    /// Revoke every refresh token of a user, returning how many were removed.
    pub async fn delete_user_refresh_tokens(&self, user_id: i64) -> DbResult<u64> {
        let mut qb = QueryBuilder::new(self.base.table(TokenKind::Refresh.table()));
        qb.and_where("user_id = %s", params![user_id]);
        let (sql, params) = self.base.build_delete(TokenKind::Refresh.table(), &qb);
        Ok(affected(
            self.base
                .execute_update(&sql, &params, "delete_user_refresh_tokens")
                .await?,
        ))
    }

    /// Remove expired tokens of every kind, returning how many were deleted.
    pub async fn delete_expired(&self) -> DbResult<u64> {
        let mut total = 0;
        for kind in TokenKind::ALL {
            let mut qb = QueryBuilder::new(self.base.table(kind.table()));
            qb.and_where("expires_at <= CURRENT_TIMESTAMP", vec![]);
            let (sql, params) = self.base.build_delete(kind.table(), &qb);
            total += affected(
                self.base
                    .execute_update(&sql, &params, "delete_expired_tokens")
                    .await?,
            );
        }
        Ok(total)
    }

    fn token_query(&self, kind: TokenKind) -> QueryBuilder {
        let mut qb = QueryBuilder::new(self.base.table(kind.table()));
        qb.select(TOKEN_COLUMNS);
        qb
    }

    async fn insert(
        &self,
        kind: TokenKind,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<Token> {
        let (verb, conflict) = if kind.one_per_user() {
            (
                "upsert",
                " ON CONFLICT (user_id) DO UPDATE SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at",
            )
        } else {
            ("create", "")
        };
        let sql = format!(
            "INSERT INTO {} (token, expires_at, user_id) VALUES (%s, %s, %s){} \
             RETURNING id, token, expires_at, user_id",
            self.base.table(kind.table()),
            conflict
        );
        let label = format!("{}_{}_token", verb, kind.name());
        let row = self
            .base
            .fetch_one_raw(&sql, &params![token, expires_at, user_id], &label)
            .await?
            .ok_or_else(|| DbError::internal(format!("{} token insert returned no row", kind.name())))?;
        Token::from_row(&row)
    }

    async fn find(
        &self,
        kind: TokenKind,
        column: &str,
        value: impl Into<QueryParam>,
    ) -> DbResult<Option<Token>> {
        let mut qb = self.token_query(kind);
        qb.and_where(format!("{} = %s", column), vec![value.into()])
            .and_where("expires_at > CURRENT_TIMESTAMP", vec![]);
        let label = format!("find_{}_token_by_{}", kind.name(), column);
        self.base
            .fetch_one(&qb, &label)
            .await?
            .as_ref()
            .map(Token::from_row)
            .transpose()
    }

    async fn delete(&self, kind: TokenKind, token: &str) -> DbResult<UpdateOutcome> {
        let mut qb = QueryBuilder::new(self.base.table(kind.table()));
        qb.and_where("token = %s", params![token]);
        let (sql, params) = self.base.build_delete(kind.table(), &qb);
        let label = format!("delete_{}_token", kind.name());
        self.base.execute_update(&sql, &params, &label).await
    }
}

fn affected(outcome: UpdateOutcome) -> u64 {
    match outcome {
        UpdateOutcome::Applied(n) => n,
        UpdateOutcome::NoMatch => 0,
    }
}

impl Participant for TokenRepository {
    fn dao(&self) -> Option<&Dao> {
        Some(self.base.dao())
    }
}
