//! Cross-repository atomicity.
//!
//! [`Atomic`] runs an async block so that every DAO call made by the named
//! participants commits or rolls back together. Participants never exchange
//! connections: they only have to share one [`Dao`] instance, and the block's
//! statements are routed to the ambient transaction by the DAO itself.
//!
//! ```ignore
//! Atomic::new()
//!     .participant("user_repository", &users)
//!     .participant("token_repository", &tokens)
//!     .run(|| async {
//!         let id = users.create(&new_user).await?;
//!         tokens.upsert_activation_token(id, &token, expires_at).await?;
//!         Ok::<_, ServiceError>(id)
//!     })
//!     .await
//! ```
//!
//! Nested blocks in the same task join the outer transaction.

use crate::db::dao::Dao;
use crate::db::transaction::{self, IsolationLevel, TransactionContext};
use crate::error::DbError;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

/// Anything that executes through a [`Dao`] and can take part in an atomic block.
pub trait Participant: Send + Sync {
    /// The DAO this participant executes through, if it has one.
    fn dao(&self) -> Option<&Dao>;
}

impl Participant for Dao {
    fn dao(&self) -> Option<&Dao> {
        Some(self)
    }
}

impl<P: Participant + ?Sized> Participant for std::sync::Arc<P> {
    fn dao(&self) -> Option<&Dao> {
        (**self).dao()
    }
}

/// Builder for one atomic block over a set of named participants.
#[derive(Default)]
pub struct Atomic<'a> {
    participants: Vec<(&'a str, &'a dyn Participant)>,
    isolation: Option<IsolationLevel>,
}

impl<'a> Atomic<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant; `name` is used in log and error messages.
    pub fn participant(mut self, name: &'a str, participant: &'a dyn Participant) -> Self {
        self.participants.push((name, participant));
        self
    }

    /// Isolation level for a newly opened transaction. Ignored when joining
    /// an ambient one.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Run `f` atomically.
    ///
    /// - With an ambient transaction already active in this task, `f` joins it.
    ///   A participant bound to a different DAO fails with
    ///   [`DbError::TransactionIntegrity`].
    /// - With no participants, or a participant that has no DAO, `f` runs
    ///   without a transaction.
    /// - Participants bound to different DAO instances fail with
    ///   [`DbError::TransactionIntegrity`] before any SQL executes.
    /// - Otherwise `f` runs inside a new transaction that commits when it
    ///   returns `Ok` and rolls back when it returns `Err`; the error is
    ///   returned unchanged.
    pub async fn run<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        if let Some(ctx) = transaction::current() {
            if let Some((name, _)) = self
                .participants
                .iter()
                .find(|(_, p)| p.dao().is_some_and(|dao| !dao.same_instance(ctx.dao())))
            {
                return Err(E::from(DbError::integrity(format!(
                    "participant '{}' uses a different DAO than the active transaction {}",
                    name,
                    ctx.id()
                ))));
            }
            debug!(transaction_id = %ctx.id(), "Joining ambient transaction");
            return f().await;
        }

        let Some(dao) = self.resolve_dao()? else {
            return f().await;
        };

        let ctx = TransactionContext::begin(dao, self.isolation)
            .await
            .map_err(E::from)?;
        ctx.scope(f).await
    }

    /// The single DAO shared by every participant.
    ///
    /// `Ok(None)` means the block should run without a transaction.
    fn resolve_dao(&self) -> Result<Option<&'a Dao>, DbError> {
        if self.participants.is_empty() {
            warn!("Atomic block has no participants; running without a transaction");
            return Ok(None);
        }

        // Every participant must resolve before identities are compared.
        let mut resolved = Vec::with_capacity(self.participants.len());
        for &(name, participant) in &self.participants {
            let Some(dao) = participant.dao() else {
                warn!(
                    participant = name,
                    "Participant has no DAO; running without a transaction"
                );
                return Ok(None);
            };
            resolved.push((name, dao));
        }

        let Some(&(first, expected)) = resolved.first() else {
            return Ok(None);
        };
        if let Some((name, _)) = resolved
            .iter()
            .find(|(_, dao)| !expected.same_instance(dao))
        {
            return Err(DbError::integrity(format!(
                "participants '{}' and '{}' use different DAO instances",
                first, name
            )));
        }
        Ok(Some(expected))
    }
}

/// Run `f` atomically across `participants`. See [`Atomic::run`].
pub async fn atomic<'a, F, Fut, T, E>(
    participants: &[(&'a str, &'a dyn Participant)],
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DbError> + fmt::Display,
{
    participants
        .iter()
        .fold(Atomic::new(), |builder, &(name, p)| builder.participant(name, p))
        .run(f)
        .await
}

/// Composition-root handle that makes DAO sharing structural.
///
/// Build one per database at startup and construct every repository from
/// [`UnitOfWork::dao`]; blocks run through [`UnitOfWork::run`] are then atomic
/// across all of them without naming participants.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    dao: Dao,
    isolation: Option<IsolationLevel>,
}

impl UnitOfWork {
    pub fn new(dao: Dao) -> Self {
        Self {
            dao,
            isolation: None,
        }
    }

    /// Default isolation level for blocks run through this unit of work.
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn dao(&self) -> &Dao {
        &self.dao
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub async fn run<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        self.run_inner(self.isolation, f).await
    }

    pub async fn run_with_isolation<F, Fut, T, E>(&self, level: IsolationLevel, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        self.run_inner(Some(level), f).await
    }

    async fn run_inner<F, Fut, T, E>(&self, level: Option<IsolationLevel>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        let mut block = Atomic::new().participant("unit_of_work", &self.dao);
        if let Some(level) = level {
            block = block.isolation(level);
        }
        block.run(f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Detached;

    impl Participant for Detached {
        fn dao(&self) -> Option<&Dao> {
            None
        }
    }

    #[tokio::test]
    async fn test_no_participants_runs_without_transaction() {
        let value = Atomic::new()
            .run(|| async {
                assert!(transaction::current().is_none());
                Ok::<_, DbError>(5)
            })
            .await
            .unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_participant_without_dao_runs_without_transaction() {
        let detached = Detached;
        let value = atomic(&[("detached", &detached as &dyn Participant)], || async {
            assert!(transaction::current().is_none());
            Ok::<_, DbError>("ran")
        })
        .await
        .unwrap();
        assert_eq!(value, "ran");
    }

    #[tokio::test]
    async fn test_error_passes_through_without_transaction() {
        let err = Atomic::new()
            .participant("detached", &Detached)
            .run(|| async { Err::<(), _>(DbError::invalid_input("nope")) })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }
}
