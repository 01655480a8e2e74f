//! Scoped transactional handles.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::error::CrudError;

/// A handle that can be committed, rolled back and closed.
#[async_trait]
pub trait Transactional: Send + Sized + 'static {
    async fn commit(&mut self) -> Result<(), CrudError>;

    /// Roll back pending work. A handle that already finished is a no-op.
    async fn rollback(&mut self) -> Result<(), CrudError>;

    /// Release the handle.
    async fn close(self);
}

/// Owns a handle for the length of one unit of work.
///
/// [`SessionScope::finish`] commits when the work succeeded and rolls back,
/// logs and returns the error when it failed; the handle is closed either way.
/// A scope dropped without `finish` drops its handle, which for [`PgSession`]
/// rolls the transaction back.
pub struct SessionScope<S: Transactional> {
    model: &'static str,
    session: Option<S>,
}

impl<S: Transactional> SessionScope<S> {
    pub fn new(model: &'static str, session: S) -> Self {
        SessionScope {
            model,
            session: Some(session),
        }
    }

    /// The live handle. Panics only if called after `finish`, which consumes the scope.
    pub fn session(&mut self) -> &mut S {
        self.session
            .as_mut()
            .unwrap_or_else(|| unreachable!("scope used after finish"))
    }

    pub async fn finish<T: Send>(mut self, result: Result<T, CrudError>) -> Result<T, CrudError> {
        let Some(mut session) = self.session.take() else {
            return Err(CrudError::Session("scope already finished".into()));
        };
        let outcome = match result {
            Ok(value) => match session.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    if let Err(rb) = session.rollback().await {
                        warn!(model = self.model, error = %rb, "rollback after failed commit");
                    }
                    debug!(model = self.model, error = %err, "error committing");
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rb) = session.rollback().await {
                    warn!(model = self.model, error = %rb, "rollback failed");
                }
                debug!(model = self.model, error = %err, "error committing");
                Err(err)
            }
        };
        session.close().await;
        outcome
    }
}

impl<S: Transactional> Drop for SessionScope<S> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            warn!(model = self.model, "session scope dropped without finish; rolling back");
        }
    }
}

/// PostgreSQL transaction handle.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    pub async fn begin(pool: &PgPool) -> Result<Self, CrudError> {
        let tx = pool.begin().await?;
        Ok(PgSession { tx: Some(tx) })
    }

    /// Connection of the open transaction.
    pub fn conn(&mut self) -> Result<&mut PgConnection, CrudError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(CrudError::Session("transaction already finished".into())),
        }
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }
}

#[async_trait]
impl Transactional for PgSession {
    async fn commit(&mut self) -> Result<(), CrudError> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            }
            None => Err(CrudError::Session("transaction already finished".into())),
        }
    }

    async fn rollback(&mut self) -> Result<(), CrudError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    async fn close(self) {
        // Dropping an unfinished sqlx transaction issues the rollback.
        drop(self.tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{reset, session_log, MemSession};

    #[tokio::test]
    async fn finish_commits_and_closes_on_success() {
        reset();
        let scope = SessionScope::new("Gadget", MemSession::open());
        let value = scope.finish(Ok(7)).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(session_log(), vec!["open", "commit", "close"]);
    }

    #[tokio::test]
    async fn finish_rolls_back_and_returns_error() {
        reset();
        let scope = SessionScope::new("Gadget", MemSession::open());
        let err = scope
            .finish::<()>(Err(CrudError::shape("boom")))
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::Shape(_)));
        assert_eq!(session_log(), vec!["open", "rollback", "close"]);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        reset();
        let scope = SessionScope::new("Gadget", MemSession::failing_commit());
        assert!(scope.finish(Ok(())).await.is_err());
        assert_eq!(session_log(), vec!["open", "commit", "rollback", "close"]);
    }
}
