//! Transaction Runner (§4.F): one attempt of BEGIN/COMMIT/ROLLBACK wrapped
//! around a user callback, with retry and commit/rollback hooks.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::{
    driver::Driver,
    error::{Error, TransactionErrorKind},
    executor::{self, QueryOutput, Shape},
    pool::Pool,
    registry::{Registry, SharedContext},
    row::Row,
    row::Value,
    value::Param,
};

/// The four standard SQL isolation levels (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// One failed attempt's record, kept in [`Error::TransactionFailed`]'s
/// history (§4.F retry policy).
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub error_summary: String,
    pub elapsed: Duration,
}

/// The view of a session available to a callback running inside
/// [`run_transaction`]. Queries issued through it run on the same session
/// the transaction is bound to.
pub struct Transaction<'a, D: Driver> {
    session: &'a mut crate::session::Session<D>,
    ctx: SharedContext,
}

impl<'a, D: Driver> Transaction<'a, D> {
    pub async fn query(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>, Error> {
        executor::execute::<D>(self.session, sql, params, None, Shape::Rows)
            .await
            .map(QueryOutput::into_rows)
    }

    pub async fn fetch_one(&mut self, sql: &str, params: &[Param]) -> Result<Option<Row>, Error> {
        executor::execute::<D>(self.session, sql, params, None, Shape::RowOpt)
            .await
            .map(QueryOutput::into_row)
    }

    pub async fn fetch_value(&mut self, sql: &str, params: &[Param]) -> Result<Option<Value>, Error> {
        executor::execute::<D>(self.session, sql, params, None, Shape::Scalar)
            .await
            .map(QueryOutput::into_scalar)
    }

    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, Error> {
        executor::execute::<D>(self.session, sql, params, None, Shape::Affected)
            .await
            .map(QueryOutput::into_affected)
    }

    /// Direct access to the underlying session, for callers who need a
    /// driver-specific operation the façade doesn't expose.
    pub fn raw_session(&mut self) -> &mut crate::session::Session<D> {
        self.session
    }

    /// Register a hook to run after this transaction commits. Hooks run in
    /// registration order; if one fails the rest still run (§4.F step 6).
    pub fn on_commit<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        self.ctx.lock().unwrap().push_commit_hook(Box::new(hook));
    }

    /// Register a hook to run after this transaction rolls back. Same
    /// ordering and swallow-continue policy as `on_commit` (§4.F step 7).
    pub fn on_rollback<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        self.ctx.lock().unwrap().push_rollback_hook(Box::new(hook));
    }
}

/// Register a commit hook against the task's current transaction, for code
/// that doesn't hold a [`Transaction`] handle directly (§4.E `current-for`).
/// Fails with [`Error::NotInTransaction`] if the calling task isn't inside a
/// `run_transaction` callback.
pub fn on_commit<F>(hook: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), Error> + Send + 'static,
{
    Registry::current()?.lock().unwrap().push_commit_hook(Box::new(hook));
    Ok(())
}

/// Register a rollback hook against the task's current transaction. See
/// [`on_commit`].
pub fn on_rollback<F>(hook: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), Error> + Send + 'static,
{
    Registry::current()?.lock().unwrap().push_rollback_hook(Box::new(hook));
    Ok(())
}

/// Run `callback` inside a transaction, retrying up to `attempts` times on
/// failure (§4.F retry policy). `attempts` must be at least 1. Not part of
/// the public API directly: reached through [`crate::facade::Facade::transaction`].
pub(crate) async fn run_transaction<D, F, Fut, T>(
    pool: &Pool<D>,
    registry: &Registry,
    attempts: u32,
    isolation: Option<IsolationLevel>,
    mut callback: F,
) -> Result<T, Error>
where
    D: Driver,
    F: FnMut(Transaction<'_, D>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    if attempts == 0 {
        return Err(Error::InvalidArgument { param: "attempts" });
    }

    let mut history = Vec::new();

    for attempt_number in 1..=attempts {
        let started = Instant::now();
        match run_attempt(pool, registry, isolation, &mut callback).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                // The commit itself already succeeded here; only a post-commit
                // hook failed. Retrying would re-run the callback and
                // double-apply already-committed work, so this surfaces
                // straight through instead of counting as a failed attempt.
                if matches!(
                    &err,
                    Error::Transaction {
                        kind: TransactionErrorKind::CommitHook,
                        ..
                    }
                ) {
                    return Err(err);
                }

                history.push(AttemptRecord {
                    attempt_number,
                    error_summary: err.to_string(),
                    elapsed: started.elapsed(),
                });

                if attempt_number == attempts {
                    return Err(Error::TransactionFailed {
                        attempts,
                        history,
                        cause: Box::new(err),
                    });
                }

                tracing::event!(
                    target: "myrmidon_mysql::transaction",
                    tracing::Level::WARN,
                    attempt = attempt_number,
                    error = %err,
                    "transaction attempt failed, retrying"
                );
            }
        }
    }

    unreachable!("loop always returns on the final attempt")
}

/// One BEGIN/callback/COMMIT-or-ROLLBACK cycle (§4.F steps 1-8).
async fn run_attempt<D, F, Fut, T>(
    pool: &Pool<D>,
    registry: &Registry,
    isolation: Option<IsolationLevel>,
    callback: &mut F,
) -> Result<T, Error>
where
    D: Driver,
    F: FnMut(Transaction<'_, D>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut conn = pool.acquire().await?;

    if let Some(level) = isolation {
        executor::execute_raw::<D>(
            &mut conn,
            &format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
            Shape::Affected,
        )
        .await
        .map_err(|e| Error::transaction(TransactionErrorKind::Isolation, e))?;
    }

    D::autocommit(conn.conn_mut(), false)
        .await
        .map_err(|e| Error::transaction(TransactionErrorKind::Begin, e))?;
    conn.set_autocommit(false);

    D::begin(conn.conn_mut())
        .await
        .map_err(|e| Error::transaction(TransactionErrorKind::Begin, e))?;
    conn.set_in_transaction(true);

    let session_id = conn.id();
    let ctx = registry.attach(session_id)?;

    let callback_result = {
        let transaction = Transaction {
            session: &mut conn,
            ctx: ctx.clone(),
        };
        Registry::scoped(ctx.clone(), callback(transaction)).await
    };

    let outcome = match callback_result {
        Ok(value) => match D::commit(conn.conn_mut()).await {
            Ok(()) => {
                let _ = D::autocommit(conn.conn_mut(), true).await;
                conn.set_autocommit(true);
                conn.set_in_transaction(false);
                fire_commit_hooks(&ctx, value)
            }
            Err(e) => Err(Error::transaction(TransactionErrorKind::Commit, e)),
        },
        Err(callback_err) => {
            let _ = D::rollback(conn.conn_mut()).await;
            let _ = D::autocommit(conn.conn_mut(), true).await;
            conn.set_autocommit(true);
            conn.set_in_transaction(false);
            Err(fire_rollback_hooks(&ctx, callback_err))
        }
    };

    registry.detach(session_id);
    conn.release().await;

    outcome
}

/// Fire commit hooks in registration order. A hook failure does not undo the
/// commit; it replaces the return value with a `CommitHook`-tagged error
/// carrying the first failing hook's error as cause (§4.F step 6).
fn fire_commit_hooks<T>(ctx: &SharedContext, value: T) -> Result<T, Error> {
    let hooks = {
        let mut locked = ctx.lock().unwrap();
        locked.take_commit_hooks()
    };

    let mut first_err = None;
    for hook in hooks {
        if let Err(e) = hook() {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }

    match first_err {
        None => Ok(value),
        Some(e) => Err(Error::transaction(TransactionErrorKind::CommitHook, e)),
    }
}

/// Fire rollback hooks in registration order (swallow-continue). A hook
/// failure is logged but does not replace the original callback error: it is
/// chained underneath it as a `RollbackHook`-tagged wrapper (§4.F step 7).
fn fire_rollback_hooks(ctx: &SharedContext, original: Error) -> Error {
    let hooks = {
        let mut locked = ctx.lock().unwrap();
        locked.take_rollback_hooks()
    };

    let mut hook_failed = false;
    for hook in hooks {
        if let Err(e) = hook() {
            hook_failed = true;
            tracing::event!(
                target: "myrmidon_mysql::transaction",
                tracing::Level::WARN,
                error = %e,
                "rollback hook failed; original transaction error still propagates"
            );
        }
    }

    if hook_failed {
        Error::transaction(TransactionErrorKind::RollbackHook, original)
    } else {
        original
    }
}
