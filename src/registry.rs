//! Transaction Context Registry (§4.E): per-session commit/rollback hook
//! lists, and task-scoped lookup of "the current transaction".
//!
//! Design note (§9) calls for task-local storage over global mutable state
//! for the "am I in a transaction?" probe. `tokio::task_local!` scopes are
//! naturally reentrant: nesting `CURRENT.scope(..)` calls within one task
//! gives us the stack-discipline §9 asks for (the outer context becomes
//! visible again once the inner scope's future resolves) without any
//! manual push/pop bookkeeping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::{error::Error, session::SessionId};

pub(crate) type Hook = Box<dyn FnOnce() -> Result<(), Error> + Send>;

/// Per-session, per-attempt record of commit/rollback hooks (§3's
/// Transaction Context).
pub(crate) struct TransactionContext {
    pub session_id: SessionId,
    commit_hooks: Vec<Hook>,
    rollback_hooks: Vec<Hook>,
}

impl TransactionContext {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            commit_hooks: Vec::new(),
            rollback_hooks: Vec::new(),
        }
    }

    pub(crate) fn push_commit_hook(&mut self, hook: Hook) {
        self.commit_hooks.push(hook);
    }

    pub(crate) fn push_rollback_hook(&mut self, hook: Hook) {
        self.rollback_hooks.push(hook);
    }

    pub(crate) fn take_commit_hooks(&mut self) -> Vec<Hook> {
        std::mem::take(&mut self.commit_hooks)
    }

    pub(crate) fn take_rollback_hooks(&mut self) -> Vec<Hook> {
        std::mem::take(&mut self.rollback_hooks)
    }
}

pub(crate) type SharedContext = Arc<Mutex<TransactionContext>>;

tokio::task_local! {
    static CURRENT: RefCell<SharedContext>;
}

/// Weakly-keyed (in spirit: explicitly discarded at detach, per §9) map from
/// session identity to its live transaction context.
#[derive(Default)]
pub(crate) struct Registry {
    by_session: Mutex<HashMap<SessionId, SharedContext>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert an empty context for `session_id`. Fails if one already
    /// exists.
    pub(crate) fn attach(&self, session_id: SessionId) -> Result<SharedContext, Error> {
        let mut by_session = self.by_session.lock().unwrap();
        if by_session.contains_key(&session_id) {
            return Err(Error::InvalidArgument {
                param: "session already has an attached transaction context",
            });
        }
        let ctx = Arc::new(Mutex::new(TransactionContext::new(session_id)));
        by_session.insert(session_id, ctx.clone());
        Ok(ctx)
    }

    /// Remove the entry for `session_id`, discarding its hooks.
    pub(crate) fn detach(&self, session_id: SessionId) {
        self.by_session.lock().unwrap().remove(&session_id);
    }

    /// Run `fut` with `ctx` published as "the current transaction" for this
    /// task. Reentrant: a nested call restores the outer context once
    /// `fut` resolves.
    pub(crate) async fn scoped<F: Future>(ctx: SharedContext, fut: F) -> F::Output {
        CURRENT.scope(RefCell::new(ctx), fut).await
    }

    /// Locate the context whose task-local scope matches the caller (used
    /// by `on_commit`/`on_rollback` called from inside a user transaction
    /// block). `Err(NotInTransaction)` outside of any `scoped` call.
    pub(crate) fn current() -> Result<SharedContext, Error> {
        CURRENT
            .try_with(|cell| cell.borrow().clone())
            .map_err(|_| Error::NotInTransaction)
    }
}
