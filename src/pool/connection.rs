//! RAII guard returned by [`Pool::acquire`][super::Pool::acquire]. Returns
//! the session to the pool on drop.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::inner::PoolInner;
use crate::{driver::Driver, session::Session};

/// A session checked out of a [`Pool`][super::Pool].
///
/// Released back to the pool when dropped. Use
/// [`PoolConnection::release`][PoolConnection::release] to return it
/// explicitly and await the release's health check / handoff before moving
/// on, rather than relying on the spawned drop task.
pub struct PoolConnection<D: Driver> {
    session: Option<Session<D>>,
    pool: Arc<PoolInner<D>>,
}

impl<D: Driver> PoolConnection<D> {
    pub(super) fn new(session: Session<D>, pool: Arc<PoolInner<D>>) -> Self {
        Self {
            session: Some(session),
            pool,
        }
    }

    /// Explicitly release this session back to the pool. Equivalent to
    /// dropping it, but awaits the release's health check synchronously
    /// instead of spawning a background task.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session).await;
        }
    }

    /// Take ownership of the raw session, bypassing the pool (caller is
    /// responsible for closing it).
    pub fn into_session(mut self) -> Session<D> {
        self.session.take().expect("session already taken")
    }
}

impl<D: Driver> Deref for PoolConnection<D> {
    type Target = Session<D>;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref().expect("session already taken")
    }
}

impl<D: Driver> DerefMut for PoolConnection<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("session already taken")
    }
}

impl<D: Driver> Drop for PoolConnection<D> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let pool = self.pool.clone();
            tokio::task::spawn(async move {
                pool.release(session).await;
            });
        }
    }
}
