//! Connection Pool (§4.C): a bounded pool of MySQL sessions with a fair
//! FIFO waiter queue.
//!
//! Acquire a session with [`Pool::acquire`]; it is returned to the pool when
//! the resulting [`PoolConnection`] is dropped (or explicitly released with
//! [`PoolConnection::release`]).

use std::sync::Arc;

mod connection;
mod inner;
mod waiter;

pub use connection::PoolConnection;
pub use inner::Stats;

use crate::{config::Config, driver::Driver, error::Result, session::SessionId};
use inner::PoolInner;

/// A bounded, fair pool of MySQL sessions.
///
/// `Pool` is cheap to clone: it is a reference-counted handle onto shared
/// pool state, mirroring the teacher's `Pool(Arc<PoolInner>)` split.
pub struct Pool<D: Driver> {
    inner: Arc<PoolInner<D>>,
}

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Driver> Pool<D> {
    /// Construct a pool from a validated configuration record. Does not
    /// eagerly open any connections.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner::new(config)),
        })
    }

    /// Acquire algorithm (§4.C): idle head first; else grow under capacity;
    /// else wait in FIFO order for a release.
    pub async fn acquire(&self) -> Result<PoolConnection<D>> {
        let session = self.inner.acquire().await?;
        Ok(PoolConnection::new(session, self.inner.clone()))
    }

    /// Release algorithm (§4.C). Normally callers don't call this directly
    /// and instead let `PoolConnection`'s `Drop` handle it; exposed for
    /// callers that manage a raw `Session` themselves (e.g. after
    /// `into_session`).
    pub async fn release(&self, session: crate::session::Session<D>) {
        self.inner.release(session).await;
    }

    /// `{ live, idle, waiting, capacity, persistent, validated }` (§6).
    pub fn stats(&self) -> Stats {
        self.inner.stats()
    }

    pub fn last_handed_out(&self) -> Option<SessionId> {
        self.inner.last_handed_out()
    }

    /// Reject all waiters with `PoolClosed`; close all idle sessions.
    /// Sessions currently loaned out are not force-closed: they are closed
    /// by their holder on next release.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    pub(crate) fn config(&self) -> &Config {
        self.inner.config()
    }
}
