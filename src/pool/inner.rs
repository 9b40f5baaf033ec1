//! Bounded pool state and the fair FIFO waiter queue (§4.C).

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::waiter::Waiter;
use crate::{
    config::Config,
    driver::Driver,
    error::Error,
    health,
    session::{Session, SessionId},
};

static NEXT_WAITER_ID: AtomicU64 = AtomicU64::new(1);

/// Statistics record returned by [`Pool::stats`][super::Pool::stats] (§6).
/// Field names are part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub live_count: u32,
    pub idle_count: usize,
    pub waiter_count: usize,
    pub capacity: u32,
    pub persistent: bool,
    pub validated: bool,
}

struct PoolState<D: Driver> {
    idle: VecDeque<Session<D>>,
    waiters: VecDeque<Waiter<D>>,
    live_count: u32,
    closed: bool,
    last_handed_out: Option<SessionId>,
}

pub(crate) struct PoolInner<D: Driver> {
    config: Config,
    state: Mutex<PoolState<D>>,
}

impl<D: Driver> PoolInner<D> {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                waiters: VecDeque::new(),
                live_count: 0,
                closed: false,
                last_handed_out: None,
            }),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn stats(&self) -> Stats {
        let state = self.state.lock().unwrap();
        Stats {
            live_count: state.live_count,
            idle_count: state.idle.len(),
            waiter_count: state.waiters.len(),
            capacity: self.config.pool_max_connections,
            persistent: self.config.persistent,
            validated: true,
        }
    }

    pub(crate) fn last_handed_out(&self) -> Option<SessionId> {
        self.state.lock().unwrap().last_handed_out
    }

    /// Acquire algorithm (§4.C): idle head first, else grow if under
    /// capacity, else enqueue a fair FIFO waiter.
    pub(crate) async fn acquire(self: &std::sync::Arc<Self>) -> Result<Session<D>, Error> {
        loop {
            let decision = {
                let mut state = self.state.lock().unwrap();
                if state.closed {
                    return Err(Error::PoolClosed);
                }

                if let Some(session) = state.idle.pop_front() {
                    state.last_handed_out = Some(session.id());
                    Decision::Immediate(session)
                } else if state.live_count < self.config.pool_max_connections {
                    state.live_count += 1;
                    Decision::Connect
                } else {
                    let id = NEXT_WAITER_ID.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(Waiter::new(id, tx));
                    Decision::Wait(id, rx)
                }
            };

            match decision {
                Decision::Immediate(session) => return Ok(session),
                Decision::Connect => match D::connect(&self.config, self.config.persistent).await
                {
                    Ok(conn) => {
                        let session = Session::new(conn, self.config.log_settings.clone());
                        let mut state = self.state.lock().unwrap();
                        state.last_handed_out = Some(session.id());
                        return Ok(session);
                    }
                    Err(e) => {
                        let mut state = self.state.lock().unwrap();
                        state.live_count -= 1;
                        return Err(e);
                    }
                },
                Decision::Wait(id, rx) => {
                    return WaitForTurn {
                        pool: self.clone(),
                        id: Some(id),
                        rx,
                    }
                    .await;
                }
            }
        }
    }

    /// Release algorithm (§4.C): health-check first, then either replace for
    /// the head waiter (dead path) or hand off / return to idle (alive
    /// path).
    pub(crate) async fn release(self: &std::sync::Arc<Self>, mut session: Session<D>) {
        let alive = health::is_alive(&mut session).await;

        if !alive {
            let head_waiter = {
                let mut state = self.state.lock().unwrap();
                state.live_count -= 1;
                if state.closed {
                    return;
                }
                if state.waiters.is_empty() || state.live_count >= self.config.pool_max_connections
                {
                    None
                } else {
                    state.live_count += 1;
                    state.waiters.pop_front()
                }
            };

            if let Some(waiter) = head_waiter {
                match D::connect(&self.config, self.config.persistent).await {
                    Ok(conn) => {
                        let replacement = Session::new(conn, self.config.log_settings.clone());
                        let mut state = self.state.lock().unwrap();
                        state.last_handed_out = Some(replacement.id());
                        drop(state);
                        waiter.fulfill(replacement);
                    }
                    Err(e) => {
                        let mut state = self.state.lock().unwrap();
                        state.live_count -= 1;
                        drop(state);
                        waiter.fail(e);
                    }
                }
            }
            return;
        }

        health::reset(&mut session).await;

        let mut state = self.state.lock().unwrap();
        if state.closed {
            drop(state);
            let _ = D::close(session.conn_mut()).await;
            return;
        }

        if let Some(waiter) = state.waiters.pop_front() {
            state.last_handed_out = Some(session.id());
            drop(state);
            waiter.fulfill(session);
        } else {
            state.idle.push_back(session);
        }
    }

    /// Remove a still-pending waiter from the queue without decrementing
    /// `live_count` (cancellation of an awaiting `acquire`, §5).
    fn remove_waiter(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.waiters.retain(|w| w.id != id);
    }

    /// Reject all waiters with `PoolClosed`, then close all idle sessions.
    pub(crate) async fn close(&self) {
        let (waiters, idle) = {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.idle),
            )
        };

        for waiter in waiters {
            waiter.fail(Error::PoolClosed);
        }

        for mut session in idle {
            let _ = D::close(session.conn_mut()).await;
        }
    }
}

enum Decision<D: Driver> {
    Immediate(Session<D>),
    Connect,
    Wait(u64, oneshot::Receiver<Result<Session<D>, Error>>),
}

/// A cancel-safe wait on a queued waiter slot: if this future is dropped
/// before resolving, the waiter is removed from the queue without
/// decrementing `live_count`.
struct WaitForTurn<D: Driver> {
    pool: std::sync::Arc<PoolInner<D>>,
    id: Option<u64>,
    rx: oneshot::Receiver<Result<Session<D>, Error>>,
}

impl<D: Driver> Future for WaitForTurn<D> {
    type Output = Result<Session<D>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                this.id = None;
                Poll::Ready(result)
            }
            Poll::Ready(Err(_)) => {
                this.id = None;
                Poll::Ready(Err(Error::PoolClosed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<D: Driver> Drop for WaitForTurn<D> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.pool.remove_waiter(id);
        }
    }
}
