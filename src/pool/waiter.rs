//! The one-shot completion slot queued on the pool when capacity is
//! exhausted (§3's Waiter).

use tokio::sync::oneshot;

use crate::{driver::Driver, error::Error, session::Session};

/// A FIFO-queued waiter. At most one of `fulfill`/`fail` is ever invoked, by
/// construction: both route through consuming `self.tx`.
pub(super) struct Waiter<D: Driver> {
    pub(super) id: u64,
    tx: oneshot::Sender<Result<Session<D>, Error>>,
}

impl<D: Driver> Waiter<D> {
    pub(super) fn new(id: u64, tx: oneshot::Sender<Result<Session<D>, Error>>) -> Self {
        Self { id, tx }
    }

    pub(super) fn fulfill(self, session: Session<D>) {
        let _ = self.tx.send(Ok(session));
    }

    pub(super) fn fail(self, error: Error) {
        let _ = self.tx.send(Err(error));
    }
}
