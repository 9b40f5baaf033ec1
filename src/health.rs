//! Health Checker (§4.A): liveness probe and post-use state reset.

use crate::{driver::Driver, executor, executor::Shape, session::Session};

/// Probe `session` by first draining any pending multi-result cursors, then
/// issuing a trivial round-trip (`SELECT 1`). Returns `true` iff both
/// succeed without error.
pub async fn is_alive<D: Driver>(session: &mut Session<D>) -> bool {
    if D::drain_pending(session.conn_mut()).await.is_err() {
        return false;
    }

    matches!(
        executor::execute_raw::<D>(session, "SELECT 1", Shape::Scalar).await,
        Ok(_)
    )
}

/// Drain pending results and re-enable autocommit. Tolerates errors: a
/// failing reset makes the next `is_alive` call fail, which removes the
/// session from the pool. After a successful reset the session has no
/// pending results, `autocommit = on`, and any active transaction has been
/// implicitly aborted.
pub async fn reset<D: Driver>(session: &mut Session<D>) {
    let _ = D::drain_pending(session.conn_mut()).await;
    match D::autocommit(session.conn_mut(), true).await {
        Ok(()) => session.set_autocommit(true),
        Err(_) => session.mark_dead(),
    }
    session.set_in_transaction(false);
}
