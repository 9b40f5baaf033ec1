//! The host-provided MySQL client library boundary.
//!
//! Everything below `Driver` is explicitly out of scope for this crate (see
//! `spec.md` §1 and §6): the wire protocol, handshake, and non-blocking I/O
//! primitives are supplied by a host client library. `Driver` names exactly
//! the operations §6 requires of it: `connect`, `prepare`, bind+execute,
//! `poll`, `reap`, `begin`, `commit`, `rollback`, `autocommit`, `set_charset`,
//! simple `query`, and `close`.
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::Config,
    error::Result,
    row::Row,
    value::BindValue,
};

/// What a reaped query produced: either a row count, or a cursor to drain.
///
/// `Affected` is signed because some client libraries report row counts as a
/// signed integer; the executor clamps negative values to zero per §4.D
/// step 7.
pub enum Outcome<Cursor> {
    Affected(i64),
    Cursor(Cursor),
}

/// The set of asynchronous primitives this crate needs from a MySQL client
/// library. Implementations wrap a real wire-protocol client; tests use an
/// in-memory fake (see `tests/support/mock.rs`).
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// One underlying client-library connection handle.
    type Conn: Send;
    /// A prepared statement handle bound to a `Conn`.
    type Stmt: Send;
    /// A cursor over a pending result set.
    type Cursor: Send;

    /// Establish a new connection per the Connection Factory contract (§4.B):
    /// handshake, option-set, and charset-set failures are all surfaced here.
    async fn connect(config: &Config, persistent: bool) -> Result<Self::Conn>;

    /// Prepare a statement. Failure here is tagged `prepare` by the executor.
    async fn prepare(conn: &mut Self::Conn, sql: &str) -> Result<Self::Stmt>;

    /// Bind already-preprocessed values using the derived type-code string.
    /// Failure here is tagged `bind` by the executor.
    fn bind(stmt: &mut Self::Stmt, types: &str, params: &[BindValue]) -> Result<()>;

    /// Submit a prepared statement for asynchronous execution. Must not
    /// block; completion is observed via `poll_ready`/`reap`. Failure here is
    /// tagged `execute` by the executor.
    fn submit_prepared(conn: &mut Self::Conn, stmt: &Self::Stmt) -> Result<()>;

    /// Submit a raw, unprepared query string for asynchronous execution
    /// (the "parameterless query" path of §4.D).
    fn submit_query(conn: &mut Self::Conn, sql: &str) -> Result<()>;

    /// Readiness check bounded by `timeout`. `Duration::ZERO` performs the
    /// initial zero-timeout check described in the poll loop; non-zero
    /// timeouts may actually wait (hence `async`) up to that bound for the
    /// underlying transport to become ready.
    async fn poll_ready(conn: &mut Self::Conn, timeout: Duration) -> Result<bool>;

    /// Reap a completed submission. `expect_cursor` is derived from the
    /// submitted SQL's first keyword (`has_result_set`), not driver feedback.
    fn reap(conn: &mut Self::Conn, expect_cursor: bool) -> Result<Outcome<Self::Cursor>>;

    /// Fetch the next row from a cursor, or `None` once exhausted.
    fn fetch_row(cursor: &mut Self::Cursor) -> Result<Option<Row>>;

    /// Drain any rows left on a cursor without materializing them, used by
    /// the health checker before issuing its liveness probe.
    fn drain_cursor(cursor: &mut Self::Cursor) -> Result<()>;

    async fn begin(conn: &mut Self::Conn) -> Result<()>;
    async fn commit(conn: &mut Self::Conn) -> Result<()>;
    async fn rollback(conn: &mut Self::Conn) -> Result<()>;
    async fn autocommit(conn: &mut Self::Conn, on: bool) -> Result<()>;
    async fn set_charset(conn: &mut Self::Conn, charset: &str) -> Result<()>;
    async fn close(conn: &mut Self::Conn) -> Result<()>;

    /// Drain any pending multi-result cursors left on the connection from a
    /// prior, abandoned query (used by the health checker).
    async fn drain_pending(conn: &mut Self::Conn) -> Result<()>;

    fn thread_id(conn: &Self::Conn) -> u64;
}
