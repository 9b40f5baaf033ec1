//! An in-memory, instantly-ready [`Driver`] for unit and integration tests.
//! Simulates just enough of a MySQL session to exercise the executor, pool,
//! health checker, and transaction runner without a real server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::{
    config::{Config, OptionValue},
    driver::{Driver, Outcome},
    error::{Error, QueryErrorKind, Result},
    pool::Pool,
    row::{Row, Value},
    session::Session,
    value::BindValue,
};

/// Reserved `Config::options` key carrying the id of the in-memory database a
/// mock connection should join. Lets many `MockConn`s from the same `Pool`
/// share one `Db`, the way real connections share one server.
const DB_HANDLE_OPTION: i64 = i64::MIN;

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Mutex<HashMap<u64, Arc<Mutex<Db>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<Mutex<Db>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(Default)]
struct Db {
    tables: HashMap<String, Vec<Vec<BindValue>>>,
}

pub(crate) struct MockConn {
    id: u64,
    db: Arc<Mutex<Db>>,
    alive: bool,
    pending: Option<Pending>,
    /// Set by `SET SESSION TRANSACTION ISOLATION LEVEL`; per-connection, the
    /// way a real server's session state works — not shared via `Db`.
    isolation: Option<String>,
}

struct Pending {
    sql: String,
    params: Vec<BindValue>,
}

pub(crate) struct MockStmt {
    sql: String,
    params: Vec<BindValue>,
}

pub(crate) struct MockCursor {
    rows: std::vec::IntoIter<Row>,
}

/// Zero-sized [`Driver`] handle for the in-memory mock.
pub(crate) struct MockDriver;

#[async_trait]
impl Driver for MockDriver {
    type Conn = MockConn;
    type Stmt = MockStmt;
    type Cursor = MockCursor;

    async fn connect(config: &Config, _persistent: bool) -> Result<Self::Conn> {
        let db_id = match config.options.get(&DB_HANDLE_OPTION) {
            Some(OptionValue::Int(n)) => *n as u64,
            _ => 0,
        };
        let db = registry()
            .lock()
            .unwrap()
            .entry(db_id)
            .or_insert_with(|| Arc::new(Mutex::new(Db::default())))
            .clone();

        Ok(MockConn {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            db,
            alive: true,
            pending: None,
            isolation: None,
        })
    }

    async fn prepare(_conn: &mut Self::Conn, sql: &str) -> Result<Self::Stmt> {
        Ok(MockStmt {
            sql: sql.to_string(),
            params: Vec::new(),
        })
    }

    fn bind(stmt: &mut Self::Stmt, _types: &str, params: &[BindValue]) -> Result<()> {
        stmt.params = params.to_vec();
        Ok(())
    }

    fn submit_prepared(conn: &mut Self::Conn, stmt: &Self::Stmt) -> Result<()> {
        if !conn.alive {
            return Err(severed());
        }
        conn.pending = Some(Pending {
            sql: stmt.sql.clone(),
            params: stmt.params.clone(),
        });
        Ok(())
    }

    fn submit_query(conn: &mut Self::Conn, sql: &str) -> Result<()> {
        if !conn.alive {
            return Err(severed());
        }
        conn.pending = Some(Pending {
            sql: sql.to_string(),
            params: Vec::new(),
        });
        Ok(())
    }

    async fn poll_ready(conn: &mut Self::Conn, _timeout: Duration) -> Result<bool> {
        if !conn.alive {
            return Err(severed());
        }
        Ok(true)
    }

    fn reap(conn: &mut Self::Conn, expect_cursor: bool) -> Result<Outcome<Self::Cursor>> {
        let pending = conn
            .pending
            .take()
            .ok_or_else(|| Error::query("", QueryErrorKind::Reap, "no pending statement to reap"))?;

        if let Some(outcome) = interpret_session(conn, &pending.sql) {
            return Ok(outcome);
        }

        let mut db = conn.db.lock().unwrap();
        interpret(&mut db, &pending.sql, &pending.params, expect_cursor)
    }

    fn fetch_row(cursor: &mut Self::Cursor) -> Result<Option<Row>> {
        Ok(cursor.rows.next())
    }

    fn drain_cursor(cursor: &mut Self::Cursor) -> Result<()> {
        for _ in cursor.rows.by_ref() {}
        Ok(())
    }

    async fn begin(conn: &mut Self::Conn) -> Result<()> {
        guard_alive(conn)
    }

    async fn commit(conn: &mut Self::Conn) -> Result<()> {
        guard_alive(conn)
    }

    async fn rollback(conn: &mut Self::Conn) -> Result<()> {
        guard_alive(conn)
    }

    async fn autocommit(conn: &mut Self::Conn, _on: bool) -> Result<()> {
        guard_alive(conn)
    }

    async fn set_charset(conn: &mut Self::Conn, _charset: &str) -> Result<()> {
        guard_alive(conn)
    }

    async fn close(conn: &mut Self::Conn) -> Result<()> {
        conn.alive = false;
        Ok(())
    }

    async fn drain_pending(conn: &mut Self::Conn) -> Result<()> {
        if !conn.alive {
            return Err(severed());
        }
        conn.pending = None;
        Ok(())
    }

    fn thread_id(conn: &Self::Conn) -> u64 {
        conn.id
    }
}

fn guard_alive(conn: &MockConn) -> Result<()> {
    if conn.alive {
        Ok(())
    } else {
        Err(severed())
    }
}

fn severed() -> Error {
    Error::connection("mock connection severed")
}

/// Handle the two session-isolation statement shapes directly against
/// `conn`'s own isolation field, bypassing the shared `Db` — a real server
/// tracks isolation per session, not per database. Returns `None` for any
/// other SQL shape, which falls through to `interpret`.
fn interpret_session(conn: &mut MockConn, sql: &str) -> Option<Outcome<MockCursor>> {
    let upper = sql.trim().to_ascii_uppercase();

    if let Some(rest) = upper.strip_prefix("SET SESSION TRANSACTION ISOLATION LEVEL") {
        conn.isolation = Some(rest.trim().to_string());
        return Some(Outcome::Affected(0));
    }

    if upper.starts_with("SELECT @@TRANSACTION_ISOLATION") || upper.starts_with("SELECT @@TX_ISOLATION") {
        let level = conn
            .isolation
            .clone()
            .unwrap_or_else(|| "REPEATABLE-READ".to_string());
        let mut columns = IndexMap::new();
        columns.insert("@@transaction_isolation".to_string(), Value::Str(level));
        return Some(Outcome::Cursor(single_row_cursor(columns)));
    }

    None
}

/// Interpret just enough SQL shapes to exercise the crate: a trivial `SELECT
/// 1`, `SELECT COUNT(*)`, and generic `INSERT`/other statements. Session
/// isolation is handled separately by `interpret_session` before this is
/// reached. Anything else falls back to "0 rows affected" or "empty cursor",
/// whichever the caller's SQL keyword implied.
fn interpret(
    db: &mut Db,
    sql: &str,
    params: &[BindValue],
    expect_cursor: bool,
) -> Result<Outcome<MockCursor>> {
    let trimmed = sql.trim();
    let upper = trimmed.to_ascii_uppercase();

    if upper == "SELECT 1" {
        let mut columns = IndexMap::new();
        columns.insert("1".to_string(), Value::Int(1));
        return Ok(Outcome::Cursor(single_row_cursor(columns)));
    }

    if let Some(rest) = upper.strip_prefix("SELECT COUNT(*) FROM") {
        let table = rest
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let count = db.tables.get(&table).map(Vec::len).unwrap_or(0) as i64;
        let mut columns = IndexMap::new();
        columns.insert("COUNT(*)".to_string(), Value::Int(count));
        return Ok(Outcome::Cursor(single_row_cursor(columns)));
    }

    if let Some(rest) = trimmed.get(11..).filter(|_| upper.starts_with("INSERT INTO")) {
        let table = rest
            .trim()
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        db.tables.entry(table).or_default().push(params.to_vec());
        return Ok(Outcome::Affected(1));
    }

    if expect_cursor {
        return Ok(Outcome::Cursor(MockCursor {
            rows: Vec::new().into_iter(),
        }));
    }

    Ok(Outcome::Affected(1))
}

fn single_row_cursor(columns: IndexMap<String, Value>) -> MockCursor {
    MockCursor {
        rows: vec![Row::new(columns)].into_iter(),
    }
}

impl MockDriver {
    /// A fresh pool backed by its own isolated in-memory database.
    pub(crate) fn fresh_pool() -> Pool<MockDriver> {
        let db_id = NEXT_DB_ID.fetch_add(1, Ordering::Relaxed);
        registry()
            .lock()
            .unwrap()
            .insert(db_id, Arc::new(Mutex::new(Db::default())));

        let config = Config::new("localhost", "testdb").option(DB_HANDLE_OPTION, db_id as i64);
        Pool::new(config).expect("mock config always validates")
    }

    /// A single checked-out session from a fresh pool, for tests that only
    /// need one connection and don't care about pool mechanics.
    pub(crate) async fn fresh_session() -> Session<MockDriver> {
        Self::fresh_pool()
            .acquire()
            .await
            .expect("mock connect never fails")
            .into_session()
    }

    /// Simulate a dropped connection: every subsequent driver call on this
    /// session fails until it is replaced.
    pub(crate) fn sever(session: &mut Session<MockDriver>) {
        session.conn_mut().alive = false;
    }
}
