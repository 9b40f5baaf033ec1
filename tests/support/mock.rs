//! A small in-memory [`Driver`] implementation for the integration suite,
//! built entirely against `myrmidon_mysql`'s public API. Kept separate from
//! the crate's own `#[cfg(test)]` mock (`src/testutil/mock.rs`): integration
//! tests compile as their own crate and cannot see items gated behind
//! `cfg(test)` in the library they depend on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;

use myrmidon_mysql::{
    BindValue, Config, Driver, Error, Outcome, OptionValue, QueryErrorKind, Result, Row, Value,
};

const DB_HANDLE_OPTION: i64 = i64::MIN;

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Mutex<HashMap<u64, Arc<Mutex<Db>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<Mutex<Db>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(Default)]
pub struct Db {
    tables: HashMap<String, Vec<Vec<BindValue>>>,
    alive_flags: HashMap<u64, Arc<AtomicBool>>,
}

/// A handle to one isolated in-memory database, shared by every connection
/// a `Pool` built from `handle.config()` opens.
pub struct MockDbHandle {
    id: u64,
    db: Arc<Mutex<Db>>,
}

impl MockDbHandle {
    pub fn config(&self) -> Config {
        Config::new("localhost", "testdb").option(DB_HANDLE_OPTION, self.id as i64)
    }

    /// Simulate the connection identified by `thread_id` being closed by
    /// something external to the pool (a server-side timeout, a killed
    /// socket). Every subsequent driver call on it fails.
    pub fn sever(&self, thread_id: u64) {
        if let Some(flag) = self.db.lock().unwrap().alive_flags.get(&thread_id) {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.db
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

pub fn new_db() -> MockDbHandle {
    let id = NEXT_DB_ID.fetch_add(1, Ordering::Relaxed);
    let db = Arc::new(Mutex::new(Db::default()));
    registry().lock().unwrap().insert(id, db.clone());
    MockDbHandle { id, db }
}

pub struct MockConn {
    id: u64,
    db: Arc<Mutex<Db>>,
    alive: Arc<AtomicBool>,
    pending: Option<Pending>,
    /// Set by `SET SESSION TRANSACTION ISOLATION LEVEL`; per-connection, the
    /// way a real server's session state works — not shared via `Db`.
    isolation: Option<String>,
}

struct Pending {
    sql: String,
    params: Vec<BindValue>,
}

pub struct MockStmt {
    sql: String,
    params: Vec<BindValue>,
}

pub struct MockCursor {
    rows: std::vec::IntoIter<Row>,
}

pub struct MockDriver;

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

        let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        let alive = Arc::new(AtomicBool::new(true));
        db.lock().unwrap().alive_flags.insert(conn_id, alive.clone());

        Ok(MockConn {
            id: conn_id,
            db,
            alive,
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
        guard_alive(conn)?;
        conn.pending = Some(Pending {
            sql: stmt.sql.clone(),
            params: stmt.params.clone(),
        });
        Ok(())
    }

    fn submit_query(conn: &mut Self::Conn, sql: &str) -> Result<()> {
        guard_alive(conn)?;
        conn.pending = Some(Pending {
            sql: sql.to_string(),
            params: Vec::new(),
        });
        Ok(())
    }

    async fn poll_ready(conn: &mut Self::Conn, _timeout: Duration) -> Result<bool> {
        guard_alive(conn)?;
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
        conn.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn drain_pending(conn: &mut Self::Conn) -> Result<()> {
        guard_alive(conn)?;
        conn.pending = None;
        Ok(())
    }

    fn thread_id(conn: &Self::Conn) -> u64 {
        conn.id
    }
}

fn guard_alive(conn: &MockConn) -> Result<()> {
    if conn.alive.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(Error::connection("mock connection severed"))
    }
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

    if upper.starts_with("INSERT INTO") {
        let rest = &trimmed[11..];
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
