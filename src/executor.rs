//! Async Query Executor (§4.D): prepare/bind/execute, poll-driven
//! completion, and result shaping.

use std::time::{Duration, Instant};

use log::LevelFilter;

use crate::{
    driver::{Driver, Outcome},
    error::{Error, QueryErrorKind, Result},
    logger::LogSettings,
    row::{Row, Value},
    session::Session,
    value::{detect, has_result_set, preprocess, Param},
};

/// The initial adaptive poll interval.
pub const POLL_MIN: Duration = Duration::from_micros(10);
/// The clamp applied to the adaptive poll interval.
pub const POLL_MAX: Duration = Duration::from_micros(100);
/// The multiplier applied to the poll interval after each miss.
const POLL_BACKOFF: f64 = 1.2;

/// The requested post-execution transformation of a result (§3's Result
/// Shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rows,
    RowOpt,
    Scalar,
    Affected,
}

/// The shaped outcome of an [`execute`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Scalar(Option<Value>),
    Affected(u64),
}

impl QueryOutput {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            QueryOutput::Row(row) => row,
            QueryOutput::Rows(mut rows) => {
                if rows.is_empty() {
                    None
                } else {
                    Some(rows.remove(0))
                }
            }
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            QueryOutput::Scalar(v) => v,
            QueryOutput::Row(row) => row.and_then(|r| r.first().cloned()),
            _ => None,
        }
    }

    pub fn into_affected(self) -> u64 {
        match self {
            QueryOutput::Affected(n) => n,
            _ => 0,
        }
    }
}

/// Execute a parameterized query against `session` (§4.D "Algorithm
/// (parameterized query)").
pub async fn execute<D: Driver>(
    session: &mut Session<D>,
    sql: &str,
    params: &[Param],
    types: Option<&str>,
    shape: Shape,
) -> Result<QueryOutput> {
    let started = Instant::now();
    let result = execute_inner(session, sql, params, types, shape).await;
    log_statement(session.log_settings(), sql, started.elapsed(), result.is_ok());
    result
}

async fn execute_inner<D: Driver>(
    session: &mut Session<D>,
    sql: &str,
    params: &[Param],
    types: Option<&str>,
    shape: Shape,
) -> Result<QueryOutput> {
    let mut stmt = D::prepare(session.conn_mut(), sql)
        .await
        .map_err(|e| wrap(sql, QueryErrorKind::Prepare, e))?;

    let types_string = resolve_types(params, types);
    let bind_values = preprocess(params);

    D::bind(&mut stmt, &types_string, &bind_values)
        .map_err(|e| wrap(sql, QueryErrorKind::Bind, e))?;

    D::submit_prepared(session.conn_mut(), &stmt)
        .map_err(|e| wrap(sql, QueryErrorKind::Execute, e))?;

    let expect_cursor = has_result_set(sql);
    let outcome = poll_and_reap::<D>(session.conn_mut(), sql, expect_cursor).await?;
    shape_result::<D>(outcome, shape).await
}

/// Execute an unparameterized, unprepared query (§4.D "Algorithm
/// (parameterless query)"): dispatch via the async-submit entry point, then
/// drive the poll loop.
pub async fn execute_raw<D: Driver>(
    session: &mut Session<D>,
    sql: &str,
    shape: Shape,
) -> Result<QueryOutput> {
    let started = Instant::now();
    let result = execute_raw_inner(session, sql, shape).await;
    log_statement(session.log_settings(), sql, started.elapsed(), result.is_ok());
    result
}

async fn execute_raw_inner<D: Driver>(
    session: &mut Session<D>,
    sql: &str,
    shape: Shape,
) -> Result<QueryOutput> {
    D::submit_query(session.conn_mut(), sql).map_err(|e| wrap(sql, QueryErrorKind::Execute, e))?;
    let expect_cursor = has_result_set(sql);
    let outcome = poll_and_reap::<D>(session.conn_mut(), sql, expect_cursor).await?;
    shape_result::<D>(outcome, shape).await
}

/// Resolve the type-code string: the caller's if given, else derived from
/// the value shapes.
fn resolve_types(params: &[Param], types: Option<&str>) -> String {
    match types {
        Some(t) => t.to_string(),
        None => detect(params),
    }
}

/// The adaptive poll loop: a zero-timeout check first, then a growing,
/// clamped timeout with a scheduler yield between attempts. This is the
/// suspension point that lets other cooperative tasks run while a query is
/// in flight.
async fn poll_and_reap<D: Driver>(
    conn: &mut D::Conn,
    sql: &str,
    expect_cursor: bool,
) -> Result<Outcome<D::Cursor>> {
    if D::poll_ready(conn, Duration::ZERO)
        .await
        .map_err(|e| wrap(sql, QueryErrorKind::Poll, e))?
    {
        return D::reap(conn, expect_cursor).map_err(|e| wrap(sql, QueryErrorKind::Reap, e));
    }

    let mut interval = POLL_MIN;
    loop {
        let ready = D::poll_ready(conn, interval)
            .await
            .map_err(|e| wrap(sql, QueryErrorKind::Poll, e))?;

        if ready {
            return D::reap(conn, expect_cursor).map_err(|e| wrap(sql, QueryErrorKind::Reap, e));
        }

        tokio::task::yield_now().await;

        let next = interval.as_secs_f64() * POLL_BACKOFF;
        interval = Duration::from_secs_f64(next).min(POLL_MAX);
    }
}

async fn shape_result<D: Driver>(outcome: Outcome<D::Cursor>, shape: Shape) -> Result<QueryOutput> {
    match shape {
        Shape::Affected => {
            let n = match outcome {
                Outcome::Affected(n) => n.max(0) as u64,
                Outcome::Cursor(_) => 0,
            };
            Ok(QueryOutput::Affected(n))
        }
        Shape::Rows => Ok(QueryOutput::Rows(materialize_all::<D>(outcome)?)),
        Shape::RowOpt => {
            let mut rows = materialize_all::<D>(outcome)?;
            Ok(QueryOutput::Row(if rows.is_empty() {
                None
            } else {
                Some(rows.remove(0))
            }))
        }
        Shape::Scalar => {
            let mut rows = materialize_all::<D>(outcome)?;
            let scalar = if rows.is_empty() {
                None
            } else {
                rows.remove(0).first().cloned()
            };
            Ok(QueryOutput::Scalar(scalar))
        }
    }
}

fn materialize_all<D: Driver>(outcome: Outcome<D::Cursor>) -> Result<Vec<Row>> {
    match outcome {
        Outcome::Affected(_) => Ok(Vec::new()),
        Outcome::Cursor(mut cursor) => {
            let mut rows = Vec::new();
            while let Some(row) =
                D::fetch_row(&mut cursor).map_err(|e| wrap("", QueryErrorKind::Reap, e))?
            {
                rows.push(row);
            }
            Ok(rows)
        }
    }
}

fn wrap(sql: &str, kind: QueryErrorKind, err: Error) -> Error {
    match err {
        Error::Query { message, cause, .. } => Error::Query {
            sql: sql.to_string(),
            kind,
            message,
            cause,
        },
        other => Error::query(sql, kind, other.to_string()),
    }
}

/// Emit one statement-completion event at the level `settings` calls for:
/// `slow_statements_level` once `elapsed` crosses `slow_statements_duration`,
/// else `statements_level`; a failing statement is always logged at `Warn`
/// or louder regardless of duration.
fn log_statement(settings: &LogSettings, sql: &str, elapsed: Duration, ok: bool) {
    if !settings.is_enabled() {
        return;
    }

    let level = if !ok {
        settings.statements_level.max(LevelFilter::Warn)
    } else if elapsed >= settings.slow_statements_duration {
        settings.slow_statements_level
    } else {
        settings.statements_level
    };

    if level == LevelFilter::Off {
        return;
    }

    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    match level {
        LevelFilter::Error => {
            tracing::error!(target: "myrmidon_mysql::executor", sql, elapsed_ms, ok)
        }
        LevelFilter::Warn => {
            tracing::warn!(target: "myrmidon_mysql::executor", sql, elapsed_ms, ok)
        }
        LevelFilter::Info => {
            tracing::info!(target: "myrmidon_mysql::executor", sql, elapsed_ms, ok)
        }
        LevelFilter::Debug => {
            tracing::debug!(target: "myrmidon_mysql::executor", sql, elapsed_ms, ok)
        }
        LevelFilter::Trace | LevelFilter::Off => {
            tracing::trace!(target: "myrmidon_mysql::executor", sql, elapsed_ms, ok)
        }
    }
}
