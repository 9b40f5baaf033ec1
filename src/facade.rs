//! Client Facade (§4.G): stitches the pool, executor, and transaction runner
//! into one API, plus an init-once singleton wrapper for embedding into an
//! application that wants one shared instance.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::{
    config::Config,
    driver::Driver,
    error::{Error, Result},
    executor::{self, QueryOutput, Shape},
    pool::{Pool, Stats},
    registry::Registry,
    row::{Row, Value},
    session::{Session, SessionId},
    transaction::{run_transaction, IsolationLevel, Transaction},
    value::Param,
};

/// A ready-to-use handle combining a [`Pool`] and a [`Registry`]. Cheap to
/// clone: both members are reference-counted. Implemented by hand rather
/// than derived, since `#[derive(Clone)]` would add a spurious `D: Clone`
/// bound that neither field actually needs.
pub struct Facade<D: Driver> {
    pool: Pool<D>,
    registry: Arc<Registry>,
}

impl<D: Driver> Clone for Facade<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<D: Driver> Facade<D> {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            pool: Pool::new(config)?,
            registry: Arc::new(Registry::new()),
        })
    }

    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        self.acquire_execute_release(sql, params, Shape::Rows)
            .await
            .map(QueryOutput::into_rows)
    }

    pub async fn fetch_one(&self, sql: &str, params: &[Param]) -> Result<Option<Row>> {
        self.acquire_execute_release(sql, params, Shape::RowOpt)
            .await
            .map(QueryOutput::into_row)
    }

    pub async fn fetch_value(&self, sql: &str, params: &[Param]) -> Result<Option<Value>> {
        self.acquire_execute_release(sql, params, Shape::Scalar)
            .await
            .map(QueryOutput::into_scalar)
    }

    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<u64> {
        self.acquire_execute_release(sql, params, Shape::Affected)
            .await
            .map(QueryOutput::into_affected)
    }

    async fn acquire_execute_release(
        &self,
        sql: &str,
        params: &[Param],
        shape: Shape,
    ) -> Result<QueryOutput> {
        let mut conn = self.pool.acquire().await?;
        let result = executor::execute::<D>(&mut conn, sql, params, None, shape).await;
        conn.release().await;
        result
    }

    /// Acquire a session, hand it to `callback`, release on every exit path
    /// (§4.G `run`). Unlike `transaction`, no BEGIN/COMMIT wraps the call.
    pub async fn run<F, Fut, T>(&self, callback: F) -> Result<T>
    where
        F: FnOnce(&mut Session<D>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut conn = self.pool.acquire().await?;
        let result = callback(&mut conn).await;
        conn.release().await;
        result
    }

    /// Run `callback` inside a retrying transaction (§4.F).
    pub async fn transaction<F, Fut, T>(
        &self,
        attempts: u32,
        isolation: Option<IsolationLevel>,
        callback: F,
    ) -> Result<T>
    where
        F: FnMut(Transaction<'_, D>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run_transaction(&self.pool, &self.registry, attempts, isolation, callback).await
    }

    pub fn stats(&self) -> Stats {
        self.pool.stats()
    }

    pub fn last_handed_out(&self) -> Option<SessionId> {
        self.pool.last_handed_out()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A process-wide `Facade` slot with init-once semantics (§4.G "singleton
/// façade"). The embedding application declares its own `static` of this
/// type (generic statics aren't expressible in Rust) and calls `init` once
/// at startup.
pub struct FacadeSingleton<D: Driver> {
    inner: Mutex<Option<Facade<D>>>,
}

impl<D: Driver> FacadeSingleton<D> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Build the shared `Facade` from `config`. A second call is a silent
    /// no-op: the existing instance (and its pool) is kept.
    pub fn init(&self, config: Config) -> Result<()> {
        let mut slot = self.inner.lock().unwrap();
        if slot.is_some() {
            return Ok(());
        }
        *slot = Some(Facade::new(config)?);
        Ok(())
    }

    /// Clear the singleton. A subsequent `init` builds a fresh `Facade`.
    pub fn reset(&self) {
        *self.inner.lock().unwrap() = None;
    }

    fn get(&self) -> Result<Facade<D>> {
        self.inner
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::NotInitialized)
    }

    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        self.get()?.query(sql, params).await
    }

    pub async fn fetch_one(&self, sql: &str, params: &[Param]) -> Result<Option<Row>> {
        self.get()?.fetch_one(sql, params).await
    }

    pub async fn fetch_value(&self, sql: &str, params: &[Param]) -> Result<Option<Value>> {
        self.get()?.fetch_value(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<u64> {
        self.get()?.execute(sql, params).await
    }

    pub async fn run<F, Fut, T>(&self, callback: F) -> Result<T>
    where
        F: FnOnce(&mut Session<D>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get()?.run(callback).await
    }

    pub async fn transaction<F, Fut, T>(
        &self,
        attempts: u32,
        isolation: Option<IsolationLevel>,
        callback: F,
    ) -> Result<T>
    where
        F: FnMut(Transaction<'_, D>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get()?.transaction(attempts, isolation, callback).await
    }

    pub fn stats(&self) -> Result<Stats> {
        self.get().map(|f| f.stats())
    }

    pub fn last_handed_out(&self) -> Result<Option<SessionId>> {
        self.get().map(|f| f.last_handed_out())
    }
}

impl<D: Driver> Default for FacadeSingleton<D> {
    fn default() -> Self {
        Self::new()
    }
}
