//! An asynchronous MySQL client: a bounded connection pool with a fair FIFO
//! waiter queue, a poll-driven query executor, and a retrying transaction
//! runner with isolation control and commit/rollback hooks.
//!
//! The wire protocol itself is not part of this crate — it is supplied by a
//! host client library implementing [`Driver`]. Embedders provide a `Driver`
//! for their MySQL client of choice; this crate supplies the pool, the
//! poll-loop executor, and the transaction orchestration around it.

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod facade;
mod health;
pub mod logger;
pub mod pool;
pub(crate) mod registry;
pub mod row;
pub mod session;
pub mod transaction;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Config, OptionValue};
pub use driver::{Driver, Outcome};
pub use error::{Error, QueryErrorKind, Result, TransactionErrorKind};
pub use executor::{QueryOutput, Shape};
pub use facade::{Facade, FacadeSingleton};
pub use logger::LogSettings;
pub use pool::{Pool, PoolConnection, Stats};
pub use row::{Row, Value};
pub use session::{Session, SessionId};
pub use transaction::{on_commit, on_rollback, AttemptRecord, IsolationLevel, Transaction};
pub use value::{detect, has_result_set, preprocess, BindValue, Param};
