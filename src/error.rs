//! Error types and result helpers.

use std::fmt;

use crate::transaction::AttemptRecord;

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-tag distinguishing where in the query-execution pipeline a
/// [`Error::Query`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Prepare,
    Bind,
    Execute,
    Poll,
    Reap,
    /// Caught a driver error of an unexpected shape and wrapped it generically.
    Unexpected,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryErrorKind::Prepare => "prepare",
            QueryErrorKind::Bind => "bind",
            QueryErrorKind::Execute => "execute",
            QueryErrorKind::Poll => "poll",
            QueryErrorKind::Reap => "reap",
            QueryErrorKind::Unexpected => "unexpected",
        };
        f.write_str(s)
    }
}

/// Sub-tag distinguishing which phase of a transaction attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    Begin,
    Commit,
    Rollback,
    Isolation,
    CommitHook,
    RollbackHook,
}

impl fmt::Display for TransactionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionErrorKind::Begin => "begin",
            TransactionErrorKind::Commit => "commit",
            TransactionErrorKind::Rollback => "rollback",
            TransactionErrorKind::Isolation => "isolation",
            TransactionErrorKind::CommitHook => "commit-hook",
            TransactionErrorKind::RollbackHook => "rollback-hook",
        };
        f.write_str(s)
    }
}

/// Represents all the ways a call into this crate can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration record failed validation.
    #[error("invalid configuration: field `{field}` expected {expected}")]
    ConfigInvalid {
        field: &'static str,
        expected: &'static str,
    },

    /// A call was made on a facade singleton before `init` was called.
    #[error("facade singleton used before init()")]
    NotInitialized,

    /// The pool has been closed; no further operations will succeed.
    #[error("pool is closed")]
    PoolClosed,

    /// Failed to establish a new connection via the Connection Factory.
    #[error("failed to connect to database: {message}")]
    Connection {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed somewhere in the prepare/bind/execute/poll/reap pipeline.
    #[error("query error during {kind} (sql: {sql}): {message}")]
    Query {
        sql: String,
        kind: QueryErrorKind,
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed somewhere in the begin/commit/rollback/isolation/hook pipeline.
    #[error("transaction error during {kind}")]
    Transaction {
        kind: TransactionErrorKind,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `on_commit`/`on_rollback` called outside of an active transaction for
    /// the calling task.
    #[error("not currently inside a transaction on this task")]
    NotInTransaction,

    /// All configured attempts of a transaction failed.
    #[error("transaction failed after {attempts} attempt(s)")]
    TransactionFailed {
        attempts: u32,
        history: Vec<AttemptRecord>,
        #[source]
        cause: Box<Error>,
    },

    /// An invalid argument was passed to a public entry point.
    #[error("invalid argument: {param}")]
    InvalidArgument { param: &'static str },
}

impl Error {
    pub fn query(sql: impl Into<String>, kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Error::Query {
            sql: sql.into(),
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn transaction(kind: TransactionErrorKind, cause: Error) -> Self {
        Error::Transaction {
            kind,
            cause: Box::new(cause),
        }
    }

    /// Construct a `Connection` error with no underlying driver cause (used
    /// by `Driver` implementations that detect a severed transport directly
    /// rather than catching a nested error).
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
            cause: None,
        }
    }
}
