//! The Session Handle (§3): an opaque owned handle to one MySQL client
//! connection.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{driver::Driver, logger::LogSettings};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a [`Session`] for the lifetime of the process. Used by the
/// Transaction Context Registry to key contexts without holding a reference
/// to the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An owned handle to one MySQL client connection (§3).
///
/// Attributes visible to the core: `alive`, `in_transaction`, `thread_id`,
/// `autocommit`.
pub struct Session<D: Driver> {
    pub(crate) id: SessionId,
    pub(crate) conn: D::Conn,
    alive: bool,
    in_transaction: bool,
    autocommit: bool,
    log_settings: LogSettings,
}

impl<D: Driver> Session<D> {
    pub(crate) fn new(conn: D::Conn, log_settings: LogSettings) -> Self {
        Self {
            id: SessionId::next(),
            conn,
            alive: true,
            in_transaction: false,
            autocommit: true,
            log_settings,
        }
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.log_settings
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub(crate) fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn set_in_transaction(&mut self, v: bool) {
        self.in_transaction = v;
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub(crate) fn set_autocommit(&mut self, v: bool) {
        self.autocommit = v;
    }

    pub fn thread_id(&self) -> u64 {
        D::thread_id(&self.conn)
    }

    pub fn conn(&self) -> &D::Conn {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut D::Conn {
        &mut self.conn
    }
}
