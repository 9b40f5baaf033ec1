//! Configuration record and its validator.
//!
//! The validator is, per `spec.md` §1, conceptually an external collaborator
//! ("a pure predicate over a configuration record"); it is implemented here
//! as exactly that — a pure function with no side effects — so the pool and
//! facade have something to call, grounded on the builder style of the
//! teacher's `crates/musq/src/musq.rs::Musq`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logger::LogSettings;

/// A driver option value: an opaque int/string key-value pair passed through
/// to the client library (§4.B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

/// Recognized configuration keys (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default)]
    pub username: String,
    pub database: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub socket: Option<String>,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub options: HashMap<i64, OptionValue>,

    #[serde(default = "default_pool_max_connections")]
    pub pool_max_connections: u32,
    #[serde(default = "default_acquire_timeout", with = "duration_secs")]
    pub pool_acquire_timeout: Duration,

    #[serde(skip, default)]
    pub log_settings: LogSettings,
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_pool_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Config {
    /// Construct a minimal config with required fields; callers then chain
    /// the `#[must_use]` builder setters below.
    #[must_use]
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: String::new(),
            database: database.into(),
            password: None,
            port: None,
            socket: None,
            charset: default_charset(),
            persistent: false,
            options: HashMap::new(),
            pool_max_connections: default_pool_max_connections(),
            pool_acquire_timeout: default_acquire_timeout(),
            log_settings: LogSettings::default(),
        }
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    #[must_use]
    pub fn option(mut self, code: i64, value: impl Into<OptionValue>) -> Self {
        self.options.insert(code, value.into());
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.pool_max_connections = max;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool_acquire_timeout = timeout;
        self
    }

    /// Validate the recognized keys: `host` and `database` non-empty,
    /// `username` may be empty, `port` positive if present. A pure predicate
    /// with no side effects.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "host",
                expected: "non-empty string",
            });
        }
        if self.database.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "database",
                expected: "non-empty string",
            });
        }
        if let Some(port) = self.port {
            if port == 0 {
                return Err(Error::ConfigInvalid {
                    field: "port",
                    expected: "positive integer",
                });
            }
        }
        if self.pool_max_connections == 0 {
            return Err(Error::ConfigInvalid {
                field: "pool_max_connections",
                expected: "integer >= 1",
            });
        }
        Ok(())
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}
impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_owned())
    }
}
