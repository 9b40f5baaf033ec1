//! Parameter value shapes, the total type-derivation mapping, and the
//! bind-value preprocessing transform described in the executor's design.

use serde::Serialize;

/// A value a caller binds into a parameterized query.
///
/// `Json` covers both "sequence/record" composite values (encoded as
/// canonical JSON) and any value for which the caller has already produced a
/// string form of their own (encode into `Str` directly for that case).
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Raw bytes, or text containing embedded NUL bytes.
    Bytes(Vec<u8>),
    Str(String),
    Json(serde_json::Value),
}

impl Param {
    pub fn json(value: impl Serialize) -> Self {
        Param::Json(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}
impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}
impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::UInt(v)
    }
}
impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}
impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Str(v)
    }
}
impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.to_owned())
    }
}
impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}
impl<T> From<Option<T>> for Param
where
    T: Into<Param>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Param::Null,
        }
    }
}

/// A value as bound onto the wire, after type derivation and preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
}

/// Derive a MySQL `mysqli_stmt_bind_param`-style type-code string from a
/// parameter list: `s`=string, `i`=integer, `d`=double, `b`=blob.
///
/// Total over every [`Param`] shape; the returned string always has the same
/// length as `params`. If `params` is empty the derived string is the empty
/// string, which is already "a run of `s`s of the correct length" (zero of
/// them); this function makes that explicit rather than relying on the empty
/// case falling out of the loop by accident.
pub fn detect(params: &[Param]) -> String {
    if params.is_empty() {
        return String::new();
    }

    let derived: String = params
        .iter()
        .map(|p| match p {
            Param::Null => 's',
            Param::Bool(_) | Param::Int(_) | Param::UInt(_) => 'i',
            Param::Float(_) => 'd',
            Param::Bytes(_) => 'b',
            Param::Str(_) | Param::Json(_) => 's',
        })
        .collect();

    if derived.is_empty() {
        "s".repeat(params.len())
    } else {
        derived
    }
}

/// Transform caller-supplied [`Param`] values into the wire-ready
/// [`BindValue`] the driver binds. Total and order-preserving.
pub fn preprocess(params: &[Param]) -> Vec<BindValue> {
    params
        .iter()
        .map(|p| match p {
            Param::Null => BindValue::Null,
            Param::Bool(b) => BindValue::Int(if *b { 1 } else { 0 }),
            Param::Int(i) => BindValue::Int(*i),
            Param::UInt(u) => BindValue::Int(*u as i64),
            Param::Float(f) => BindValue::Float(*f),
            Param::Bytes(b) => BindValue::Bytes(b.clone()),
            Param::Str(s) => BindValue::Str(s.clone()),
            Param::Json(v) => BindValue::Str(serde_json::to_string(v).unwrap_or_default()),
        })
        .collect()
}

/// Returns `true` if `sql`'s first keyword (case-insensitively, ignoring
/// leading whitespace) indicates the statement produces a result set.
pub fn has_result_set(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    let first_word: String = trimmed
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    matches!(first_word.as_str(), "SELECT" | "SHOW" | "DESCRIBE")
}
