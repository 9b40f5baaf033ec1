//! Row representation: an ordered, column-keyed map of decoded values.

use indexmap::IndexMap;

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
}

impl Value {
    /// Render this value as its scalar-shape equivalent, mirroring how the
    /// executor's `Scalar` shape reads the first column of the first row.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One row of a result set: column name to decoded value, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new(columns: IndexMap<String, Value>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// The value of the first column, if any (used by the `Scalar` shape).
    pub fn first(&self) -> Option<&Value> {
        self.columns.values().next()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}
