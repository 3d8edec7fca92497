/// Value Module
///
/// Scalar values, rows and the fetch/quote modifiers shared by the driver
/// boundary and the public client API.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A single column value or bound parameter.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Controls how fetched rows are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Keyed by column name
    Assoc,
    /// Keyed by zero-based column index
    Num,
    /// Keyed by both name and index
    #[default]
    Both,
}

/// Type hint for [`DriverConnection::quote`](super::DriverConnection::quote).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    Str,
    Int,
    Bool,
    Null,
    Lob,
}

/// Key of a row entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => write!(f, "{}", name),
            ColumnKey::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<usize> for ColumnKey {
    fn from(index: usize) -> Self {
        ColumnKey::Index(index)
    }
}

/// A fetched row. The empty row doubles as the "no row" sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: Vec<(ColumnKey, Value)>,
}

impl Row {
    /// Builds a row from column names and values, keyed according to `mode`.
    pub fn from_values(columns: &[String], values: Vec<Value>, mode: FetchMode) -> Self {
        let mut entries = Vec::with_capacity(match mode {
            FetchMode::Both => values.len() * 2,
            _ => values.len(),
        });
        for (index, value) in values.into_iter().enumerate() {
            let name = columns.get(index).cloned().unwrap_or_else(|| index.to_string());
            match mode {
                FetchMode::Assoc => entries.push((ColumnKey::Name(name), value)),
                FetchMode::Num => entries.push((ColumnKey::Index(index), value)),
                FetchMode::Both => {
                    entries.push((ColumnKey::Name(name), value.clone()));
                    entries.push((ColumnKey::Index(index), value));
                }
            }
        }
        Row { entries }
    }

    pub fn empty() -> Self {
        Row::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries (twice the column count in [`FetchMode::Both`]).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: impl Into<ColumnKey>) -> Option<&Value> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ColumnKey, Value)> {
        self.entries.iter()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

/// Input accepted by [`Client::quote`](crate::core::db::Client::quote).
#[derive(Debug, Clone, PartialEq)]
pub enum Quotable {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for Quotable {
    fn from(value: Value) -> Self {
        Quotable::Scalar(value)
    }
}

impl From<&str> for Quotable {
    fn from(value: &str) -> Self {
        Quotable::Scalar(value.into())
    }
}

impl From<String> for Quotable {
    fn from(value: String) -> Self {
        Quotable::Scalar(value.into())
    }
}

impl From<i64> for Quotable {
    fn from(value: i64) -> Self {
        Quotable::Scalar(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Quotable {
    fn from(value: Option<T>) -> Self {
        Quotable::Scalar(value.into())
    }
}

impl From<Vec<Value>> for Quotable {
    fn from(values: Vec<Value>) -> Self {
        Quotable::List(values)
    }
}
