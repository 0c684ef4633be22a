//! Dynamic column values
//!
//! Entities are strongly typed structs, but bound statement arguments and the
//! cells of a fetched row travel through the executor as [`Value`]s.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::{Error, Result};

/// Semantic SQL type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    String,
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
        }
    }
}

/// A single bound argument or row cell
///
/// `Null` doubles as "unset" on an entity attribute: defaults are only
/// materialized for attributes that read back as `Null`.
///
/// `TypedNull` is a NULL argument that carries its column's declared type.
/// PostgreSQL needs it for non-text columns; the mapper produces it from the
/// schema, and it behaves like `Null` everywhere else.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    #[serde(serialize_with = "serialize_typed_null")]
    TypedNull(ColumnType),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::TypedNull(_))
    }

    /// Integer view of the value; floats are truncated
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Float(value) => Some(*value as i64),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null | Value::TypedNull(_) => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::TypedNull(_) => f.write_str("NULL"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "'{}'", value),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

fn serialize_typed_null<S: Serializer>(
    _column_type: &ColumnType,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_none()
}

/// Conversion from a row cell into a typed entity attribute
pub trait FromValue: Sized {
    fn from_value(column: &str, value: Value) -> Result<Self>;
}

fn mismatch(column: &str, expected: &'static str, found: &Value) -> Error {
    Error::Decode {
        column: column.to_string(),
        expected,
        found: found.kind(),
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: Value) -> Result<Self> {
        match value {
            Value::Text(text) => Ok(text),
            other => Err(mismatch(column, "text", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(column: &str, value: Value) -> Result<Self> {
        match value {
            Value::Integer(number) => Ok(number),
            Value::Bool(flag) => Ok(i64::from(flag)),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(column: &str, value: Value) -> Result<Self> {
        match value {
            Value::Float(number) => Ok(number),
            Value::Integer(number) => Ok(number as f64),
            other => Err(mismatch(column, "float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: Value) -> Result<Self> {
        match value {
            Value::Bool(flag) => Ok(flag),
            // SQLite stores BOOLEAN columns as integers
            Value::Integer(number) => Ok(number != 0),
            other => Err(mismatch(column, "boolean", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(column, value).map(Some)
    }
}

/// One fetched row: column names and values in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.cells.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Move a cell out of the record and convert it
    ///
    /// A column missing from the row is an error; a `NULL` cell only
    /// converts into an `Option`.
    pub fn take<T: FromValue>(&mut self, column: &str) -> Result<T> {
        let position = self
            .cells
            .iter()
            .position(|(name, _)| name == column)
            .ok_or_else(|| Error::UnknownColumn(column.to_string()))?;
        let value = std::mem::take(&mut self.cells[position].1);
        T::from_value(column, value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_conversions() {
        assert!(bool::from_value("admin", Value::Integer(1)).unwrap());
        assert!(!bool::from_value("admin", Value::Integer(0)).unwrap());
        assert_eq!(f64::from_value("created_at", Value::Integer(3)).unwrap(), 3.0);
        assert_eq!(Option::<String>::from_value("name", Value::Null).unwrap(), None);
    }

    #[test]
    fn test_typed_null_behaves_like_null() {
        let value = Value::TypedNull(ColumnType::Integer);
        assert!(value.is_null());
        assert_eq!(value.to_string(), "NULL");
        assert_eq!(serde_json::to_string(&value).unwrap(), "null");
        assert_eq!(Option::<i64>::from_value("read_times", value.clone()).unwrap(), None);
        assert!(matches!(
            i64::from_value("read_times", value),
            Err(Error::Decode { found: "null", .. })
        ));
    }

    #[test]
    fn test_mismatch_names_column() {
        let error = i64::from_value("read_times", Value::Text("x".into())).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("read_times"));
        assert!(message.contains("integer"));
    }

    #[test]
    fn test_record_take_and_serialize() {
        let mut record: Record = vec![
            ("id".to_string(), Value::from("a1")),
            ("age".to_string(), Value::from(30)),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":"a1","age":30}"#);

        let age: i64 = record.take("age").unwrap();
        assert_eq!(age, 30);
        assert!(matches!(
            record.take::<String>("missing"),
            Err(Error::UnknownColumn(_))
        ));
    }
}
