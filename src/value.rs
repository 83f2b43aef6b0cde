//! Host values and raw wire values.
//!
//! [`Value`] is the in-memory side of every conversion; [`RawValue`] is what a
//! driver hands over for a result column before any typing happens.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;

use crate::types::interval::Interval;

/// Host type names, as reported by [`Value::host_type`].
pub mod host {
    pub const NULL: &str = "null";
    pub const BOOL: &str = "bool";
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STRING: &str = "string";
    pub const BYTES: &str = "bytes";
    pub const JSON: &str = "json";
    pub const UUID: &str = "uuid";
    pub const DATETIME: &str = "datetime";
    pub const DATE: &str = "date";
    pub const TIME: &str = "time";
    pub const INTERVAL: &str = "interval";
    pub const ARRAY: &str = "array";
}

/// Dynamic host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Decoded JSON document.
    Json(serde_json::Value),
    #[cfg(feature = "uuid")]
    Uuid(uuid::Uuid),
    /// Zoned timestamp; the offset is the one of the client zone at that instant.
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Interval(Interval),
    /// Ordered, possibly nested, sequence (SQL arrays and rows).
    Array(Vec<Value>),
}

impl Value {
    /// Name of the host type carried by this value.
    pub fn host_type(&self) -> &'static str {
        match self {
            Value::Null => host::NULL,
            Value::Bool(_) => host::BOOL,
            Value::Int(_) => host::INT,
            Value::Float(_) => host::FLOAT,
            Value::String(_) => host::STRING,
            Value::Bytes(_) => host::BYTES,
            Value::Json(_) => host::JSON,
            #[cfg(feature = "uuid")]
            Value::Uuid(_) => host::UUID,
            Value::DateTime(_) => host::DATETIME,
            Value::Date(_) => host::DATE,
            Value::Time(_) => host::TIME,
            Value::Interval(_) => host::INTERVAL,
            Value::Array(_) => host::ARRAY,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Build a value from a JSON document.
    ///
    /// Objects have no host counterpart other than JSON itself and stay
    /// wrapped in [`Value::Json`].
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Json(object),
        }
    }

    /// Structural JSON form of this value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::Number((*b).into())).collect(),
            ),
            Value::Json(json) => json.clone(),
            #[cfg(feature = "uuid")]
            Value::Uuid(uuid) => serde_json::Value::String(uuid.hyphenated().to_string()),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string())
            }
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => serde_json::Value::String(t.format("%H:%M:%S%.6f").to_string()),
            Value::Interval(i) => serde_json::Value::String(i.to_iso8601()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Raw value of a result column, before any typing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Null,
    Text(&'a str),
    /// Bytes already unescaped by the driver (bytea/blob columns).
    Binary(&'a [u8]),
}

impl RawValue<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl<'a> From<&'a str> for RawValue<'a> {
    fn from(v: &'a str) -> Self {
        RawValue::Text(v)
    }
}

impl<'a> From<&'a String> for RawValue<'a> {
    fn from(v: &'a String) -> Self {
        RawValue::Text(v)
    }
}

impl<'a> From<Option<&'a str>> for RawValue<'a> {
    fn from(v: Option<&'a str>) -> Self {
        v.map(RawValue::Text).unwrap_or(RawValue::Null)
    }
}

impl<'a> From<&'a [u8]> for RawValue<'a> {
    fn from(v: &'a [u8]) -> Self {
        RawValue::Binary(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(v)
    }
}

#[cfg(feature = "uuid")]
impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec![Value::from("a"), Value::from("b")]),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(Value::from(vec![1u8, 2u8]), Value::Bytes(vec![1, 2]));
    }

    #[test]
    fn test_host_type() {
        assert_eq!(Value::Int(1).host_type(), "int");
        assert_eq!(Value::Array(vec![]).host_type(), "array");
        assert_eq!(Value::Null.host_type(), "null");
    }

    #[test]
    fn test_json_bridge() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null]});
        let value = Value::from_json(json.clone());
        assert_eq!(value, Value::Json(json.clone()));
        assert_eq!(value.to_json(), json);

        let list = Value::from_json(serde_json::json!([1, 2.5, "x", null, true]));
        assert_eq!(
            list,
            Value::Array(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::String("x".into()),
                Value::Null,
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn test_raw_value_from() {
        assert_eq!(RawValue::from(None::<&str>), RawValue::Null);
        assert_eq!(RawValue::from("t"), RawValue::Text("t"));
        assert!(RawValue::Null.is_null());
    }
}
