//! Storage-level value type.

use serde_json::{Number, Value};
use std::fmt;

/// A value exactly as it is written to or read from the relational store.
///
/// The variants mirror the SQLite storage classes. Working (application
/// level) values are `serde_json::Value`s; converting between the two forms
/// is the job of the column converter in `paperdb_core`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Blob(Vec<u8>),
}

impl RawValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Name of the storage class, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Null => "NULL",
            RawValue::Integer(_) => "INTEGER",
            RawValue::Real(_) => "REAL",
            RawValue::Text(_) => "TEXT",
            RawValue::Blob(_) => "BLOB",
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers widen.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            RawValue::Integer(n) => Some(*n as f64),
            RawValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a blob.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            RawValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Converts a scalar JSON value into its storage form.
    ///
    /// Booleans become `0`/`1`. Arrays and objects have no scalar storage
    /// form and return `None`.
    pub fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(RawValue::Null),
            Value::Bool(b) => Some(RawValue::Integer(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(RawValue::Integer)
                .or_else(|| n.as_f64().map(RawValue::Real)),
            Value::String(s) => Some(RawValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Renders this value as JSON for display purposes.
    ///
    /// Blobs are rendered as their UTF-8 text when possible and as an array
    /// of byte values otherwise. Non-finite floats render as `null`.
    pub fn to_display_json(&self) -> Value {
        match self {
            RawValue::Null => Value::Null,
            RawValue::Integer(n) => Value::from(*n),
            RawValue::Real(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            RawValue::Text(s) => Value::String(s.clone()),
            RawValue::Blob(b) => match std::str::from_utf8(b) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
            },
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::Null
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "NULL"),
            RawValue::Integer(n) => write!(f, "{n}"),
            RawValue::Real(v) => write!(f, "{v}"),
            RawValue::Text(s) => write!(f, "'{s}'"),
            RawValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Integer(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Integer(i64::from(n))
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Real(f)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Integer(i64::from(b))
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(b: Vec<u8>) -> Self {
        RawValue::Blob(b)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_conversion() {
        assert_eq!(RawValue::from_scalar(&json!(null)), Some(RawValue::Null));
        assert_eq!(RawValue::from_scalar(&json!(true)), Some(RawValue::Integer(1)));
        assert_eq!(RawValue::from_scalar(&json!(false)), Some(RawValue::Integer(0)));
        assert_eq!(RawValue::from_scalar(&json!(42)), Some(RawValue::Integer(42)));
        assert_eq!(RawValue::from_scalar(&json!(1.5)), Some(RawValue::Real(1.5)));
        assert_eq!(
            RawValue::from_scalar(&json!("alice")),
            Some(RawValue::Text("alice".into()))
        );
        assert_eq!(RawValue::from_scalar(&json!([1, 2])), None);
        assert_eq!(RawValue::from_scalar(&json!({"a": 1})), None);
    }

    #[test]
    fn integers_widen_to_real() {
        assert_eq!(RawValue::Integer(3).as_real(), Some(3.0));
        assert_eq!(RawValue::Text("3".into()).as_real(), None);
    }

    #[test]
    fn option_conversion() {
        let none: Option<i64> = None;
        assert_eq!(RawValue::from(none), RawValue::Null);
        assert_eq!(RawValue::from(Some("x")), RawValue::Text("x".into()));
    }

    #[test]
    fn display_json_for_blobs() {
        assert_eq!(RawValue::Blob(b"abc".to_vec()).to_display_json(), json!("abc"));
        assert_eq!(RawValue::Blob(vec![0xff]).to_display_json(), json!([255]));
        assert_eq!(RawValue::Real(f64::NAN).to_display_json(), json!(null));
    }
}
