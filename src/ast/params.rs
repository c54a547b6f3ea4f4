//! Application values and database-ready bindings
//!
//! A [`Value`] is what the query builder receives from application code. A
//! [`Scalar`] is what ends up in the positional binding list after the type
//! registry converted it. Only scalars are ever bound to a `?` placeholder.

use chrono::{NaiveDate, NaiveDateTime};

/// An application-level value, before type conversion
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Date and time without timezone
    DateTime(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Structured document (serialized by the `json` type)
    Json(serde_json::Value),
    /// List of values (IN lists, BETWEEN bounds, array columns)
    Array(Vec<Value>),
}

impl Value {
    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A database-ready value bound to one positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render for logs; never used to build executable SQL
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl TryFrom<Value> for Scalar {
    type Error = Value;

    /// Accept values that are already database-ready; hand back the rest
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Integer(n) => Ok(Self::Integer(n)),
            Value::Float(f) => Ok(Self::Float(f)),
            Value::String(s) => Ok(Self::String(s)),
            Value::Bytes(b) => Ok(Self::Bytes(b)),
            other => Err(other),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// Convert a serde_json::Value to a Value
///
/// Objects stay structured documents; everything else maps to the matching
/// primitive so it can be compared against regular columns.
pub fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(arr) => Value::Array(arr.iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::Json(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_to_value() {
        assert_eq!(json_to_value(&serde_json::Value::Null), Value::Null);
        assert_eq!(json_to_value(&serde_json::json!(true)), Value::Bool(true));
        assert_eq!(json_to_value(&serde_json::json!(42)), Value::Integer(42));
        assert_eq!(
            json_to_value(&serde_json::json!("hello")),
            Value::String("hello".into())
        );

        match json_to_value(&serde_json::json!([1, 2, 3])) {
            Value::Array(v) => assert_eq!(v.len(), 3),
            other => panic!("Expected Array, got {other:?}"),
        }

        assert!(matches!(
            json_to_value(&serde_json::json!({"a": 1})),
            Value::Json(_)
        ));
    }

    #[test]
    fn test_scalar_try_from() {
        assert_eq!(Scalar::try_from(Value::Integer(3)), Ok(Scalar::Integer(3)));
        assert_eq!(Scalar::try_from(Value::Null), Ok(Scalar::Null));

        let list = Value::from(vec![1, 2]);
        assert_eq!(Scalar::try_from(list.clone()), Err(list));
    }

    #[test]
    fn test_value_from() {
        let _: Value = true.into();
        let _: Value = "hello".into();
        let _: Value = 42i32.into();
        let _: Value = 42i64.into();
        let _: Value = 3.5f64.into();
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(7)), Value::Integer(7));
        assert!(Value::from(vec!["a", "b"]).is_array());
    }
}
