//! Type conversion bridge
//!
//! Every value the compiler binds without the `converted` flag goes through a
//! [`TypeRegistry`], which turns an application [`Value`] into a database-ready
//! [`Scalar`]. Only the application-to-database direction is needed to
//! compile queries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{Scalar, TypeRef, Value};
use crate::error::{CompileError, CompileResult};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
/// 2^63
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Converts application values to database scalars
pub trait TypeRegistry: fmt::Debug + Send + Sync {
    /// Convert `value`, using `ty` when given and the value's own shape otherwise
    fn to_database(&self, value: &Value, ty: Option<&TypeRef>) -> CompileResult<Scalar>;
}

/// One registered type
pub trait ValueType: fmt::Debug + Send + Sync {
    fn to_database(&self, value: &Value) -> CompileResult<Scalar>;
}

/// Conversion for values that carry no declared type
pub fn infer_scalar(value: &Value) -> CompileResult<Scalar> {
    Ok(match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Integer(n) => Scalar::Integer(*n),
        Value::Float(f) => Scalar::Float(*f),
        Value::String(s) => Scalar::String(s.clone()),
        Value::DateTime(dt) => Scalar::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::Date(d) => Scalar::String(d.format(DATE_FORMAT).to_string()),
        Value::Bytes(b) => Scalar::Bytes(b.clone()),
        Value::Json(v) => Scalar::String(v.to_string()),
        Value::Array(_) => {
            return Err(CompileError::conversion(
                "mixed",
                "a list cannot be bound to a single placeholder",
            ))
        }
    })
}

/// Built-in types, selected by [`TypeMap::with_builtins`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Date,
    Time,
    Json,
    SimpleArray,
    Binary,
}

impl BuiltinType {
    fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Time => "time",
            Self::Json => "json",
            Self::SimpleArray => "array",
            Self::Binary => "binary",
        }
    }

    fn refuse(&self, value: &Value) -> CompileError {
        CompileError::conversion(self.name(), format!("unsupported value {value:?}"))
    }

    fn to_integer(&self, value: &Value) -> CompileResult<Scalar> {
        match value {
            Value::Integer(n) => Ok(Scalar::Integer(*n)),
            Value::Bool(b) => Ok(Scalar::Integer(i64::from(*b))),
            Value::Float(f) if f.fract() == 0.0 => {
                // i64 covers [-2^63, 2^63)
                if *f < -I64_BOUND || *f >= I64_BOUND {
                    return Err(CompileError::conversion(
                        self.name(),
                        format!("{f} is out of integer range"),
                    ));
                }
                Ok(Scalar::Integer(*f as i64))
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Scalar::Integer)
                .map_err(|e| CompileError::conversion(self.name(), e.to_string())),
            other => Err(self.refuse(other)),
        }
    }

    fn to_float(&self, value: &Value) -> CompileResult<Scalar> {
        match value {
            Value::Float(f) => Ok(Scalar::Float(*f)),
            Value::Integer(n) => Ok(Scalar::Float(*n as f64)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Scalar::Float)
                .map_err(|e| CompileError::conversion(self.name(), e.to_string())),
            other => Err(self.refuse(other)),
        }
    }

    fn to_boolean(&self, value: &Value) -> CompileResult<Scalar> {
        match value {
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Integer(n) => Ok(Scalar::Bool(*n != 0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Scalar::Bool(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Scalar::Bool(false)),
                _ => Err(self.refuse(value)),
            },
            other => Err(self.refuse(other)),
        }
    }

    fn to_simple_array(&self, value: &Value) -> CompileResult<Scalar> {
        match value {
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match infer_scalar(item)? {
                        Scalar::Null => {}
                        scalar => parts.push(scalar.to_display_string()),
                    }
                }
                Ok(Scalar::String(parts.join(",")))
            }
            Value::String(s) => Ok(Scalar::String(s.clone())),
            other => Err(self.refuse(other)),
        }
    }
}

impl ValueType for BuiltinType {
    fn to_database(&self, value: &Value) -> CompileResult<Scalar> {
        if value.is_null() {
            return Ok(Scalar::Null);
        }

        match self {
            Self::String => match value {
                Value::String(s) => Ok(Scalar::String(s.clone())),
                Value::Array(_) | Value::Json(_) | Value::Bytes(_) => Err(self.refuse(value)),
                other => infer_scalar(other)
                    .map(|scalar| Scalar::String(scalar.to_display_string())),
            },
            Self::Integer => self.to_integer(value),
            Self::Float => self.to_float(value),
            Self::Decimal => match value {
                Value::String(s) => Ok(Scalar::String(s.clone())),
                Value::Integer(n) => Ok(Scalar::String(n.to_string())),
                Value::Float(f) => Ok(Scalar::String(f.to_string())),
                other => Err(self.refuse(other)),
            },
            Self::Boolean => self.to_boolean(value),
            Self::DateTime => match value {
                Value::DateTime(dt) => Ok(Scalar::String(dt.format(DATETIME_FORMAT).to_string())),
                Value::Date(d) => Ok(Scalar::String(format!("{} 00:00:00", d.format(DATE_FORMAT)))),
                Value::String(s) => Ok(Scalar::String(s.clone())),
                other => Err(self.refuse(other)),
            },
            Self::Date => match value {
                Value::DateTime(dt) => Ok(Scalar::String(dt.format(DATE_FORMAT).to_string())),
                Value::Date(d) => Ok(Scalar::String(d.format(DATE_FORMAT).to_string())),
                Value::String(s) => Ok(Scalar::String(s.clone())),
                other => Err(self.refuse(other)),
            },
            Self::Time => match value {
                Value::DateTime(dt) => Ok(Scalar::String(dt.format(TIME_FORMAT).to_string())),
                Value::String(s) => Ok(Scalar::String(s.clone())),
                other => Err(self.refuse(other)),
            },
            Self::Json => match value {
                Value::Json(v) => Ok(Scalar::String(v.to_string())),
                other => serde_json::to_string(&value_to_json(other))
                    .map(Scalar::String)
                    .map_err(|e| CompileError::conversion(self.name(), e.to_string())),
            },
            Self::SimpleArray => self.to_simple_array(value),
            Self::Binary => match value {
                Value::Bytes(b) => Ok(Scalar::Bytes(b.clone())),
                Value::String(s) => Ok(Scalar::Bytes(s.as_bytes().to_vec())),
                other => Err(self.refuse(other)),
            },
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::DateTime(dt) => serde_json::Value::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
        Value::Bytes(b) => serde_json::Value::from(b.clone()),
        Value::Json(v) => v.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

/// Name-keyed [`TypeRegistry`]
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    types: HashMap<String, Arc<dyn ValueType>>,
}

impl TypeMap {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in types and their aliases
    pub fn with_builtins() -> Self {
        let mut map = Self::new();
        let builtins: &[(&str, BuiltinType)] = &[
            ("string", BuiltinType::String),
            ("text", BuiltinType::String),
            ("guid", BuiltinType::String),
            ("integer", BuiltinType::Integer),
            ("bigint", BuiltinType::Integer),
            ("smallint", BuiltinType::Integer),
            ("tinyint", BuiltinType::Integer),
            ("float", BuiltinType::Float),
            ("double", BuiltinType::Float),
            ("decimal", BuiltinType::Decimal),
            ("boolean", BuiltinType::Boolean),
            ("datetime", BuiltinType::DateTime),
            ("timestamp", BuiltinType::DateTime),
            ("date", BuiltinType::Date),
            ("time", BuiltinType::Time),
            ("json", BuiltinType::Json),
            ("array", BuiltinType::SimpleArray),
            ("simple_array", BuiltinType::SimpleArray),
            ("binary", BuiltinType::Binary),
            ("blob", BuiltinType::Binary),
        ];
        for (name, ty) in builtins {
            map.register(*name, *ty);
        }
        map
    }

    /// Register (or replace) a type
    pub fn register(&mut self, name: impl Into<String>, ty: impl ValueType + 'static) -> &mut Self {
        self.types.insert(name.into().to_ascii_lowercase(), Arc::new(ty));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ValueType>> {
        self.types.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl TypeRegistry for TypeMap {
    fn to_database(&self, value: &Value, ty: Option<&TypeRef>) -> CompileResult<Scalar> {
        let Some(ty) = ty else {
            return infer_scalar(value);
        };

        let converter = self
            .get(&ty.name)
            .ok_or_else(|| CompileError::UnknownType(ty.name.clone()))?;

        // Array columns are stored through the simple array codec
        if ty.is_array {
            return match value {
                Value::Array(items) => {
                    let converted = items
                        .iter()
                        .map(|item| {
                            converter
                                .to_database(item)
                                .map(|scalar| Value::String(scalar.to_display_string()))
                        })
                        .collect::<CompileResult<Vec<_>>>()?;
                    BuiltinType::SimpleArray.to_database(&Value::Array(converted))
                }
                other => converter.to_database(other),
            };
        }

        converter.to_database(value)
    }
}
