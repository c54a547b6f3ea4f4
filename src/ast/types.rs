//! Value type references
//!
//! A [`TypeRef`] names a type registered in a
//! [`TypeRegistry`](crate::compiler::TypeRegistry). The compiler never looks
//! inside it: conversion rules live in the registry.

/// Handle to a registered value type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Registered type name (e.g., "string", "integer", "datetime")
    pub name: String,
    /// Whether the column stores a list of `name` values
    pub is_array: bool,
}

impl TypeRef {
    /// Create a new type reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
        }
    }

    /// Create an array version of this type
    pub fn into_array(self) -> Self {
        Self {
            is_array: true,
            ..self
        }
    }

    pub fn string() -> Self {
        Self::new("string")
    }

    pub fn integer() -> Self {
        Self::new("integer")
    }

    pub fn float() -> Self {
        Self::new("float")
    }

    pub fn boolean() -> Self {
        Self::new("boolean")
    }

    pub fn datetime() -> Self {
        Self::new("datetime")
    }

    pub fn date() -> Self {
        Self::new("date")
    }

    pub fn json() -> Self {
        Self::new("json")
    }

    /// Parse a declared type name (e.g., "integer", "string[]")
    pub fn from_name(type_name: &str) -> Self {
        let trimmed = type_name.trim();
        match trimmed.strip_suffix("[]") {
            Some(base) => Self::new(base.to_ascii_lowercase()).into_array(),
            None => Self::new(trimmed.to_ascii_lowercase()),
        }
    }

    /// Get the declared type name
    pub fn to_type_string(&self) -> String {
        if self.is_array {
            format!("{}[]", self.name)
        } else {
            self.name.clone()
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_type_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        let t = TypeRef::from_name("Integer");
        assert_eq!(t.name, "integer");
        assert!(!t.is_array);

        let t = TypeRef::from_name("string[]");
        assert_eq!(t.name, "string");
        assert!(t.is_array);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::datetime().to_string(), "datetime");
        assert_eq!(TypeRef::integer().into_array().to_string(), "integer[]");
    }
}
