//! Error types for query compilation
//!
//! Every failure raised while turning a [`Query`](crate::ast::Query) into SQL
//! is surfaced as a [`CompileError`]. The compiler never substitutes a fallback
//! fragment: either the whole statement compiles or the caller gets a typed
//! error naming what to fix.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the compiler
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// The four statement kinds the compiler knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy of the compiler
///
/// - malformed statements ([`CompileError::MissingTable`],
///   [`CompileError::NothingToUpdate`], [`CompileError::StatementKind`])
/// - expression failures ([`CompileError::UnsupportedOperator`],
///   [`CompileError::InvalidValue`])
/// - type conversion failures ([`CompileError::UnknownType`],
///   [`CompileError::Conversion`])
/// - configuration failures ([`CompileError::UnknownDialect`])
/// - collaborator failures, passed through untouched ([`CompileError::External`])
#[derive(Debug, Error)]
pub enum CompileError {
    /// INSERT/UPDATE/DELETE without a target table
    #[error("{kind} table name is missing")]
    MissingTable { kind: StatementKind },

    /// An expression node used an operator outside the recognized table
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// The operator cannot be applied to the given value shape
    #[error("invalid value for operator '{operator}': {reason}")]
    InvalidValue { operator: String, reason: String },

    /// UPDATE statement without any assignment
    #[error("update statement has no values to set")]
    NothingToUpdate,

    /// The query holds a different statement than the entry point expects
    #[error("cannot compile a {found} statement as {expected}")]
    StatementKind {
        expected: StatementKind,
        found: StatementKind,
    },

    /// A type reference that is not registered
    #[error("type '{0}' is not registered")]
    UnknownType(String),

    /// A registered type refused the value
    #[error("cannot convert value to '{ty}': {reason}")]
    Conversion { ty: String, reason: String },

    /// A sub-query bound to a connection whose platform differs from the compiling one
    #[error("sub-query uses platform '{found}' but the compiling connection uses '{expected}'")]
    IncompatibleConnection { expected: String, found: String },

    /// A dialect name that matches no built-in grammar
    #[error("unknown SQL dialect '{0}'")]
    UnknownDialect(String),

    /// Error raised by an injected collaborator (preprocessor, type, expression)
    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CompileError {
    pub fn invalid_value(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    pub fn conversion(ty: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            ty: ty.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a collaborator error so it propagates unchanged
    pub fn external(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::External(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_names_the_kind() {
        let err = CompileError::MissingTable {
            kind: StatementKind::Insert,
        };
        assert_eq!(err.to_string(), "insert table name is missing");

        let err = CompileError::MissingTable {
            kind: StatementKind::Delete,
        };
        assert_eq!(err.to_string(), "delete table name is missing");
    }

    #[test]
    fn test_unsupported_operator_names_the_token() {
        let err = CompileError::UnsupportedOperator(":foo".into());
        assert!(err.to_string().contains(":foo"));
    }

    #[test]
    fn test_external_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "registry offline");
        let err = CompileError::external(io);
        assert_eq!(err.to_string(), "registry offline");
    }
}
