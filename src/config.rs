//! Compiler configuration
//!
//! A [`CompilerConfig`] describes the connection a [`SqlCompiler`] is bound
//! to. It can be built in code, read from `QUERY_COMPILER_*` environment
//! variables or deserialized from JSON.
//!
//! [`SqlCompiler`]: crate::compiler::SqlCompiler

use std::env;

use serde::{Deserialize, Serialize};

use crate::compiler::Dialect;
use crate::error::{CompileError, CompileResult};
use crate::telemetry::{LogLevel, LOG_LEVEL_ENV};

pub const DIALECT_ENV: &str = "QUERY_COMPILER_DIALECT";
pub const CONNECTION_ENV: &str = "QUERY_COMPILER_CONNECTION";
pub const DATABASE_ENV: &str = "QUERY_COMPILER_DATABASE";
pub const QUOTE_IDENTIFIERS_ENV: &str = "QUERY_COMPILER_QUOTE_IDENTIFIERS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Connection name, compared against sub-query connections
    pub connection: String,
    /// Database (schema) name of the connection
    pub database: Option<String>,
    pub dialect: Dialect,
    /// Identifier quoting of queries created through the compiler
    pub quote_identifiers: bool,
    pub log_level: LogLevel,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            connection: "default".to_string(),
            database: None,
            dialect: Dialect::MySql,
            quote_identifiers: false,
            log_level: LogLevel::Off,
        }
    }
}

fn env_bool_or_default(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_dialect(name: &str) -> CompileResult<Dialect> {
    Dialect::from_name(name.trim()).ok_or_else(|| {
        tracing::warn!(dialect = name, "unknown SQL dialect");
        CompileError::UnknownDialect(name.to_string())
    })
}

impl CompilerConfig {
    /// Read the configuration from the environment, defaulting what is unset
    ///
    /// An unrecognized dialect name is an error.
    pub fn from_env() -> CompileResult<Self> {
        let defaults = Self::default();
        let dialect = match env::var(DIALECT_ENV) {
            Ok(name) if !name.trim().is_empty() => parse_dialect(&name)?,
            _ => defaults.dialect,
        };
        Ok(Self {
            connection: env::var(CONNECTION_ENV).unwrap_or(defaults.connection),
            database: env::var(DATABASE_ENV).ok().filter(|db| !db.is_empty()),
            dialect,
            quote_identifiers: env_bool_or_default(
                QUOTE_IDENTIFIERS_ENV,
                defaults.quote_identifiers,
            ),
            log_level: env::var(LOG_LEVEL_ENV)
                .map(|level| LogLevel::parse(&level))
                .unwrap_or(defaults.log_level),
        })
    }

    pub fn from_json(json: &str) -> CompileResult<Self> {
        serde_json::from_str(json).map_err(CompileError::external)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.connection, "default");
        assert_eq!(config.dialect, Dialect::MySql);
        assert!(!config.quote_identifiers);
        assert_eq!(config.log_level, LogLevel::Off);
    }

    #[test]
    fn test_from_json() {
        let config = CompilerConfig::from_json(
            r#"{"connection": "reporting", "dialect": "postgres", "quote_identifiers": true}"#,
        )
        .unwrap();
        assert_eq!(config.connection, "reporting");
        assert_eq!(config.dialect, Dialect::Postgres);
        assert!(config.quote_identifiers);
        // Missing fields keep their defaults
        assert_eq!(config.database, None);
        assert_eq!(config.log_level, LogLevel::Off);
    }

    #[test]
    fn test_from_json_rejects_unknown_dialect() {
        assert!(matches!(
            CompilerConfig::from_json(r#"{"dialect": "oracle"}"#),
            Err(CompileError::External(_))
        ));
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!(parse_dialect(" PostgreSQL ").unwrap(), Dialect::Postgres);
        assert_eq!(parse_dialect("sqlite3").unwrap(), Dialect::Sqlite);
        match parse_dialect("postgress") {
            Err(CompileError::UnknownDialect(name)) => assert_eq!(name, "postgress"),
            other => panic!("Expected UnknownDialect, got {other:?}"),
        }
    }

    #[test]
    fn test_from_env_rejects_unknown_dialect() {
        // Only test touching the dialect variable
        env::set_var(DIALECT_ENV, "postgress");
        let typo = CompilerConfig::from_env();
        env::set_var(DIALECT_ENV, "sqlite");
        let valid = CompilerConfig::from_env();
        env::remove_var(DIALECT_ENV);

        assert!(matches!(typo, Err(CompileError::UnknownDialect(_))));
        assert_eq!(valid.unwrap().dialect, Dialect::Sqlite);
    }

    #[test]
    fn test_round_trip() {
        let config = CompilerConfig::default()
            .with_dialect(Dialect::Sqlite)
            .with_database("main");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CompilerConfig::from_json(&json).unwrap(), config);
    }
}
