//! Telemetry and logging for SQL compilation
//!
//! This module provides configurable logging for debugging SQL generation.
//! Events are emitted through `tracing`; installing a subscriber is left to
//! the application.
//!
//! # Configuration
//!
//! Set the `QUERY_COMPILER_LOG_LEVEL` environment variable to one of:
//! - `off` - No logging (default)
//! - `basic` - Log SQL and timing only
//! - `detailed` - Log full SQL and every binding
//! - `debug` - Log everything including statement dumps
//!
//! # Example
//!
//! ```bash
//! export QUERY_COMPILER_LOG_LEVEL=detailed
//! ```

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ast::Scalar;
use crate::error::StatementKind;

pub const LOG_LEVEL_ENV: &str = "QUERY_COMPILER_LOG_LEVEL";

const MAX_BASIC_SQL_LEN: usize = 1000;

/// Log level for compiler telemetry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging
    #[default]
    Off = 0,
    /// Basic info: SQL and timing
    Basic = 1,
    /// Detailed: full SQL and bindings
    Detailed = 2,
    /// Debug: everything including statement dumps
    Debug = 3,
}

impl LogLevel {
    /// Parse from string; unknown values turn logging off
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "basic" => Self::Basic,
            "detailed" => Self::Detailed,
            "debug" => Self::Debug,
            _ => Self::Off,
        }
    }
}

/// Get current log level from environment
pub fn get_log_level() -> LogLevel {
    std::env::var(LOG_LEVEL_ENV)
        .map(|s| LogLevel::parse(&s))
        .unwrap_or(LogLevel::Off)
}

fn truncate(sql: &str) -> String {
    if sql.len() <= MAX_BASIC_SQL_LEN {
        return sql.to_string();
    }
    let mut end = MAX_BASIC_SQL_LEN;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Log a compiled statement
pub fn log_compiled(level: LogLevel, kind: StatementKind, sql: &str, bindings: &[Scalar]) {
    if level < LogLevel::Basic {
        return;
    }

    let sql_display = if level >= LogLevel::Detailed {
        sql.to_string()
    } else {
        truncate(sql)
    };

    tracing::info!(kind = %kind, bindings = bindings.len(), "compiled SQL: {}", sql_display);

    if level >= LogLevel::Detailed {
        for (index, binding) in bindings.iter().enumerate() {
            tracing::info!(kind = %kind, "binding {}: {}", index + 1, binding.to_display_string());
        }
    }
}

/// Dump a statement before compilation
pub fn log_statement(level: LogLevel, kind: StatementKind, statement: &dyn fmt::Debug) {
    if level < LogLevel::Debug {
        return;
    }
    tracing::debug!(kind = %kind, "compiling statement: {:#?}", statement);
}

/// Log a compile error
pub fn log_error(level: LogLevel, kind: StatementKind, error: &str) {
    if level < LogLevel::Basic {
        return;
    }
    tracing::warn!(kind = %kind, "compile failed: {}", error);
}

fn log_result(level: LogLevel, kind: StatementKind, start: Instant, success: bool) {
    if level < LogLevel::Basic {
        return;
    }

    let duration_us = start.elapsed().as_micros();
    let status = if success { "completed" } else { "failed" };

    tracing::info!(kind = %kind, "compilation {} in {}us", status, duration_us);
}

/// A guard that logs compile timing on drop
pub struct CompileTimer {
    start: Instant,
    kind: StatementKind,
    level: LogLevel,
    logged: bool,
}

impl CompileTimer {
    /// Start a new compile timer
    pub fn new(kind: StatementKind, level: LogLevel) -> Self {
        Self {
            start: Instant::now(),
            kind,
            level,
            logged: false,
        }
    }

    /// Get elapsed time in microseconds
    pub fn elapsed_us(&self) -> u128 {
        self.start.elapsed().as_micros()
    }

    /// Mark as successful and log
    pub fn success(mut self, sql: &str, bindings: &[Scalar]) {
        self.logged = true;
        log_compiled(self.level, self.kind, sql, bindings);
        log_result(self.level, self.kind, self.start, true);
    }

    /// Mark as failed and log
    pub fn failure(mut self, error: &str) {
        self.logged = true;
        log_error(self.level, self.kind, error);
        log_result(self.level, self.kind, self.start, false);
    }
}

impl Drop for CompileTimer {
    fn drop(&mut self) {
        // Implicit failure
        if !self.logged {
            log_result(self.level, self.kind, self.start, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("off"), LogLevel::Off);
        assert_eq!(LogLevel::parse("basic"), LogLevel::Basic);
        assert_eq!(LogLevel::parse("detailed"), LogLevel::Detailed);
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("BASIC"), LogLevel::Basic);
        assert_eq!(LogLevel::parse("invalid"), LogLevel::Off);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Basic);
        assert!(LogLevel::Basic < LogLevel::Detailed);
        assert!(LogLevel::Detailed < LogLevel::Debug);
    }

    #[test]
    fn test_log_level_serde() {
        let level: LogLevel = serde_json::from_str("\"detailed\"").unwrap();
        assert_eq!(level, LogLevel::Detailed);
        assert_eq!(serde_json::to_string(&LogLevel::Off).unwrap(), "\"off\"");
    }

    #[test]
    fn test_truncate() {
        let long = "x".repeat(MAX_BASIC_SQL_LEN + 10);
        let shown = truncate(&long);
        assert_eq!(shown.len(), MAX_BASIC_SQL_LEN + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(truncate("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_compile_timer() {
        let timer = CompileTimer::new(StatementKind::Select, LogLevel::Off);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(timer.elapsed_us() >= 2000);
        timer.success("SELECT 1", &[]);
    }
}
