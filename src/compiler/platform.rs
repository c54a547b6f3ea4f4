//! Dialect-specific SQL fragments
//!
//! The compiler only delegates to a [`Platform`] at the points where vendors
//! disagree: identifier quoting, literal quoting, reserved keywords,
//! aggregate and predicate spelling, LIMIT/OFFSET and row locks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{AggregateFunction, Scalar};

/// SQL grammar of a database vendor
pub trait Platform: fmt::Debug + Send + Sync {
    /// Platform name, compared across connections for cross-connection sub-queries
    fn name(&self) -> &str;

    fn quote_identifier(&self, name: &str) -> String;

    /// Quote a literal for display purposes
    fn quote_literal(&self, value: &Scalar) -> String;

    /// Whether `word` is a keyword of this grammar (case-insensitive)
    fn is_keyword(&self, word: &str) -> bool;

    fn count_expression(&self, column: &str) -> String {
        format!("COUNT({column})")
    }

    fn sum_expression(&self, column: &str) -> String {
        format!("SUM({column})")
    }

    fn avg_expression(&self, column: &str) -> String {
        format!("AVG({column})")
    }

    fn min_expression(&self, column: &str) -> String {
        format!("MIN({column})")
    }

    fn max_expression(&self, column: &str) -> String {
        format!("MAX({column})")
    }

    fn aggregate_expression(&self, function: AggregateFunction, column: &str) -> String {
        match function {
            AggregateFunction::Count => self.count_expression(column),
            AggregateFunction::Sum => self.sum_expression(column),
            AggregateFunction::Avg => self.avg_expression(column),
            AggregateFunction::Min => self.min_expression(column),
            AggregateFunction::Max => self.max_expression(column),
        }
    }

    fn is_null_expression(&self, expression: &str) -> String {
        format!("{expression} IS NULL")
    }

    fn is_not_null_expression(&self, expression: &str) -> String {
        format!("{expression} IS NOT NULL")
    }

    fn between_expression(&self, expression: &str, low: &str, high: &str) -> String {
        format!("{expression} BETWEEN {low} AND {high}")
    }

    fn not_expression(&self, expression: &str) -> String {
        format!("NOT ({expression})")
    }

    fn regex_operator(&self) -> &str {
        "REGEXP"
    }

    /// Apply LIMIT/OFFSET to an assembled SELECT
    fn modify_limit_query(&self, sql: String, limit: Option<u64>, offset: Option<u64>) -> String;

    /// Exclusive row lock suffix (empty when unsupported)
    fn write_lock_sql(&self) -> &str;

    /// Shared row lock suffix (empty when unsupported)
    fn read_lock_sql(&self) -> &str;

    /// Values part of an INSERT without columns
    fn default_values_sql(&self) -> &str {
        "DEFAULT VALUES"
    }
}

/// Built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgresql",
        }
    }

    /// Parse a dialect name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "postgres" | "postgresql" | "pgsql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

// Only the words the compiler gates on; full reserved-word lists are not needed here
const MYSQL_KEYWORDS: &[&str] = &["DISTINCT", "IGNORE", "REPLACE", "REGEXP", "LIMIT", "OFFSET"];
const SQLITE_KEYWORDS: &[&str] = &["DISTINCT", "IGNORE", "REPLACE", "REGEXP", "LIMIT", "OFFSET"];
const POSTGRES_KEYWORDS: &[&str] = &["DISTINCT", "LIMIT", "OFFSET"];

/// [`Platform`] implementation for the built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    dialect: Dialect,
}

impl Grammar {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn identifier_quote(&self) -> char {
        match self.dialect {
            Dialect::MySql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }
}

impl Platform for Grammar {
    fn name(&self) -> &str {
        self.dialect.as_str()
    }

    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let mut output = String::with_capacity(name.len() + 2);
        output.push(quote);
        // Escape embedded quotes by doubling them
        for c in name.chars() {
            if c == quote {
                output.push(quote);
            }
            output.push(c);
        }
        output.push(quote);
        output
    }

    fn quote_literal(&self, value: &Scalar) -> String {
        match value {
            Scalar::Null => "NULL".to_string(),
            Scalar::Bool(b) => match self.dialect {
                Dialect::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
                Dialect::MySql | Dialect::Sqlite => if *b { "1" } else { "0" }.to_string(),
            },
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::String(s) => {
                let mut output = String::with_capacity(s.len() + 2);
                output.push('\'');
                for c in s.chars() {
                    match c {
                        '\'' => output.push_str("''"),
                        '\\' if self.dialect == Dialect::MySql => output.push_str("\\\\"),
                        _ => output.push(c),
                    }
                }
                output.push('\'');
                output
            }
            Scalar::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                match self.dialect {
                    Dialect::Postgres => format!("'\\x{hex}'"),
                    Dialect::MySql | Dialect::Sqlite => format!("X'{hex}'"),
                }
            }
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        let keywords = match self.dialect {
            Dialect::MySql => MYSQL_KEYWORDS,
            Dialect::Sqlite => SQLITE_KEYWORDS,
            Dialect::Postgres => POSTGRES_KEYWORDS,
        };
        keywords.iter().any(|k| k.eq_ignore_ascii_case(word))
    }

    fn regex_operator(&self) -> &str {
        match self.dialect {
            Dialect::Postgres => "~",
            Dialect::MySql | Dialect::Sqlite => "REGEXP",
        }
    }

    fn modify_limit_query(&self, mut sql: String, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => {}
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (None, Some(offset)) => match self.dialect {
                // MySQL has no OFFSET without LIMIT: use the largest row count
                Dialect::MySql => {
                    sql.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX));
                }
                Dialect::Sqlite => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                Dialect::Postgres => sql.push_str(&format!(" OFFSET {offset}")),
            },
        }
        sql
    }

    fn write_lock_sql(&self) -> &str {
        match self.dialect {
            Dialect::MySql | Dialect::Postgres => "FOR UPDATE",
            Dialect::Sqlite => "",
        }
    }

    fn read_lock_sql(&self) -> &str {
        match self.dialect {
            Dialect::MySql => "LOCK IN SHARE MODE",
            Dialect::Postgres => "FOR SHARE",
            Dialect::Sqlite => "",
        }
    }

    fn default_values_sql(&self) -> &str {
        match self.dialect {
            Dialect::MySql => "() VALUES ()",
            Dialect::Sqlite | Dialect::Postgres => "DEFAULT VALUES",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        let mysql = Grammar::new(Dialect::MySql);
        assert_eq!(mysql.quote_identifier("user`name"), "`user``name`");

        let pg = Grammar::new(Dialect::Postgres);
        assert_eq!(pg.quote_identifier("user\"name"), "\"user\"\"name\"");
    }

    #[test]
    fn test_literal_quoting() {
        let mysql = Grammar::new(Dialect::MySql);
        assert_eq!(mysql.quote_literal(&Scalar::from("it's")), "'it''s'");
        assert_eq!(mysql.quote_literal(&Scalar::Bool(true)), "1");
        assert_eq!(mysql.quote_literal(&Scalar::Null), "NULL");

        let pg = Grammar::new(Dialect::Postgres);
        assert_eq!(pg.quote_literal(&Scalar::Bool(false)), "FALSE");
        assert_eq!(pg.quote_literal(&Scalar::Bytes(vec![0xab, 0x01])), "'\\xab01'");
    }

    #[test]
    fn test_limit_rewrite() {
        let sqlite = Grammar::new(Dialect::Sqlite);
        assert_eq!(
            sqlite.modify_limit_query("SELECT *".into(), Some(10), Some(20)),
            "SELECT * LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            sqlite.modify_limit_query("SELECT *".into(), None, Some(5)),
            "SELECT * LIMIT -1 OFFSET 5"
        );

        let pg = Grammar::new(Dialect::Postgres);
        assert_eq!(
            pg.modify_limit_query("SELECT *".into(), None, Some(5)),
            "SELECT * OFFSET 5"
        );
    }

    #[test]
    fn test_keywords() {
        assert!(Grammar::new(Dialect::MySql).is_keyword("ignore"));
        assert!(Grammar::new(Dialect::Sqlite).is_keyword("REPLACE"));
        assert!(!Grammar::new(Dialect::Postgres).is_keyword("IGNORE"));
    }

    #[test]
    fn test_dialect_from_name() {
        assert_eq!(Dialect::from_name("PostgreSQL"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("mariadb"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_name("oracle"), None);
    }
}
