//! Query compilation engine of an ORM
//!
//! Turns builder-populated statements (SELECT, INSERT, UPDATE, DELETE) into
//! SQL text with positional `?` placeholders plus the ordered bindings.
//!
//! - [`ast`]: the statement model the query builder fills in
//! - [`compiler`]: the compiler and its collaborators (platform, type
//!   registry, preprocessor)
//! - [`config`]: compiler configuration from code, environment or JSON
//! - [`telemetry`]: `tracing`-based logging of compiled statements
//!
//! # Example
//!
//! ```rust
//! use orm_query_compiler::ast::Query;
//! use orm_query_compiler::compiler::{Dialect, SqlCompiler};
//!
//! let compiler = SqlCompiler::for_dialect(Dialect::MySql);
//! let mut query = Query::select();
//! query
//!     .from("users")
//!     .columns(["id", "name"])
//!     .and_where("age", ">=", 18)
//!     .and_where("status", "in", vec!["active", "pending"]);
//!
//! let compiled = compiler.compile(&mut query).unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     "SELECT id, name FROM users WHERE age >= ? AND status IN (?,?)"
//! );
//! assert_eq!(compiled.bindings.len(), 3);
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod telemetry;

pub use compiler::{CompiledStatement, SqlCompiler};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult};
