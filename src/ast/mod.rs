//! Abstract Statement module
//!
//! This module provides the type-safe input of the compiler: what the query
//! builder populates before anything is rendered to SQL.
//!
//! # Architecture
//!
//! - [`stmt`]: statements (SELECT, INSERT, UPDATE, DELETE) and their clauses
//! - [`expr`]: filter expressions, operands and operator aliases
//! - [`params`]: application values and database-ready bindings
//! - [`types`]: type references resolved by the type registry
//! - [`query`]: the query object owning a statement and its compiler state
//!
//! # Example
//!
//! ```rust,ignore
//! use orm_query_compiler::ast::*;
//!
//! let mut query = Query::select();
//! query
//!     .from("users")
//!     .and_where("age", ">=", 18)
//!     .and_where("status", "in", vec!["active", "pending"]);
//!
//! // SELECT users.* FROM users WHERE age >= ? AND status IN (?,?)
//! ```

mod expr;
mod params;
mod query;
mod stmt;
mod types;

pub use expr::*;
pub use params::*;
pub use query::*;
pub use stmt::*;
pub use types::*;
