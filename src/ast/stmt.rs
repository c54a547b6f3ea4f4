//! SQL statement types
//!
//! This module defines the Abstract Statement handed to the compiler: one
//! strongly-typed struct per statement kind, wrapped in [`Statement`].

use std::sync::Arc;

use super::expr::{ExpressionNode, Operand, RawExpression};
use super::query::Query;
use super::types::TypeRef;
use crate::error::StatementKind;

/// Top-level statement
#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Select(_) => StatementKind::Select,
            Self::Insert(_) => StatementKind::Insert,
            Self::Update(_) => StatementKind::Update,
            Self::Delete(_) => StatementKind::Delete,
        }
    }
}

/// Source of rows in FROM / JOIN / INSERT / UPDATE / DELETE
#[derive(Debug, Clone)]
pub enum TableSource {
    /// Physical (or logical, before preprocessing) table name
    Name(String),
    /// Derived table
    Subquery(Box<Query>),
}

/// A table with its optional alias
#[derive(Debug, Clone)]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
}

impl TableRef {
    /// Create a simple table reference
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            source: TableSource::Name(name.into()),
            alias: None,
        }
    }

    /// Create a derived table from a sub-query
    pub fn subquery(query: Query, alias: impl Into<String>) -> Self {
        Self {
            source: TableSource::Subquery(Box::new(query)),
            alias: Some(alias.into()),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Table name when the source is not a sub-query
    pub fn name(&self) -> Option<&str> {
        match &self.source {
            TableSource::Name(name) => Some(name),
            TableSource::Subquery(_) => None,
        }
    }

    /// Key used to deduplicate FROM/JOIN entries: alias first, then name
    pub fn dedup_key(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.name())
    }
}

/// Projected column expression
#[derive(Debug, Clone)]
pub enum Column {
    /// Field name, resolved by the preprocessor
    Name(String),
    /// Pre-rendered expression
    Expression(Arc<dyn RawExpression>),
}

/// A column in the SELECT list
#[derive(Debug, Clone)]
pub struct Projection {
    pub column: Column,
    pub alias: Option<String>,
}

impl Projection {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            column: Column::Name(name.into()),
            alias: None,
        }
    }

    pub fn column_as(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: Column::Name(name.into()),
            alias: Some(alias.into()),
        }
    }

    pub fn expression(expr: impl RawExpression + 'static, alias: Option<String>) -> Self {
        Self {
            column: Column::Expression(Arc::new(expr)),
            alias,
        }
    }

    /// Name exposed by the projection (alias, or the column name)
    pub fn output_name(&self) -> Option<&str> {
        match (&self.alias, &self.column) {
            (Some(alias), _) => Some(alias),
            (None, Column::Name(name)) => Some(name),
            (None, Column::Expression(_)) => None,
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Single aggregate projection `<FUNC>(<column>) AS aggregate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: String,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
        }
    }

    pub fn count() -> Self {
        Self::new(AggregateFunction::Count, "*")
    }

    pub fn is_wildcard(&self) -> bool {
        self.column == "*"
    }
}

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// JOIN clause
#[derive(Debug, Clone)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Vec<ExpressionNode>,
}

impl Join {
    pub fn new(join_type: JoinType, table: TableRef, on: Vec<ExpressionNode>) -> Self {
        Self {
            join_type,
            table,
            on,
        }
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// ORDER BY component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub sort: String,
    pub order: OrderDirection,
}

/// Row lock requested by a SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Exclusive (`FOR UPDATE`)
    Write,
    /// Shared lock
    Read,
}

/// SELECT statement
#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub columns: Vec<Projection>,
    pub aggregate: Option<Aggregate>,
    pub distinct: bool,
    pub tables: Vec<TableRef>,
    pub joins: Vec<Join>,
    pub wheres: Vec<ExpressionNode>,
    pub groups: Vec<String>,
    pub having: Vec<ExpressionNode>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<LockMode>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// DISTINCT aggregate over `*`, which needs a derived table
    pub fn is_complex_aggregate(&self) -> bool {
        self.distinct && self.aggregate.as_ref().is_some_and(Aggregate::is_wildcard)
    }
}

/// Column assignment of INSERT / UPDATE
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: Operand,
    /// Explicit type, overriding the type the preprocessor resolves
    pub ty: Option<TypeRef>,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            ty: None,
        }
    }

    pub fn typed(column: impl Into<String>, value: impl Into<Operand>, ty: TypeRef) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            ty: Some(ty),
        }
    }
}

/// Values of an INSERT
#[derive(Debug, Clone)]
pub enum InsertValues {
    /// Explicit column/value pairs
    Data(Vec<Assignment>),
    /// `INSERT INTO ... SELECT ...`
    Select(Box<Query>),
}

impl Default for InsertValues {
    fn default() -> Self {
        Self::Data(Vec::new())
    }
}

/// INSERT statement
#[derive(Debug, Clone, Default)]
pub struct InsertStatement {
    pub table: Option<TableRef>,
    pub values: InsertValues,
    /// Skip rows that violate a unique constraint
    pub ignore: bool,
    /// Replace rows that violate a unique constraint
    pub replace: bool,
}

/// UPDATE statement
#[derive(Debug, Clone, Default)]
pub struct UpdateStatement {
    pub table: Option<TableRef>,
    pub values: Vec<Assignment>,
    pub wheres: Vec<ExpressionNode>,
}

/// DELETE statement
#[derive(Debug, Clone, Default)]
pub struct DeleteStatement {
    pub table: Option<TableRef>,
    pub wheres: Vec<ExpressionNode>,
}
