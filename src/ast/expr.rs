//! Filter expressions
//!
//! This module defines the recursive [`ExpressionNode`] used by WHERE, HAVING
//! and JOIN ... ON lists, the [`Operand`] a comparison is made against, and
//! the operator alias table.
//!
//! Two extension points let values take part in their own compilation:
//!
//! - [`RawExpression`]: renders itself verbatim (no binding)
//! - [`ExpressionTransformer`]: rewrites `{column, operator, value}` before
//!   the comparison is compiled; the rewritten value counts as converted

use std::fmt;
use std::sync::Arc;

use super::params::Value;
use super::query::Query;
use crate::compiler::{BuildContext, Platform};
use crate::error::{CompileError, CompileResult};

/// Boolean connector placed in front of every node but the first of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Glue {
    #[default]
    And,
    Or,
}

impl Glue {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Canonical comparison operators
///
/// Builders store operators as the token the caller wrote; the compiler
/// resolves them through [`Operator::parse`] so aliases like `:gte` and `>=`
/// compile identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Regex,
    Like,
    NotLike,
    Equal,
    NotEqual,
    In,
    NotIn,
    Between,
    NotBetween,
}

impl Operator {
    /// Resolve an operator token (case-insensitive)
    pub fn parse(token: &str) -> CompileResult<Self> {
        let op = match token.trim().to_ascii_lowercase().as_str() {
            "<" | ":lt" => Self::LessThan,
            "<=" | ":lte" => Self::LessOrEqual,
            ">" | ":gt" => Self::GreaterThan,
            ">=" | ":gte" => Self::GreaterOrEqual,
            "~=" | "=~" | ":regex" => Self::Regex,
            ":like" => Self::Like,
            ":notlike" | "!like" => Self::NotLike,
            "=" | ":eq" => Self::Equal,
            "<>" | "!=" | ":ne" | ":not" => Self::NotEqual,
            "in" | ":in" => Self::In,
            "notin" | "!in" | ":notin" => Self::NotIn,
            "between" | ":between" => Self::Between,
            "!between" | ":notbetween" => Self::NotBetween,
            _ => return Err(CompileError::UnsupportedOperator(token.to_string())),
        };
        Ok(op)
    }

    /// SQL token for operators compiled as `<column> <op> <value>`
    ///
    /// The regex token is platform specific and resolved by the compiler.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::Regex => "REGEXP",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
        }
    }

    /// Negative operators combine the expansion of a list with AND
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::NotLike | Self::NotEqual | Self::NotIn | Self::NotBetween)
    }
}

/// A value rendered verbatim into the SQL text
pub trait RawExpression: fmt::Debug + Send + Sync {
    /// Render the fragment; bindings must not be produced here
    fn build(&self, cx: &mut BuildContext<'_, '_>) -> CompileResult<String>;
}

/// Result of an [`ExpressionTransformer`] rewrite
#[derive(Debug, Clone)]
pub struct Transformed {
    pub column: String,
    pub operator: String,
    pub value: Operand,
}

/// A value that rewrites the comparison it appears in
pub trait ExpressionTransformer: fmt::Debug + Send + Sync {
    fn transform(
        &self,
        column: &str,
        operator: &str,
        platform: &dyn Platform,
    ) -> CompileResult<Transformed>;
}

/// Right-hand side of a comparison
#[derive(Debug, Clone)]
pub enum Operand {
    /// Plain value, bound positionally (lists expand per operator)
    Value(Value),
    /// Nested SELECT, compiled in place with its bindings inlined
    Subquery(Box<Query>),
    /// Pre-rendered fragment
    Expression(Arc<dyn RawExpression>),
    /// Comparison rewriter
    Transformer(Arc<dyn ExpressionTransformer>),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn expression(expr: impl RawExpression + 'static) -> Self {
        Self::Expression(Arc::new(expr))
    }

    pub fn transformer(transformer: impl ExpressionTransformer + 'static) -> Self {
        Self::Transformer(Arc::new(transformer))
    }

    pub fn subquery(query: Query) -> Self {
        Self::Subquery(Box::new(query))
    }
}

macro_rules! operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Self::Value(v.into())
                }
            }
        )*
    };
}

operand_from_value!(
    Value,
    bool,
    i32,
    i64,
    u32,
    f64,
    String,
    &str,
    serde_json::Value,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
);

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(items: Vec<T>) -> Self {
        Self::Value(items.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(opt: Option<T>) -> Self {
        Self::Value(opt.into())
    }
}

impl From<Query> for Operand {
    fn from(query: Query) -> Self {
        Self::subquery(query)
    }
}

impl From<Raw> for Operand {
    fn from(raw: Raw) -> Self {
        Self::expression(raw)
    }
}

impl From<Attribute> for Operand {
    fn from(attr: Attribute) -> Self {
        Self::expression(attr)
    }
}

impl From<Like> for Operand {
    fn from(like: Like) -> Self {
        Self::transformer(like)
    }
}

/// Leaf comparison `<column> <operator> <value>`
#[derive(Debug, Clone)]
pub struct Comparison {
    pub glue: Glue,
    pub column: String,
    pub operator: String,
    pub value: Operand,
    /// The value is already database-ready and skips type conversion
    pub converted: bool,
}

/// One element of a WHERE / HAVING / ON list
#[derive(Debug, Clone)]
pub enum ExpressionNode {
    Comparison(Comparison),
    /// Parenthesized sub-group
    Nested {
        glue: Glue,
        nodes: Vec<ExpressionNode>,
    },
    /// Opaque fragment
    Raw {
        glue: Glue,
        expression: Arc<dyn RawExpression>,
    },
}

impl ExpressionNode {
    /// Create a comparison glued with AND
    pub fn compare(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Operand>,
    ) -> Self {
        Self::Comparison(Comparison {
            glue: Glue::And,
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
            converted: false,
        })
    }

    /// Create a parenthesized group glued with AND
    pub fn nested(nodes: Vec<ExpressionNode>) -> Self {
        Self::Nested {
            glue: Glue::And,
            nodes,
        }
    }

    /// Create a raw SQL fragment glued with AND
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw {
            glue: Glue::And,
            expression: Arc::new(Raw::new(sql)),
        }
    }

    /// Create a fragment from any raw expression
    pub fn expression(expression: impl RawExpression + 'static) -> Self {
        Self::Raw {
            glue: Glue::And,
            expression: Arc::new(expression),
        }
    }

    pub fn glue(&self) -> Glue {
        match self {
            Self::Comparison(c) => c.glue,
            Self::Nested { glue, .. } | Self::Raw { glue, .. } => *glue,
        }
    }

    pub fn with_glue(mut self, new_glue: Glue) -> Self {
        match &mut self {
            Self::Comparison(c) => c.glue = new_glue,
            Self::Nested { glue, .. } | Self::Raw { glue, .. } => *glue = new_glue,
        }
        self
    }

    pub fn or(self) -> Self {
        self.with_glue(Glue::Or)
    }

    /// Mark a comparison value as database-ready
    pub fn converted(mut self) -> Self {
        if let Self::Comparison(c) = &mut self {
            c.converted = true;
        }
        self
    }
}

// =============================================================================
// Built-in expressions
// =============================================================================

/// Verbatim SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(pub String);

impl Raw {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }
}

impl RawExpression for Raw {
    fn build(&self, _cx: &mut BuildContext<'_, '_>) -> CompileResult<String> {
        Ok(self.0.clone())
    }
}

/// Reference to another column, resolved and quoted like the left-hand side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Optional SQL function wrapping the column (e.g. `LOWER`)
    pub function: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: None,
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

impl RawExpression for Attribute {
    fn build(&self, cx: &mut BuildContext<'_, '_>) -> CompileResult<String> {
        let column = cx.column(&self.name)?;
        Ok(match &self.function {
            Some(function) => format!("{function}({column})"),
            None => column,
        })
    }
}

/// LIKE pattern builder
///
/// Wraps one or more search terms in `%` according to the match mode and
/// turns the comparison into `:like` (or `:notlike`). Wildcards inside the
/// terms are escaped unless built with [`Like::pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Like {
    terms: Vec<String>,
    prefix: &'static str,
    suffix: &'static str,
    escape: bool,
    negated: bool,
}

impl Like {
    fn with(terms: Vec<String>, prefix: &'static str, suffix: &'static str, escape: bool) -> Self {
        Self {
            terms,
            prefix,
            suffix,
            escape,
            negated: false,
        }
    }

    pub fn starts_with(term: impl Into<String>) -> Self {
        Self::with(vec![term.into()], "", "%", true)
    }

    pub fn ends_with(term: impl Into<String>) -> Self {
        Self::with(vec![term.into()], "%", "", true)
    }

    pub fn contains(term: impl Into<String>) -> Self {
        Self::with(vec![term.into()], "%", "%", true)
    }

    /// Match any of the terms (OR-expanded)
    pub fn contains_any(terms: Vec<String>) -> Self {
        Self::with(terms, "%", "%", true)
    }

    /// Use the term as a pattern, wildcards included
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::with(vec![pattern.into()], "", "", false)
    }

    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }

    fn escape_term(term: &str) -> String {
        let mut out = String::with_capacity(term.len());
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn build_pattern(&self, term: &str) -> String {
        let body = if self.escape {
            Self::escape_term(term)
        } else {
            term.to_string()
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }
}

impl ExpressionTransformer for Like {
    fn transform(
        &self,
        column: &str,
        operator: &str,
        _platform: &dyn Platform,
    ) -> CompileResult<Transformed> {
        // A negative operator on the comparison negates the pattern too
        let negated = self.negated ^ Operator::parse(operator).map_or(false, |op| op.is_negative());
        let mut patterns: Vec<Value> = self
            .terms
            .iter()
            .map(|t| Value::String(self.build_pattern(t)))
            .collect();

        let value = if patterns.len() == 1 {
            patterns.remove(0)
        } else {
            Value::Array(patterns)
        };

        Ok(Transformed {
            column: column.to_string(),
            operator: if negated { ":notlike" } else { ":like" }.to_string(),
            value: Operand::Value(value),
        })
    }
}
