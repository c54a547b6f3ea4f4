//! SQL compiler
//!
//! This module turns a [`Query`] into SQL text with positional `?`
//! placeholders and the matching ordered binding list.
//!
//! # Architecture
//!
//! - [`state`]: per-query memoization of clause fragments and binding segments
//! - [`platform`]: dialect-specific fragments behind the [`Platform`] trait
//! - [`convert`]: the [`TypeRegistry`] turning values into bindable scalars
//! - [`preprocessor`]: the [`Preprocessor`] hook resolving logical names
//! - `expression`: the recursive expression compiler
//! - `clauses`: SELECT clause compilers and INSERT/UPDATE/DELETE assembly
//!
//! The [`SqlCompiler`] holds no per-query mutable state. Everything a compile
//! call mutates lives on the query, so one compiler can serve many queries.

mod clauses;
mod convert;
mod expression;
mod platform;
mod preprocessor;
mod state;


pub use convert::*;
pub use platform::*;
pub use preprocessor::*;
pub use state::*;

use std::fmt;
use std::sync::Arc;

use crate::ast::{ConnectionRef, ExpressionNode, Query, Scalar, Statement, Value};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult, StatementKind};
use crate::telemetry::{self, get_log_level, CompileTimer, LogLevel};

/// SQL text plus its positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub bindings: Vec<Scalar>,
}

/// Connection-scoped compiler service
#[derive(Clone)]
pub struct SqlCompiler {
    connection: ConnectionRef,
    platform: Arc<dyn Platform>,
    types: Arc<dyn TypeRegistry>,
    preprocessors: PreprocessorFactory,
    quote_identifiers: bool,
    log_level: LogLevel,
}

impl fmt::Debug for SqlCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlCompiler")
            .field("connection", &self.connection)
            .field("platform", &self.platform)
            .field("types", &self.types)
            .field("quote_identifiers", &self.quote_identifiers)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

fn default_preprocessors() -> PreprocessorFactory {
    Arc::new(|| Box::new(DefaultPreprocessor::new()) as Box<dyn Preprocessor>)
}

/// Quote each dot-separated segment except `*`
fn quote_name(platform: &dyn Platform, quote: bool, name: &str) -> String {
    if !quote {
        return name.to_string();
    }
    name.split('.')
        .map(|segment| {
            if segment == "*" {
                segment.to_string()
            } else {
                platform.quote_identifier(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

impl SqlCompiler {
    /// Create a compiler with the built-in types and the passthrough preprocessor
    pub fn new(connection: ConnectionRef, platform: Arc<dyn Platform>) -> Self {
        Self {
            connection,
            platform,
            types: Arc::new(TypeMap::with_builtins()),
            preprocessors: default_preprocessors(),
            quote_identifiers: false,
            log_level: get_log_level(),
        }
    }

    /// Create a compiler for a built-in dialect on a connection named `default`
    pub fn for_dialect(dialect: Dialect) -> Self {
        let grammar = Grammar::new(dialect);
        Self::new(
            ConnectionRef::new("default", grammar.name()),
            Arc::new(grammar),
        )
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        let grammar = Grammar::new(config.dialect);
        let mut connection = ConnectionRef::new(&config.connection, grammar.name());
        if let Some(database) = &config.database {
            connection = connection.with_database(database);
        }

        tracing::debug!(
            connection = %connection.name,
            dialect = config.dialect.as_str(),
            "creating SQL compiler"
        );

        Self::new(connection, Arc::new(grammar))
            .with_quote_identifiers(config.quote_identifiers)
            .with_log_level(config.log_level)
    }

    pub fn with_types(mut self, types: Arc<dyn TypeRegistry>) -> Self {
        self.types = types;
        self
    }

    pub fn with_preprocessor(mut self, factory: PreprocessorFactory) -> Self {
        self.preprocessors = factory;
        self
    }

    /// Use a closure creating one preprocessor per compile call
    pub fn with_preprocessor_fn<F, P>(self, create: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Preprocessor + 'static,
    {
        self.with_preprocessor(Arc::new(move || Box::new(create()) as Box<dyn Preprocessor>))
    }

    /// Default identifier quoting of queries created by [`SqlCompiler::query`]
    pub fn with_quote_identifiers(mut self, quote: bool) -> Self {
        self.quote_identifiers = quote;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn connection(&self) -> &ConnectionRef {
        &self.connection
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn types(&self) -> &dyn TypeRegistry {
        self.types.as_ref()
    }

    /// Create a query bound to this compiler's connection
    pub fn query(&self, statement: Statement) -> Query {
        let mut query = Query::new(statement);
        query
            .on_connection(self.connection.clone())
            .use_quote_identifier(self.quote_identifiers);
        query
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    pub fn compile_select(&self, query: &mut Query) -> CompileResult<String> {
        self.compile_select_in(query, None)
    }

    pub fn compile_insert(&self, query: &mut Query) -> CompileResult<String> {
        self.run(StatementKind::Insert, query, |compiler, query| {
            let Query {
                statement,
                state,
                quote_identifiers,
                ..
            } = query;
            let insert = match statement {
                Statement::Insert(insert) => insert,
                other => return Err(kind_mismatch(StatementKind::Insert, other)),
            };
            let mut scope = CompileScope::new(compiler, state, *quote_identifiers, None);
            let working = scope.preprocessor.for_insert(insert)?;
            telemetry::log_statement(compiler.log_level, StatementKind::Insert, &working);
            scope.compile_insert(working)
        })
    }

    pub fn compile_update(&self, query: &mut Query) -> CompileResult<String> {
        self.run(StatementKind::Update, query, |compiler, query| {
            let Query {
                statement,
                state,
                quote_identifiers,
                ..
            } = query;
            let update = match statement {
                Statement::Update(update) => update,
                other => return Err(kind_mismatch(StatementKind::Update, other)),
            };
            let mut scope = CompileScope::new(compiler, state, *quote_identifiers, None);
            let working = scope.preprocessor.for_update(update)?;
            telemetry::log_statement(compiler.log_level, StatementKind::Update, &working);
            scope.compile_update(working)
        })
    }

    pub fn compile_delete(&self, query: &mut Query) -> CompileResult<String> {
        self.run(StatementKind::Delete, query, |compiler, query| {
            let Query {
                statement,
                state,
                quote_identifiers,
                ..
            } = query;
            let delete = match statement {
                Statement::Delete(delete) => delete,
                other => return Err(kind_mismatch(StatementKind::Delete, other)),
            };
            let mut scope = CompileScope::new(compiler, state, *quote_identifiers, None);
            let working = scope.preprocessor.for_delete(delete)?;
            telemetry::log_statement(compiler.log_level, StatementKind::Delete, &working);
            scope.compile_delete(working)
        })
    }

    /// Compile whatever statement the query holds
    pub fn compile(&self, query: &mut Query) -> CompileResult<CompiledStatement> {
        let sql = match query.statement.kind() {
            StatementKind::Select => self.compile_select(query)?,
            StatementKind::Insert => self.compile_insert(query)?,
            StatementKind::Update => self.compile_update(query)?,
            StatementKind::Delete => self.compile_delete(query)?,
        };
        Ok(CompiledStatement {
            sql,
            bindings: self.bindings(query),
        })
    }

    /// Bindings of the last compilation, in placeholder order
    pub fn bindings(&self, query: &Query) -> Vec<Scalar> {
        query.state.bindings()
    }

    /// Quote an identifier the way the query's compilation would
    pub fn quote_identifier(&self, query: &Query, name: &str) -> String {
        quote_name(self.platform(), query.quote_identifiers, name)
    }

    /// Render a value as a literal, for display only
    pub fn quote(&self, value: &Value) -> CompileResult<String> {
        if let Value::Array(items) = value {
            let quoted = items
                .iter()
                .map(|item| self.quote(item))
                .collect::<CompileResult<Vec<_>>>()?;
            return Ok(quoted.join(", "));
        }
        let scalar = self.types.to_database(value, None)?;
        Ok(self.platform.quote_literal(&scalar))
    }

    /// Compile and substitute every placeholder with its quoted binding
    ///
    /// Debug output only: the result must never be executed.
    pub fn interpolate(&self, query: &mut Query) -> CompileResult<String> {
        let compiled = self.compile(query)?;
        let mut bindings = compiled.bindings.iter();
        let mut output = String::with_capacity(compiled.sql.len());
        // Open quote of the literal or quoted identifier being scanned
        let mut quote: Option<char> = None;
        let mut chars = compiled.sql.chars();

        while let Some(c) = chars.next() {
            match c {
                '?' if quote.is_none() => match bindings.next() {
                    Some(binding) => output.push_str(&self.platform.quote_literal(binding)),
                    None => output.push(c),
                },
                '\\' if quote == Some('\'') => {
                    output.push(c);
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                }
                '\'' | '"' | '`' => {
                    match quote {
                        None => quote = Some(c),
                        Some(open) if open == c => quote = None,
                        Some(_) => {}
                    }
                    output.push(c);
                }
                _ => output.push(c),
            }
        }
        Ok(output)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Kind check, compiled-string shortcut and telemetry around one compile call
    fn run<F>(&self, kind: StatementKind, query: &mut Query, compile: F) -> CompileResult<String>
    where
        F: FnOnce(&Self, &mut Query) -> CompileResult<String>,
    {
        if query.statement.kind() != kind {
            return Err(kind_mismatch(kind, &query.statement));
        }
        if let Some(sql) = query.state.compiled() {
            return Ok(sql.to_string());
        }

        let timer = CompileTimer::new(kind, self.log_level);
        match compile(self, query) {
            Ok(sql) => {
                query.state.set_compiled(sql.clone());
                let bindings = if self.log_level >= LogLevel::Basic {
                    query.state.bindings()
                } else {
                    Vec::new()
                };
                timer.success(&sql, &bindings);
                Ok(sql)
            }
            Err(e) => {
                timer.failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Compile a SELECT whose tables are prefixed with `database`
    fn compile_select_in(
        &self,
        query: &mut Query,
        database: Option<String>,
    ) -> CompileResult<String> {
        self.run(StatementKind::Select, query, |compiler, query| {
            let complex = matches!(&query.statement, Statement::Select(s) if s.is_complex_aggregate());
            if complex {
                return compiler.compile_complex_aggregate(query, database);
            }

            let Query {
                statement,
                state,
                quote_identifiers,
                ..
            } = query;
            let select = match statement {
                Statement::Select(select) => select,
                other => return Err(kind_mismatch(StatementKind::Select, other)),
            };
            let mut scope = CompileScope::new(compiler, state, *quote_identifiers, database);
            let mut working = scope.preprocessor.for_select(select)?;
            telemetry::log_statement(compiler.log_level, StatementKind::Select, &working);
            scope.compile_select(&mut working)
        })
    }

    /// `SELECT <agg>(*) AS aggregate FROM (<inner>) AS derived_query`
    fn compile_complex_aggregate(
        &self,
        query: &mut Query,
        database: Option<String>,
    ) -> CompileResult<String> {
        let Statement::Select(select) = &query.statement else {
            return Err(kind_mismatch(StatementKind::Select, &query.statement));
        };
        let Some(aggregate) = select.aggregate.clone() else {
            return Err(CompileError::invalid_value(
                "aggregate",
                "complex aggregate without an aggregate function",
            ));
        };

        let mut inner_statement = select.clone();
        inner_statement.aggregate = None;
        let mut inner = Query::new(Statement::Select(inner_statement));
        inner.connection = query.connection.clone();
        inner.quote_identifiers = query.quote_identifiers;

        let inner_sql = self.compile_select_in(&mut inner, database)?;

        // Cached clause fragments of a previous plain compile no longer apply
        query.state.invalidate(&[]);
        query.state.begin(Clause::Columns);
        for binding in inner.state.bindings() {
            query.state.bind(binding);
        }

        let sql = format!(
            "SELECT {} AS aggregate FROM ({inner_sql}) AS derived_query",
            self.platform.aggregate_expression(aggregate.function, "*")
        );
        query.state.store_part(Clause::Columns, sql.clone());
        Ok(sql)
    }
}

fn kind_mismatch(expected: StatementKind, statement: &Statement) -> CompileError {
    CompileError::StatementKind {
        expected,
        found: statement.kind(),
    }
}

/// Guard around one compile call
///
/// Marks the query state as compiling for its lifetime and clears the
/// preprocessor when dropped, whether compilation succeeded or not.
pub(crate) struct CompileScope<'c> {
    compiler: &'c SqlCompiler,
    state: &'c mut CompilerState,
    preprocessor: Box<dyn Preprocessor>,
    quote_identifiers: bool,
    /// Table prefix of a cross-connection sub-query
    database: Option<String>,
    /// Nodes injected by the preprocessor, pending append to the top-level list
    injected: Vec<ExpressionNode>,
}

impl<'c> CompileScope<'c> {
    fn new(
        compiler: &'c SqlCompiler,
        state: &'c mut CompilerState,
        quote_identifiers: bool,
        database: Option<String>,
    ) -> Self {
        state.set_compiling(true);
        Self {
            compiler,
            state,
            preprocessor: (compiler.preprocessors)(),
            quote_identifiers,
            database,
            injected: Vec::new(),
        }
    }

    fn platform(&self) -> &'c dyn Platform {
        self.compiler.platform.as_ref()
    }

    fn quote(&self, name: &str) -> String {
        quote_name(self.platform(), self.quote_identifiers, name)
    }

    /// Resolve a field through the preprocessor and quote the physical name
    fn column(&mut self, name: &str) -> CompileResult<ResolvedField> {
        let field = self.preprocessor.field(name, None)?;
        Ok(ResolvedField::new(self.quote(&field.name), field.ty))
    }

    /// Physical table name, prefixed for cross-connection sub-queries
    fn table_name(&self, name: &str) -> String {
        match &self.database {
            Some(database) if !name.contains('.') => self.quote(&format!("{database}.{name}")),
            _ => self.quote(name),
        }
    }

    /// Compile `clause` unless its fragment is cached
    fn memoize<F>(&mut self, clause: Clause, compile: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<String>,
    {
        if !self.state.needs_compile(clause) {
            return Ok(());
        }
        self.state.begin(clause);
        let fragment = compile(self)?;
        self.state.store_part(clause, fragment);
        Ok(())
    }

    /// Compile a SELECT sub-query in place, appending its bindings to the
    /// current segment
    fn compile_subquery(&mut self, query: &mut Query) -> CompileResult<String> {
        let database = match query.connection() {
            Some(connection) if connection.name != self.compiler.connection.name => {
                if connection.platform != self.platform().name() {
                    return Err(CompileError::IncompatibleConnection {
                        expected: self.platform().name().to_string(),
                        found: connection.platform.clone(),
                    });
                }
                connection.database.clone()
            }
            _ => self.database.clone(),
        };

        let sql = self.compiler.compile_select_in(query, database)?;
        for binding in query.state.bindings() {
            self.state.bind(binding);
        }
        Ok(sql)
    }
}

impl Drop for CompileScope<'_> {
    fn drop(&mut self) {
        self.state.set_compiling(false);
        self.preprocessor.clear();
    }
}

/// Compilation context handed to [`RawExpression::build`](crate::ast::RawExpression::build)
pub struct BuildContext<'s, 'c> {
    scope: &'s mut CompileScope<'c>,
}

impl<'s, 'c> BuildContext<'s, 'c> {
    pub(crate) fn new(scope: &'s mut CompileScope<'c>) -> Self {
        Self { scope }
    }

    /// Resolve and quote a field the way comparison columns are
    pub fn column(&mut self, name: &str) -> CompileResult<String> {
        self.scope.column(name).map(|field| field.name)
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        self.scope.quote(name)
    }

    pub fn platform(&self) -> &dyn Platform {
        self.scope.platform()
    }

    /// Root table of the statement being compiled
    pub fn root(&self) -> Option<String> {
        self.scope.preprocessor.root()
    }
}
