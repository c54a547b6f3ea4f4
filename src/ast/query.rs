//! Query objects
//!
//! A [`Query`] owns its statement and the [`CompilerState`] produced by
//! compiling it. Every builder method invalidates the clauses it touches so
//! the next compilation only re-renders what changed.

use super::expr::{ExpressionNode, Glue, Operand};
use super::stmt::*;
use crate::compiler::{Clause, CompilerState};

/// Connection a query is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRef {
    /// Connection name
    pub name: String,
    /// Database (schema) name, used to prefix tables of cross-connection sub-queries
    pub database: Option<String>,
    /// Platform name (see [`Platform::name`](crate::compiler::Platform::name))
    pub platform: String,
}

impl ConnectionRef {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
            platform: platform.into(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::table(name)
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::table(name)
    }
}

/// A statement under construction plus its compilation cache
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) statement: Statement,
    pub(crate) state: CompilerState,
    pub(crate) connection: Option<ConnectionRef>,
    pub(crate) quote_identifiers: bool,
}

impl Query {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            state: CompilerState::default(),
            connection: None,
            quote_identifiers: false,
        }
    }

    pub fn select() -> Self {
        Self::new(Statement::Select(SelectStatement::default()))
    }

    pub fn insert() -> Self {
        Self::new(Statement::Insert(InsertStatement::default()))
    }

    pub fn update() -> Self {
        Self::new(Statement::Update(UpdateStatement::default()))
    }

    pub fn delete() -> Self {
        Self::new(Statement::Delete(DeleteStatement::default()))
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn state(&self) -> &CompilerState {
        &self.state
    }

    pub fn connection(&self) -> Option<&ConnectionRef> {
        self.connection.as_ref()
    }

    pub fn quotes_identifiers(&self) -> bool {
        self.quote_identifiers
    }

    /// Replace the statement, dropping every cached fragment
    pub fn set_statement(&mut self, statement: Statement) -> &mut Self {
        self.statement = statement;
        self.state.invalidate(&[]);
        self
    }

    pub fn on_connection(&mut self, connection: ConnectionRef) -> &mut Self {
        self.connection = Some(connection);
        self.state.invalidate(&[]);
        self
    }

    pub fn use_quote_identifier(&mut self, quote: bool) -> &mut Self {
        if self.quote_identifiers != quote {
            self.quote_identifiers = quote;
            self.state.invalidate(&[]);
        }
        self
    }

    /// Drop every cached fragment and binding
    pub fn invalidate(&mut self) -> &mut Self {
        self.state.invalidate(&[]);
        self
    }

    fn select_mut(&mut self, clauses: &[Clause]) -> Option<&mut SelectStatement> {
        self.state.invalidate(clauses);
        match &mut self.statement {
            Statement::Select(s) => Some(s),
            _ => None,
        }
    }

    fn wheres_mut(&mut self) -> Option<&mut Vec<ExpressionNode>> {
        self.state.invalidate(&[Clause::Where, Clause::Statement]);
        match &mut self.statement {
            Statement::Select(s) => Some(&mut s.wheres),
            Statement::Update(s) => Some(&mut s.wheres),
            Statement::Delete(s) => Some(&mut s.wheres),
            Statement::Insert(_) => None,
        }
    }

    // =========================================================================
    // Table target
    // =========================================================================

    /// Add a FROM table (SELECT) or set the target table (INSERT/UPDATE/DELETE)
    pub fn from(&mut self, table: impl Into<TableRef>) -> &mut Self {
        let table = table.into();
        // JOIN deduplicates against the FROM tables
        self.state.invalidate(&[
            Clause::Columns,
            Clause::From,
            Clause::Joins,
            Clause::Statement,
        ]);
        match &mut self.statement {
            Statement::Select(s) => s.tables.push(table),
            Statement::Insert(s) => s.table = Some(table),
            Statement::Update(s) => s.table = Some(table),
            Statement::Delete(s) => s.table = Some(table),
        }
        self
    }

    pub fn from_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.from(TableRef::table(table).with_alias(alias))
    }

    // =========================================================================
    // SELECT projection
    // =========================================================================

    pub fn column(&mut self, projection: Projection) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Columns]) {
            s.columns.push(projection);
        }
        self
    }

    pub fn columns<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(s) = self.select_mut(&[Clause::Columns]) {
            s.columns.extend(names.into_iter().map(Projection::column));
        }
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Columns]) {
            s.distinct = distinct;
        }
        self
    }

    /// Turn the query into an aggregate (`None` restores the projection)
    pub fn aggregate(&mut self, aggregate: Option<Aggregate>) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Columns, Clause::Lock]) {
            s.aggregate = aggregate;
        }
        self
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub fn where_node(&mut self, node: ExpressionNode) -> &mut Self {
        if let Some(wheres) = self.wheres_mut() {
            wheres.push(node);
        }
        self
    }

    pub fn and_where(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.where_node(ExpressionNode::compare(column, operator, value))
    }

    pub fn or_where(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.where_node(ExpressionNode::compare(column, operator, value).or())
    }

    pub fn where_nested(&mut self, glue: Glue, nodes: Vec<ExpressionNode>) -> &mut Self {
        self.where_node(ExpressionNode::nested(nodes).with_glue(glue))
    }

    pub fn where_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.where_node(ExpressionNode::raw(sql))
    }

    /// Add an explicit join
    pub fn join(&mut self, join: Join) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Joins]) {
            s.joins.push(join);
        }
        self
    }

    pub fn group_by(&mut self, field: impl Into<String>) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Groups]) {
            s.groups.push(field.into());
        }
        self
    }

    pub fn having(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Operand>,
    ) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Having]) {
            s.having
                .push(ExpressionNode::compare(column, operator, value));
        }
        self
    }

    pub fn order_by(&mut self, sort: impl Into<String>, order: OrderDirection) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Orders]) {
            s.orders.push(Order {
                sort: sort.into(),
                order,
            });
        }
        self
    }

    pub fn limit(&mut self, limit: Option<u64>) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Statement]) {
            s.limit = limit;
        }
        self
    }

    pub fn offset(&mut self, offset: Option<u64>) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Statement]) {
            s.offset = offset;
        }
        self
    }

    pub fn lock(&mut self, lock: Option<LockMode>) -> &mut Self {
        if let Some(s) = self.select_mut(&[Clause::Lock]) {
            s.lock = lock;
        }
        self
    }

    // =========================================================================
    // INSERT / UPDATE values
    // =========================================================================

    /// Add an INSERT value or an UPDATE assignment
    pub fn set(&mut self, assignment: Assignment) -> &mut Self {
        self.state.invalidate(&[Clause::Statement]);
        match &mut self.statement {
            Statement::Insert(s) => {
                if let InsertValues::Data(data) = &mut s.values {
                    data.push(assignment);
                } else {
                    s.values = InsertValues::Data(vec![assignment]);
                }
            }
            Statement::Update(s) => s.values.push(assignment),
            _ => {}
        }
        self
    }

    pub fn value(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.set(Assignment::new(column, value))
    }

    /// Insert the rows produced by a SELECT
    pub fn values_from(&mut self, select: Query) -> &mut Self {
        self.state.invalidate(&[Clause::Statement]);
        if let Statement::Insert(s) = &mut self.statement {
            s.values = InsertValues::Select(Box::new(select));
        }
        self
    }

    pub fn ignore(&mut self, ignore: bool) -> &mut Self {
        self.state.invalidate(&[Clause::Statement]);
        if let Statement::Insert(s) = &mut self.statement {
            s.ignore = ignore;
        }
        self
    }

    pub fn replace(&mut self, replace: bool) -> &mut Self {
        self.state.invalidate(&[Clause::Statement]);
        if let Statement::Insert(s) = &mut self.statement {
            s.replace = replace;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_select() {
        let mut query = Query::select();
        query
            .from_as("users", "u")
            .columns(["id", "name"])
            .and_where("age", ">=", 18)
            .or_where("admin", "=", true)
            .order_by("name", OrderDirection::Desc)
            .limit(Some(10));

        match query.statement() {
            Statement::Select(s) => {
                assert_eq!(s.tables.len(), 1);
                assert_eq!(s.columns.len(), 2);
                assert_eq!(s.wheres.len(), 2);
                assert_eq!(s.wheres[1].glue(), Glue::Or);
                assert_eq!(s.orders[0].order, OrderDirection::Desc);
                assert_eq!(s.limit, Some(10));
            }
            other => panic!("Expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_targets_dml_tables() {
        let mut query = Query::update();
        query.from("users").value("name", "Bob").and_where("id", "=", 1);

        match query.statement() {
            Statement::Update(s) => {
                assert_eq!(s.table.as_ref().and_then(TableRef::name), Some("users"));
                assert_eq!(s.values.len(), 1);
                assert_eq!(s.wheres.len(), 1);
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn test_select_only_methods_ignore_other_kinds() {
        let mut query = Query::delete();
        query.group_by("id").limit(Some(3));
        assert!(matches!(query.statement(), Statement::Delete(_)));
    }
}
