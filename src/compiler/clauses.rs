//! Clause compilers
//!
//! SELECT clauses are compiled one by one into memoized fragments; INSERT,
//! UPDATE and DELETE are rendered whole into the statement segment.

use std::collections::HashSet;

use crate::ast::{
    Assignment, Column, DeleteStatement, ExpressionNode, InsertStatement, InsertValues, Join,
    LockMode, Operand, Order, SelectStatement, Statement, TableRef, TableSource, TypeRef,
    UpdateStatement,
};
use crate::error::{CompileError, CompileResult, StatementKind};

use super::{BuildContext, Clause, CompileScope, Dialect};

impl CompileScope<'_> {
    // =========================================================================
    // SELECT
    // =========================================================================

    pub(super) fn compile_select(&mut self, select: &mut SelectStatement) -> CompileResult<String> {
        // Implicit joins come from a fresh preprocessor, so every clause that
        // may register one is recompiled along with JOIN
        if Clause::JOIN_DEPENDENT
            .iter()
            .any(|clause| self.state.needs_compile(*clause))
        {
            self.state.discard(&Clause::JOIN_DEPENDENT);
        }

        // JOIN compiles last: resolving fields of the other clauses may register joins
        self.memoize(Clause::Columns, |scope| scope.compile_columns(select))?;
        self.memoize(Clause::From, |scope| scope.compile_from(&select.tables))?;
        self.memoize(Clause::Groups, |scope| scope.compile_groups(&select.groups))?;
        self.memoize(Clause::Having, |scope| scope.compile_having(&mut select.having))?;
        self.memoize(Clause::Orders, |scope| scope.compile_orders(&select.orders))?;
        self.memoize(Clause::Where, |scope| scope.compile_where(&mut select.wheres))?;
        self.memoize(Clause::Joins, |scope| {
            scope.compile_joins(&select.tables, &mut select.joins)
        })?;
        self.memoize(Clause::Lock, |scope| Ok(scope.compile_lock(select)))?;

        let mut sql: String = Clause::BINDING_ORDER
            .iter()
            .filter_map(|clause| self.state.part(*clause))
            .collect();

        if select.limit.is_some() || select.offset.is_some() {
            sql = self
                .platform()
                .modify_limit_query(sql, select.limit, select.offset);
        }
        if let Some(lock) = self.state.part(Clause::Lock) {
            sql.push_str(lock);
        }
        Ok(sql)
    }

    fn compile_columns(&mut self, select: &SelectStatement) -> CompileResult<String> {
        let platform = self.platform();
        let distinct = select.distinct && platform.is_keyword("DISTINCT");

        if let Some(aggregate) = &select.aggregate {
            let mut column = if aggregate.is_wildcard() {
                "*".to_string()
            } else {
                self.column(&aggregate.column)?.name
            };
            if distinct && !aggregate.is_wildcard() {
                column = format!("DISTINCT {column}");
            }
            return Ok(format!(
                "SELECT {} AS aggregate",
                platform.aggregate_expression(aggregate.function, &column)
            ));
        }

        let mut sql = String::from("SELECT ");
        if distinct {
            sql.push_str("DISTINCT ");
        }

        if select.columns.is_empty() {
            match self.preprocessor.root() {
                Some(root) => {
                    sql.push_str(&self.quote(&root));
                    sql.push_str(".*");
                }
                None => sql.push('*'),
            }
            return Ok(sql);
        }

        let mut projections = Vec::with_capacity(select.columns.len());
        for projection in &select.columns {
            let mut column = match &projection.column {
                Column::Name(name) => self.column(name)?.name,
                Column::Expression(expression) => {
                    expression.build(&mut BuildContext::new(self))?
                }
            };
            if let Some(alias) = &projection.alias {
                column.push_str(" AS ");
                column.push_str(&self.quote(alias));
            }
            projections.push(column);
        }
        sql.push_str(&projections.join(", "));
        Ok(sql)
    }

    fn compile_from(&mut self, tables: &[TableRef]) -> CompileResult<String> {
        if tables.is_empty() {
            return Ok(String::new());
        }

        let mut seen = HashSet::new();
        let mut rendered = Vec::with_capacity(tables.len());
        for table in tables {
            if let Some(key) = table.dedup_key() {
                if !seen.insert(key) {
                    continue;
                }
            }
            rendered.push(self.render_table(table)?);
        }
        Ok(format!(" FROM {}", rendered.join(", ")))
    }

    fn compile_joins(&mut self, tables: &[TableRef], joins: &mut Vec<Join>) -> CompileResult<String> {
        joins.extend(self.preprocessor.implicit_joins());

        let mut seen: HashSet<String> = tables
            .iter()
            .filter_map(TableRef::dedup_key)
            .map(str::to_string)
            .collect();

        let mut sql = String::new();
        for join in joins.iter_mut() {
            if let Some(key) = join.table.dedup_key() {
                if !seen.insert(key.to_string()) {
                    continue;
                }
            }

            let table = self.render_table(&join.table)?;
            sql.push(' ');
            sql.push_str(join.join_type.as_sql());
            sql.push(' ');
            sql.push_str(&table);

            let on = self.compile_conditions(&mut join.on)?;
            if !on.is_empty() {
                sql.push_str(" ON ");
                sql.push_str(&on);
            }
        }
        Ok(sql)
    }

    fn compile_where(&mut self, wheres: &mut Vec<ExpressionNode>) -> CompileResult<String> {
        let conditions = self.compile_conditions(wheres)?;
        Ok(if conditions.is_empty() {
            conditions
        } else {
            format!(" WHERE {conditions}")
        })
    }

    fn compile_having(&mut self, having: &mut Vec<ExpressionNode>) -> CompileResult<String> {
        let conditions = self.compile_conditions(having)?;
        Ok(if conditions.is_empty() {
            conditions
        } else {
            format!(" HAVING {conditions}")
        })
    }

    fn compile_groups(&mut self, groups: &[String]) -> CompileResult<String> {
        if groups.is_empty() {
            return Ok(String::new());
        }
        let columns = groups
            .iter()
            .map(|group| self.column(group).map(|field| field.name))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(format!(" GROUP BY {}", columns.join(", ")))
    }

    fn compile_orders(&mut self, orders: &[Order]) -> CompileResult<String> {
        if orders.is_empty() {
            return Ok(String::new());
        }
        let columns = orders
            .iter()
            .map(|order| {
                self.column(&order.sort)
                    .map(|field| format!("{} {}", field.name, order.order.as_sql()))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", columns.join(", ")))
    }

    /// Row lock suffix; aggregates never lock
    fn compile_lock(&self, select: &SelectStatement) -> String {
        if select.aggregate.is_some() {
            return String::new();
        }
        let lock = match select.lock {
            Some(LockMode::Write) => self.platform().write_lock_sql(),
            Some(LockMode::Read) => self.platform().read_lock_sql(),
            None => "",
        };
        if lock.is_empty() {
            String::new()
        } else {
            format!(" {lock}")
        }
    }

    /// `<table> [<alias>]`, sub-queries parenthesized
    fn render_table(&mut self, table: &TableRef) -> CompileResult<String> {
        let mut resolved = self.preprocessor.table(table.clone())?;
        let mut sql = match &mut resolved.source {
            TableSource::Name(name) => self.table_name(name),
            TableSource::Subquery(query) => format!("({})", self.compile_subquery(query)?),
        };
        if let Some(alias) = &resolved.alias {
            sql.push(' ');
            sql.push_str(&self.quote(alias));
        }
        Ok(sql)
    }

    // =========================================================================
    // INSERT / UPDATE / DELETE
    // =========================================================================

    /// Target table of a data-modifying statement, without alias
    fn target_table(&mut self, table: Option<&TableRef>, kind: StatementKind) -> CompileResult<String> {
        let missing = || CompileError::MissingTable { kind };
        let table = table.ok_or_else(missing)?;
        let resolved = self.preprocessor.table(table.clone())?;
        match &resolved.source {
            TableSource::Name(name) if !name.is_empty() => Ok(self.table_name(name)),
            _ => Err(missing()),
        }
    }

    pub(super) fn compile_insert(&mut self, mut insert: InsertStatement) -> CompileResult<String> {
        self.state.begin(Clause::Statement);
        let table = self.target_table(insert.table.as_ref(), StatementKind::Insert)?;
        let platform = self.platform();

        let verb = if insert.ignore && platform.is_keyword("IGNORE") {
            if platform.name() == Dialect::Sqlite.as_str() {
                "INSERT OR IGNORE"
            } else {
                "INSERT IGNORE"
            }
        } else if insert.replace && platform.is_keyword("REPLACE") {
            "REPLACE"
        } else {
            "INSERT"
        };
        let mut sql = format!("{verb} INTO {table}");

        match &mut insert.values {
            InsertValues::Data(assignments) if assignments.is_empty() => {
                sql.push(' ');
                sql.push_str(platform.default_values_sql());
            }
            InsertValues::Data(assignments) => {
                let mut columns = Vec::with_capacity(assignments.len());
                let mut values = Vec::with_capacity(assignments.len());
                for assignment in assignments.iter_mut() {
                    let (column, value) = self.compile_assignment(assignment)?;
                    columns.push(column);
                    values.push(value);
                }
                sql.push_str(&format!(
                    " ({}) VALUES ({})",
                    columns.join(", "),
                    values.join(", ")
                ));
            }
            InsertValues::Select(query) => {
                if let Some(columns) = self.projected_columns(query.statement()) {
                    sql.push_str(&format!(" ({})", columns.join(", ")));
                }
                let select = self.compile_subquery(query)?;
                sql.push(' ');
                sql.push_str(&select);
            }
        }
        Ok(sql)
    }

    /// Insert column list taken from explicit SELECT projections
    fn projected_columns(&self, statement: &Statement) -> Option<Vec<String>> {
        let Statement::Select(select) = statement else {
            return None;
        };
        if select.columns.is_empty() || select.aggregate.is_some() {
            return None;
        }
        select
            .columns
            .iter()
            .map(|projection| {
                projection.output_name().map(|name| {
                    let column = name.rsplit('.').next().unwrap_or(name);
                    self.quote(column)
                })
            })
            .collect()
    }

    pub(super) fn compile_update(&mut self, mut update: UpdateStatement) -> CompileResult<String> {
        self.state.begin(Clause::Statement);
        let table = self.target_table(update.table.as_ref(), StatementKind::Update)?;
        if update.values.is_empty() {
            return Err(CompileError::NothingToUpdate);
        }

        let mut assignments = Vec::with_capacity(update.values.len());
        for assignment in update.values.iter_mut() {
            let (column, value) = self.compile_assignment(assignment)?;
            assignments.push(format!("{column} = {value}"));
        }

        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        let conditions = self.compile_conditions(&mut update.wheres)?;
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        Ok(sql)
    }

    pub(super) fn compile_delete(&mut self, mut delete: DeleteStatement) -> CompileResult<String> {
        self.state.begin(Clause::Statement);
        let table = self.target_table(delete.table.as_ref(), StatementKind::Delete)?;

        let mut sql = format!("DELETE FROM {table}");
        let conditions = self.compile_conditions(&mut delete.wheres)?;
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        Ok(sql)
    }

    /// Quoted column and rendered value of one assignment
    fn compile_assignment(&mut self, assignment: &mut Assignment) -> CompileResult<(String, String)> {
        let field = self
            .preprocessor
            .field(&assignment.column, assignment.ty.as_ref())?;
        let column = self.quote(&field.name);
        let value = self.compile_operand(
            &mut assignment.value,
            &assignment.column,
            field.ty.as_ref(),
            false,
        )?;
        Ok((column, value))
    }

    fn compile_operand(
        &mut self,
        operand: &mut Operand,
        column: &str,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<String> {
        match operand {
            Operand::Value(value) => {
                self.bind_value(value.clone(), ty, converted)?;
                Ok("?".to_string())
            }
            Operand::Subquery(query) => Ok(format!("({})", self.compile_subquery(query)?)),
            Operand::Expression(expression) => expression.build(&mut BuildContext::new(self)),
            Operand::Transformer(transformer) => {
                let mut transformed = transformer.transform(column, "=", self.platform())?;
                if matches!(transformed.value, Operand::Transformer(_)) {
                    return Err(CompileError::invalid_value(
                        "=",
                        "a transformer cannot produce another transformer",
                    ));
                }
                self.compile_operand(&mut transformed.value, column, ty, true)
            }
        }
    }
}
