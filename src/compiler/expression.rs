//! Expression compilation
//!
//! Renders WHERE / HAVING / ON lists. Leaves compile to
//! `<column> <operator> <value>`, groups to `(<children>)`. Every `?` is
//! bound the moment it is written, so binding order follows the text.

use crate::ast::{Comparison, ExpressionNode, Operand, Operator, Scalar, TypeRef, Value};
use crate::error::{CompileError, CompileResult};

use super::{BuildContext, CompileScope, ResolvedField};

impl<'c> CompileScope<'c> {
    /// Compile a top-level condition list
    ///
    /// Nodes the preprocessor injects while compiling an element are appended
    /// to this list and compiled in turn.
    pub(super) fn compile_conditions(
        &mut self,
        nodes: &mut Vec<ExpressionNode>,
    ) -> CompileResult<String> {
        self.compile_list(nodes, true)
    }

    fn compile_list(&mut self, nodes: &mut Vec<ExpressionNode>, root: bool) -> CompileResult<String> {
        let mut sql = String::new();
        let mut index = 0;

        // The length is re-read every iteration: injected nodes grow the list
        while index < nodes.len() {
            self.preprocessor
                .expression(&mut nodes[index], &mut self.injected)?;

            let glue = nodes[index].glue();
            let (fragment, nested) = match &mut nodes[index] {
                ExpressionNode::Comparison(comparison) => {
                    (self.compile_comparison(comparison)?, false)
                }
                ExpressionNode::Nested { nodes: children, .. } => {
                    (self.compile_list(children, false)?, true)
                }
                ExpressionNode::Raw { expression, .. } => {
                    (expression.build(&mut BuildContext::new(self))?, false)
                }
            };

            if root {
                nodes.append(&mut self.injected);
            }
            index += 1;

            if fragment.is_empty() {
                continue;
            }
            // A lone group needs no parentheses
            let fragment = if nested && nodes.len() > 1 {
                format!("({fragment})")
            } else {
                fragment
            };

            if !sql.is_empty() {
                sql.push(' ');
                sql.push_str(glue.as_sql());
                sql.push(' ');
            }
            sql.push_str(&fragment);
        }

        Ok(sql)
    }

    fn compile_comparison(&mut self, comparison: &mut Comparison) -> CompileResult<String> {
        if let Operand::Transformer(transformer) = &comparison.value {
            let transformed =
                transformer.transform(&comparison.column, &comparison.operator, self.platform())?;
            comparison.column = transformed.column;
            comparison.operator = transformed.operator;
            comparison.value = transformed.value;
            comparison.converted = true;
        }

        let field = self.column(&comparison.column)?;
        let operator = Operator::parse(&comparison.operator)?;
        let token = comparison.operator.as_str();

        match &mut comparison.value {
            Operand::Value(value) => {
                self.compile_value(&field, operator, token, value.clone(), comparison.converted)
            }
            Operand::Subquery(query) => {
                let subquery = format!("({})", self.compile_subquery(query)?);
                self.compile_verbatim(&field, operator, token, &subquery)
            }
            Operand::Expression(expression) => {
                let built = expression.build(&mut BuildContext::new(self))?;
                self.compile_verbatim(&field, operator, token, &built)
            }
            Operand::Transformer(_) => Err(CompileError::invalid_value(
                token,
                "a transformer cannot produce another transformer",
            )),
        }
    }

    fn operator_sql(&self, operator: Operator) -> &'c str {
        match operator {
            Operator::Regex => self.platform().regex_operator(),
            other => other.as_sql(),
        }
    }

    /// Comparison against an already rendered right-hand side
    fn compile_verbatim(
        &self,
        field: &ResolvedField,
        operator: Operator,
        token: &str,
        rhs: &str,
    ) -> CompileResult<String> {
        match operator {
            Operator::Between | Operator::NotBetween => Err(CompileError::invalid_value(
                token,
                "bounds must be plain values",
            )),
            other => Ok(format!("{} {} {rhs}", field.name, self.operator_sql(other))),
        }
    }

    fn compile_value(
        &mut self,
        field: &ResolvedField,
        operator: Operator,
        token: &str,
        value: Value,
        converted: bool,
    ) -> CompileResult<String> {
        let column = field.name.as_str();
        let ty = field.ty.as_ref();
        let platform = self.platform();

        match operator {
            Operator::Equal => match value {
                Value::Array(items) => self.compile_in(column, items, false, ty, converted),
                Value::Null => Ok(platform.is_null_expression(column)),
                value => self.compile_single(column, "=", value, ty, converted),
            },
            Operator::NotEqual => match value {
                Value::Array(items) => self.compile_in(column, items, true, ty, converted),
                Value::Null => Ok(platform.is_not_null_expression(column)),
                value => self.compile_single(column, "!=", value, ty, converted),
            },
            Operator::In | Operator::NotIn => {
                let items = match value {
                    Value::Array(items) => items,
                    value => vec![value],
                };
                self.compile_in(column, items, operator == Operator::NotIn, ty, converted)
            }
            Operator::Between => self.compile_between(column, token, value, ty, converted),
            Operator::NotBetween => {
                let between = self.compile_between(column, token, value, ty, converted)?;
                Ok(platform.not_expression(&between))
            }
            Operator::LessThan
            | Operator::LessOrEqual
            | Operator::GreaterThan
            | Operator::GreaterOrEqual
            | Operator::Regex
            | Operator::Like
            | Operator::NotLike => {
                let sql_operator = self.operator_sql(operator);
                match value {
                    Value::Array(items) => self.compile_expanded(
                        column,
                        sql_operator,
                        token,
                        items,
                        operator.is_negative(),
                        ty,
                        converted,
                    ),
                    value => self.compile_single(column, sql_operator, value, ty, converted),
                }
            }
        }
    }

    fn compile_single(
        &mut self,
        column: &str,
        sql_operator: &str,
        value: Value,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<String> {
        self.bind_value(value, ty, converted)?;
        Ok(format!("{column} {sql_operator} ?"))
    }

    /// One comparison per element: OR-combined, AND-combined when negative
    #[allow(clippy::too_many_arguments)]
    fn compile_expanded(
        &mut self,
        column: &str,
        sql_operator: &str,
        token: &str,
        items: Vec<Value>,
        negative: bool,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<String> {
        if items.is_empty() {
            return Err(CompileError::invalid_value(token, "empty list"));
        }

        let count = items.len();
        let mut parts = Vec::with_capacity(count);
        for item in items {
            parts.push(self.compile_single(column, sql_operator, item, ty, converted)?);
        }

        let glue = if negative { " AND " } else { " OR " };
        let sql = parts.join(glue);
        Ok(if count > 1 { format!("({sql})") } else { sql })
    }

    /// `IN` / `NOT IN` with NULL elements pulled out into `IS [NOT] NULL`
    fn compile_in(
        &mut self,
        column: &str,
        items: Vec<Value>,
        negated: bool,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<String> {
        let platform = self.platform();
        let has_null = items.iter().any(Value::is_null);
        let null_check = if negated {
            platform.is_not_null_expression(column)
        } else {
            platform.is_null_expression(column)
        };

        let values: Vec<Value> = items.into_iter().filter(|v| !v.is_null()).collect();
        if values.is_empty() {
            return Ok(null_check);
        }

        let placeholders = vec!["?"; values.len()].join(",");
        for value in values {
            self.bind_value(value, ty, converted)?;
        }

        let keyword = if negated { "NOT IN" } else { "IN" };
        let membership = format!("{column} {keyword} ({placeholders})");
        if !has_null {
            return Ok(membership);
        }

        let glue = if negated { "AND" } else { "OR" };
        Ok(format!("({membership} {glue} {null_check})"))
    }

    fn compile_between(
        &mut self,
        column: &str,
        token: &str,
        value: Value,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<String> {
        let platform = self.platform();
        match value {
            Value::Array(items) => {
                let [low, high]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
                    CompileError::invalid_value(
                        token,
                        format!("expected two bounds, got {}", items.len()),
                    )
                })?;
                self.bind_value(low, ty, converted)?;
                self.bind_value(high, ty, converted)?;
                Ok(platform.between_expression(column, "?", "?"))
            }
            // Scalar upper bound only
            value => {
                self.bind_value(value, ty, converted)?;
                Ok(platform.between_expression(column, "0", "?"))
            }
        }
    }

    /// Convert (unless already converted) and bind one value
    pub(super) fn bind_value(
        &mut self,
        value: Value,
        ty: Option<&TypeRef>,
        converted: bool,
    ) -> CompileResult<()> {
        let scalar = if converted {
            match Scalar::try_from(value) {
                Ok(scalar) => scalar,
                Err(value) => self.compiler.types.to_database(&value, None)?,
            }
        } else {
            self.compiler.types.to_database(&value, ty)?
        };
        self.state.bind(scalar);
        Ok(())
    }
}
