//! Logical-to-physical resolution hook
//!
//! The compiler never interprets entity or relation metadata itself. Before
//! rendering, it hands the statement to a [`Preprocessor`] which returns a
//! working copy with physical names, and during rendering it asks the
//! preprocessor to resolve every field and table it meets.
//!
//! A preprocessor carries transient state for exactly one compile call: the
//! compiler obtains a fresh one from a [`PreprocessorFactory`] and calls
//! [`Preprocessor::clear`] when the call ends, successfully or not.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{
    DeleteStatement, ExpressionNode, InsertStatement, Join, SelectStatement, TableRef, TypeRef,
    UpdateStatement,
};
use crate::error::CompileResult;

/// Physical column name plus the type used to convert values compared to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub name: String,
    pub ty: Option<TypeRef>,
}

impl ResolvedField {
    pub fn new(name: impl Into<String>, ty: Option<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Resolves the logical structure of a statement into its physical form
///
/// Every method has a passthrough default, so implementations only override
/// what their mapping layer actually rewrites.
pub trait Preprocessor: Send {
    fn for_select(&mut self, statement: &SelectStatement) -> CompileResult<SelectStatement> {
        Ok(statement.clone())
    }

    fn for_insert(&mut self, statement: &InsertStatement) -> CompileResult<InsertStatement> {
        Ok(statement.clone())
    }

    fn for_update(&mut self, statement: &UpdateStatement) -> CompileResult<UpdateStatement> {
        Ok(statement.clone())
    }

    fn for_delete(&mut self, statement: &DeleteStatement) -> CompileResult<DeleteStatement> {
        Ok(statement.clone())
    }

    /// Resolve a field; `ty` is an explicit type that takes precedence over
    /// whatever the mapping declares
    fn field(&mut self, name: &str, ty: Option<&TypeRef>) -> CompileResult<ResolvedField> {
        Ok(ResolvedField::new(name, ty.cloned()))
    }

    fn table(&mut self, table: TableRef) -> CompileResult<TableRef> {
        Ok(table)
    }

    /// Alias (or name) of the root table, used for `<root>.*`
    fn root(&self) -> Option<String> {
        None
    }

    /// Rewrite an expression node before it is compiled
    ///
    /// Nodes pushed to `injected` are appended to the top-level list the node
    /// belongs to, after the node itself.
    fn expression(
        &mut self,
        _node: &mut ExpressionNode,
        _injected: &mut Vec<ExpressionNode>,
    ) -> CompileResult<()> {
        Ok(())
    }

    /// Joins registered while resolving fields; drained by JOIN compilation
    fn implicit_joins(&mut self) -> Vec<Join> {
        Vec::new()
    }

    /// Reset transient state
    fn clear(&mut self) {}
}

/// Creates one preprocessor per compile call
pub type PreprocessorFactory = Arc<dyn Fn() -> Box<dyn Preprocessor> + Send + Sync>;

/// Passthrough preprocessor with optional declared column types
///
/// Column types are looked up by the full field name first, then by the part
/// after the last dot, so `u.created_at` finds a type declared for
/// `created_at`.
#[derive(Debug, Clone, Default)]
pub struct DefaultPreprocessor {
    column_types: Arc<HashMap<String, TypeRef>>,
    root: Option<String>,
}

impl DefaultPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column_types(column_types: HashMap<String, TypeRef>) -> Self {
        Self {
            column_types: Arc::new(column_types),
            root: None,
        }
    }

    /// Factory handing out [`DefaultPreprocessor`]s sharing the column types
    pub fn factory(column_types: HashMap<String, TypeRef>) -> PreprocessorFactory {
        let column_types = Arc::new(column_types);
        Arc::new(move || {
            Box::new(DefaultPreprocessor {
                column_types: Arc::clone(&column_types),
                root: None,
            }) as Box<dyn Preprocessor>
        })
    }

    fn lookup(&self, name: &str) -> Option<&TypeRef> {
        self.column_types.get(name).or_else(|| {
            name.rsplit_once('.')
                .and_then(|(_, column)| self.column_types.get(column))
        })
    }

    fn remember_root(&mut self, table: Option<&TableRef>) {
        self.root = table.and_then(TableRef::dedup_key).map(str::to_string);
    }
}

impl Preprocessor for DefaultPreprocessor {
    fn for_select(&mut self, statement: &SelectStatement) -> CompileResult<SelectStatement> {
        self.remember_root(statement.tables.first());
        Ok(statement.clone())
    }

    fn for_insert(&mut self, statement: &InsertStatement) -> CompileResult<InsertStatement> {
        self.remember_root(statement.table.as_ref());
        Ok(statement.clone())
    }

    fn for_update(&mut self, statement: &UpdateStatement) -> CompileResult<UpdateStatement> {
        self.remember_root(statement.table.as_ref());
        Ok(statement.clone())
    }

    fn for_delete(&mut self, statement: &DeleteStatement) -> CompileResult<DeleteStatement> {
        self.remember_root(statement.table.as_ref());
        Ok(statement.clone())
    }

    fn field(&mut self, name: &str, ty: Option<&TypeRef>) -> CompileResult<ResolvedField> {
        let ty = ty.or_else(|| self.lookup(name)).cloned();
        Ok(ResolvedField::new(name, ty))
    }

    fn root(&self) -> Option<String> {
        self.root.clone()
    }

    fn clear(&mut self) {
        self.root = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_first_table() {
        let mut pre = DefaultPreprocessor::new();
        let mut stmt = SelectStatement::new();
        stmt.tables.push(TableRef::table("users").with_alias("u"));
        stmt.tables.push(TableRef::table("posts"));

        pre.for_select(&stmt).unwrap();
        assert_eq!(pre.root(), Some("u".to_string()));

        pre.clear();
        assert_eq!(pre.root(), None);
    }

    #[test]
    fn test_field_types() {
        let mut types = HashMap::new();
        types.insert("created_at".to_string(), TypeRef::datetime());
        let mut pre = DefaultPreprocessor::with_column_types(types);

        let field = pre.field("u.created_at", None).unwrap();
        assert_eq!(field.name, "u.created_at");
        assert_eq!(field.ty, Some(TypeRef::datetime()));

        // Explicit type wins
        let field = pre.field("created_at", Some(&TypeRef::string())).unwrap();
        assert_eq!(field.ty, Some(TypeRef::string()));

        assert_eq!(pre.field("name", None).unwrap().ty, None);
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let factory = DefaultPreprocessor::factory(HashMap::new());
        let mut first = factory();
        let mut stmt = SelectStatement::new();
        stmt.tables.push(TableRef::table("users"));
        first.for_select(&stmt).unwrap();

        let second = factory();
        assert_eq!(first.root(), Some("users".to_string()));
        assert_eq!(second.root(), None);
    }
}
