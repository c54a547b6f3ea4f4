//! Per-query compilation state
//!
//! [`CompilerState`] memoizes rendered clause fragments and keeps the
//! positional bindings of each clause in its own segment, so a builder change
//! to one clause only invalidates that clause.

use crate::ast::Scalar;

/// Memoization and binding slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Clause {
    #[default]
    Columns,
    From,
    Joins,
    Where,
    Groups,
    Having,
    Orders,
    Lock,
    /// Whole statement: INSERT/UPDATE/DELETE bindings and the SELECT assembly
    Statement,
}

impl Clause {
    pub const COUNT: usize = 9;

    /// Merge order of SELECT binding segments, matching the SQL text order
    pub const BINDING_ORDER: [Clause; 7] = [
        Clause::Columns,
        Clause::From,
        Clause::Joins,
        Clause::Where,
        Clause::Groups,
        Clause::Having,
        Clause::Orders,
    ];

    /// Clauses whose field resolution may register implicit joins, plus JOIN
    /// itself; they are always recompiled together
    pub const JOIN_DEPENDENT: [Clause; 6] = [
        Clause::Columns,
        Clause::Joins,
        Clause::Where,
        Clause::Groups,
        Clause::Having,
        Clause::Orders,
    ];

    pub const ALL: [Clause; Clause::COUNT] = [
        Clause::Columns,
        Clause::From,
        Clause::Joins,
        Clause::Where,
        Clause::Groups,
        Clause::Having,
        Clause::Orders,
        Clause::Lock,
        Clause::Statement,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Scratch space owned by one query
///
/// `bind` must be called in exactly the order the `?` placeholders are
/// written into the fragment of the current clause.
#[derive(Debug, Clone, Default)]
pub struct CompilerState {
    bindings: [Vec<Scalar>; Clause::COUNT],
    parts: [Option<String>; Clause::COUNT],
    compiled: Option<String>,
    compiling: bool,
    current: Clause,
}

impl CompilerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no fragment is cached for the clause
    pub fn needs_compile(&self, clause: Clause) -> bool {
        self.parts[clause.index()].is_none()
    }

    /// Cached fragment of a clause
    pub fn part(&self, clause: Clause) -> Option<&str> {
        self.parts[clause.index()].as_deref()
    }

    pub(crate) fn store_part(&mut self, clause: Clause, fragment: String) {
        self.parts[clause.index()] = Some(fragment);
    }

    /// Final assembled SQL, if the query is compiled
    pub fn compiled(&self) -> Option<&str> {
        self.compiled.as_deref()
    }

    pub(crate) fn set_compiled(&mut self, sql: String) {
        self.compiled = Some(sql);
    }

    pub fn is_compiling(&self) -> bool {
        self.compiling
    }

    pub(crate) fn set_compiling(&mut self, compiling: bool) {
        self.compiling = compiling;
    }

    /// Drop cached fragments and bindings of `clauses` (all when empty)
    ///
    /// Ignored while the query is being compiled.
    pub fn invalidate(&mut self, clauses: &[Clause]) {
        if self.compiling {
            return;
        }

        let targets: &[Clause] = if clauses.is_empty() {
            &Clause::ALL
        } else {
            clauses
        };

        for clause in targets {
            self.parts[clause.index()] = None;
            self.bindings[clause.index()].clear();
        }
        self.compiled = None;
    }

    /// Drop cached fragments and bindings of `clauses`, even while compiling
    pub(crate) fn discard(&mut self, clauses: &[Clause]) {
        for clause in clauses {
            self.parts[clause.index()] = None;
            self.bindings[clause.index()].clear();
        }
    }

    /// Select the segment subsequent `bind` calls append to; its previous
    /// bindings are discarded
    pub(crate) fn begin(&mut self, clause: Clause) {
        self.current = clause;
        self.bindings[clause.index()].clear();
    }

    pub(crate) fn bind(&mut self, value: Scalar) {
        self.bindings[self.current.index()].push(value);
    }

    /// Bindings of one segment
    pub fn clause_bindings(&self, clause: Clause) -> &[Scalar] {
        &self.bindings[clause.index()]
    }

    /// All bindings in placeholder order
    pub fn bindings(&self) -> Vec<Scalar> {
        let statement = &self.bindings[Clause::Statement.index()];
        if !statement.is_empty() {
            return statement.clone();
        }

        Clause::BINDING_ORDER
            .iter()
            .flat_map(|clause| self.bindings[clause.index()].iter().cloned())
            .collect()
    }

    /// Release every fragment and binding, regardless of the compiling flag
    pub fn release(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_compile() {
        let mut state = CompilerState::new();
        assert!(state.needs_compile(Clause::Where));

        state.store_part(Clause::Where, " WHERE a = ?".into());
        assert!(!state.needs_compile(Clause::Where));
        assert_eq!(state.part(Clause::Where), Some(" WHERE a = ?"));
    }

    #[test]
    fn test_bindings_merge_in_clause_order() {
        let mut state = CompilerState::new();

        // Compiled out of textual order
        state.begin(Clause::Orders);
        state.bind(Scalar::Integer(5));
        state.begin(Clause::Where);
        state.bind(Scalar::Integer(3));
        state.bind(Scalar::Integer(4));
        state.begin(Clause::Columns);
        state.bind(Scalar::Integer(1));
        state.begin(Clause::Joins);
        state.bind(Scalar::Integer(2));

        let merged: Vec<Scalar> = (1..=5).map(Scalar::Integer).collect();
        assert_eq!(state.bindings(), merged);
    }

    #[test]
    fn test_statement_segment_is_used_directly() {
        let mut state = CompilerState::new();
        state.begin(Clause::Statement);
        state.bind(Scalar::from("x"));
        assert_eq!(state.bindings(), vec![Scalar::from("x")]);
    }

    #[test]
    fn test_invalidate_selected_clause() {
        let mut state = CompilerState::new();
        state.begin(Clause::Where);
        state.bind(Scalar::Integer(1));
        state.store_part(Clause::Where, " WHERE a = ?".into());
        state.begin(Clause::Orders);
        state.bind(Scalar::Integer(2));
        state.store_part(Clause::Orders, " ORDER BY b".into());
        state.set_compiled("SELECT".into());

        state.invalidate(&[Clause::Where]);

        assert!(state.needs_compile(Clause::Where));
        assert!(state.clause_bindings(Clause::Where).is_empty());
        assert!(!state.needs_compile(Clause::Orders));
        assert_eq!(state.clause_bindings(Clause::Orders), &[Scalar::Integer(2)]);
        assert!(state.compiled().is_none());
    }

    #[test]
    fn test_invalidate_is_noop_while_compiling() {
        let mut state = CompilerState::new();
        state.store_part(Clause::Columns, "SELECT *".into());
        state.set_compiled("SELECT *".into());
        state.set_compiling(true);

        state.invalidate(&[]);

        assert!(!state.needs_compile(Clause::Columns));
        assert_eq!(state.compiled(), Some("SELECT *"));

        state.set_compiling(false);
        state.invalidate(&[]);
        assert!(state.needs_compile(Clause::Columns));
        assert!(state.compiled().is_none());
    }

    #[test]
    fn test_discard_ignores_compiling_flag() {
        let mut state = CompilerState::new();
        state.store_part(Clause::Orders, " ORDER BY a ASC".into());
        state.store_part(Clause::From, " FROM t".into());
        state.set_compiling(true);

        state.discard(&Clause::JOIN_DEPENDENT);

        assert!(state.needs_compile(Clause::Orders));
        assert!(!state.needs_compile(Clause::From));
    }

    #[test]
    fn test_release() {
        let mut state = CompilerState::new();
        state.set_compiling(true);
        state.begin(Clause::Where);
        state.bind(Scalar::Null);
        state.release();
        assert!(!state.is_compiling());
        assert!(state.bindings().is_empty());
    }
}
