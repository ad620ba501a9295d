//! Scoped solver sessions.

use crate::search;
use crate::terms::{Sort, Term};
use crate::DEFAULT_EVAL_BUDGET;
use std::collections::HashMap;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The check could not be decided; carries the reason. Callers
    /// treat this as a warning, never an error.
    Unknown(String),
}

impl SatResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat)
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SatResult::Unsat)
    }
}

/// A satisfying assignment extracted from a `Sat` result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

/// A concrete value in a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Model {
    pub fn get_num(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ModelValue::Num(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ModelValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// A solver session: declarations plus an assertion stack with
/// explicit push/pop scopes.
///
/// One session per logical check. The session owns all its state, so
/// independent checks can never leak constraints into each other.
#[derive(Debug)]
pub struct Session {
    decls: Vec<(String, Sort)>,
    assertions: Vec<Term>,
    /// Stack of (decl_len, assertion_len) snapshots.
    frames: Vec<(usize, usize)>,
    eval_budget: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session with the default evaluation budget.
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_EVAL_BUDGET)
    }

    /// Create a session with an explicit evaluation budget.
    pub fn with_budget(eval_budget: usize) -> Self {
        Self {
            decls: Vec::new(),
            assertions: Vec::new(),
            frames: Vec::new(),
            eval_budget,
        }
    }

    /// Declare a variable. Re-declaring a name keeps the first sort.
    pub fn declare(&mut self, name: impl Into<String>, sort: Sort) {
        let name = name.into();
        if !self.decls.iter().any(|(n, _)| *n == name) {
            self.decls.push((name, sort));
        }
    }

    /// Sort of a declared variable.
    pub fn sort_of(&self, name: &str) -> Option<Sort> {
        self.decls
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }

    /// Assert a constraint in the current scope.
    pub fn assert(&mut self, term: Term) {
        self.assertions.push(term);
    }

    /// Push a new scope.
    pub fn push(&mut self) {
        self.frames.push((self.decls.len(), self.assertions.len()));
    }

    /// Pop the innermost scope, dropping its declarations and
    /// assertions. Popping with no open scope clears everything.
    pub fn pop(&mut self) {
        let (decl_len, assert_len) = self.frames.pop().unwrap_or((0, 0));
        self.decls.truncate(decl_len);
        self.assertions.truncate(assert_len);
    }

    /// Check satisfiability of the current assertion conjunction.
    pub fn check(&self) -> SatResult {
        self.check_with_model().0
    }

    /// Check satisfiability and extract a model when satisfiable.
    pub fn check_with_model(&self) -> (SatResult, Option<Model>) {
        search::solve(&self.decls, &self.assertions, self.eval_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sat() {
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.assert(Term::var("x").gt(Term::num(5.0)));

        let (result, model) = session.check_with_model();
        assert!(result.is_sat());
        let model = model.unwrap();
        assert!(model.get_num("x").unwrap() > 5.0);
    }

    #[test]
    fn test_simple_unsat() {
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.assert(Term::var("x").gt(Term::num(5.0)));
        session.assert(Term::var("x").lt(Term::num(3.0)));
        assert!(session.check().is_unsat());
    }

    #[test]
    fn test_push_pop_isolation() {
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.assert(Term::var("x").gt(Term::num(5.0)));

        session.push();
        session.assert(Term::var("x").lt(Term::num(3.0)));
        assert!(session.check().is_unsat());
        session.pop();

        // The inner contradiction is gone after the pop.
        assert!(session.check().is_sat());
    }

    #[test]
    fn test_var_to_var_comparison() {
        let mut session = Session::new();
        session.declare("s", Sort::Real);
        session.declare("d", Sort::Real);
        session.assert(Term::var("s").le(Term::var("d")));

        let (result, model) = session.check_with_model();
        assert!(result.is_sat());
        let model = model.unwrap();
        assert!(model.get_num("s").unwrap() <= model.get_num("d").unwrap());
    }

    #[test]
    fn test_open_interval_between_literals() {
        // x > 1 AND x < 2 has real solutions but no integer ones.
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.assert(Term::var("x").gt(Term::num(1.0)));
        session.assert(Term::var("x").lt(Term::num(2.0)));
        assert!(session.check().is_sat());

        let mut session = Session::new();
        session.declare("n", Sort::Int);
        session.assert(Term::var("n").gt(Term::num(1.0)));
        session.assert(Term::var("n").lt(Term::num(2.0)));
        assert!(session.check().is_unsat());
    }

    #[test]
    fn test_string_equality() {
        let mut session = Session::new();
        session.declare("sex", Sort::Str);
        session.assert(Term::var("sex").eq(Term::str_lit("Male")));

        let (result, model) = session.check_with_model();
        assert!(result.is_sat());
        assert_eq!(model.unwrap().get_str("sex"), Some("Male"));

        // A variable can always differ from every literal.
        let mut session = Session::new();
        session.declare("sex", Sort::Str);
        session.assert(Term::var("sex").ne(Term::str_lit("Male")));
        session.assert(Term::var("sex").ne(Term::str_lit("Female")));
        assert!(session.check().is_sat());
    }

    #[test]
    fn test_tautology_negation_unsat() {
        // NOT (x = x is trivially true) via x >= 5 OR x < 5.
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.assert(
            Term::or(vec![
                Term::var("x").ge(Term::num(5.0)),
                Term::var("x").lt(Term::num(5.0)),
            ])
            .not(),
        );
        assert!(session.check().is_unsat());
    }

    #[test]
    fn test_implies_and_ite() {
        let mut session = Session::new();
        session.declare("x", Sort::Real);
        session.declare("flag", Sort::Bool);
        session.assert(Term::var("flag").implies(Term::var("x").gt(Term::num(0.0))));
        session.assert(Term::var("flag").eq(Term::bool_lit(true)));

        let (result, model) = session.check_with_model();
        assert!(result.is_sat());
        assert!(model.unwrap().get_num("x").unwrap() > 0.0);
    }
}
