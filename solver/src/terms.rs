//! Solver term representation.

/// Sort of a solver variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Real-valued (numeric fields).
    Real,
    /// Integer-valued (dates and times as units since an epoch).
    Int,
    /// String-valued (categorical and text fields).
    Str,
    /// Boolean-valued.
    Bool,
}

/// A solver term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Variable reference by name.
    Var(String),
    /// Numeric literal.
    NumLit(f64),
    /// String literal.
    StrLit(String),
    /// Boolean literal.
    BoolLit(bool),

    // Comparison
    Eq(Box<Term>, Box<Term>),
    Ne(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),

    // Boolean logic
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Box<Term>),
    Implies(Box<Term>, Box<Term>),

    // If-then-else over booleans
    Ite(Box<Term>, Box<Term>, Box<Term>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn num(n: f64) -> Self {
        Term::NumLit(n)
    }

    pub fn str_lit(s: impl Into<String>) -> Self {
        Term::StrLit(s.into())
    }

    pub fn bool_lit(b: bool) -> Self {
        Term::BoolLit(b)
    }

    pub fn eq(self, other: Term) -> Self {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn ne(self, other: Term) -> Self {
        Term::Ne(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Self {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Self {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Self {
        Term::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Term) -> Self {
        Term::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<Term>) -> Self {
        Term::And(terms)
    }

    pub fn or(terms: Vec<Term>) -> Self {
        Term::Or(terms)
    }

    pub fn not(self) -> Self {
        Term::Not(Box::new(self))
    }

    pub fn implies(self, other: Term) -> Self {
        Term::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Self {
        Term::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    /// Collect the variable names referenced by this term.
    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Term::Var(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Term::NumLit(_) | Term::StrLit(_) | Term::BoolLit(_) => {}
            Term::Eq(a, b)
            | Term::Ne(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Gt(a, b)
            | Term::Ge(a, b)
            | Term::Implies(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_vars(out);
                }
            }
            Term::Not(inner) => inner.collect_vars(out),
            Term::Ite(c, t, e) => {
                c.collect_vars(out);
                t.collect_vars(out);
                e.collect_vars(out);
            }
        }
    }

    /// Collect the numeric literals appearing in this term.
    pub fn collect_num_literals(&self, out: &mut Vec<f64>) {
        match self {
            Term::NumLit(n) => {
                if !out.iter().any(|x| x == n) {
                    out.push(*n);
                }
            }
            Term::Var(_) | Term::StrLit(_) | Term::BoolLit(_) => {}
            Term::Eq(a, b)
            | Term::Ne(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Gt(a, b)
            | Term::Ge(a, b)
            | Term::Implies(a, b) => {
                a.collect_num_literals(out);
                b.collect_num_literals(out);
            }
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_num_literals(out);
                }
            }
            Term::Not(inner) => inner.collect_num_literals(out),
            Term::Ite(c, t, e) => {
                c.collect_num_literals(out);
                t.collect_num_literals(out);
                e.collect_num_literals(out);
            }
        }
    }

    /// Collect the string literals appearing in this term.
    pub fn collect_str_literals(&self, out: &mut Vec<String>) {
        match self {
            Term::StrLit(s) => {
                if !out.iter().any(|x| x == s) {
                    out.push(s.clone());
                }
            }
            Term::Var(_) | Term::NumLit(_) | Term::BoolLit(_) => {}
            Term::Eq(a, b)
            | Term::Ne(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Gt(a, b)
            | Term::Ge(a, b)
            | Term::Implies(a, b) => {
                a.collect_str_literals(out);
                b.collect_str_literals(out);
            }
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_str_literals(out);
                }
            }
            Term::Not(inner) => inner.collect_str_literals(out),
            Term::Ite(c, t, e) => {
                c.collect_str_literals(out);
                t.collect_str_literals(out);
                e.collect_str_literals(out);
            }
        }
    }
}
