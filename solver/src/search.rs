//! Finite-model search over a literal-derived candidate grid.
//!
//! For the order-comparison fragment, a formula's truth under an
//! assignment depends only on how each variable sits relative to the
//! numeric literals and to the other variables. The grid therefore
//! contains every literal, a ladder of interior points per adjacent
//! literal pair (one rung per variable, so any strict ordering of
//! variables inside a gap is realizable), and matching ladders below
//! and above the extremes. String variables draw from the string
//! literals plus fresh tokens; booleans from both truth values.
//!
//! Exhausting the grid without a model is `Unsat`; running out of the
//! evaluation budget first is `Unknown`.

use crate::session::{Model, ModelValue, SatResult};
use crate::terms::{Sort, Term};
use std::collections::HashMap;

/// Decide satisfiability of the conjunction of `assertions`.
pub fn solve(
    decls: &[(String, Sort)],
    assertions: &[Term],
    eval_budget: usize,
) -> (SatResult, Option<Model>) {
    if assertions.is_empty() {
        return (SatResult::Sat, Some(Model::default()));
    }

    // Referenced-but-undeclared variables default to Real.
    let mut vars: Vec<(String, Sort)> = decls.to_vec();
    let mut referenced = Vec::new();
    for term in assertions {
        term.collect_vars(&mut referenced);
    }
    for name in &referenced {
        if !vars.iter().any(|(n, _)| n == name) {
            vars.push((name.clone(), Sort::Real));
        }
    }
    // Declared-but-unreferenced variables do not constrain anything;
    // keeping them only widens the grid product.
    vars.retain(|(n, _)| referenced.iter().any(|r| r == n));

    if vars.is_empty() {
        // Ground formula: evaluate directly.
        let empty_index = HashMap::new();
        let env = Env {
            index: &empty_index,
            assignment: Vec::new(),
        };
        let holds = assertions.iter().all(|t| env.eval_bool(t));
        return if holds {
            (SatResult::Sat, Some(Model::default()))
        } else {
            (SatResult::Unsat, None)
        };
    }

    let mut num_literals = Vec::new();
    let mut str_literals = Vec::new();
    for term in assertions {
        term.collect_num_literals(&mut num_literals);
        term.collect_str_literals(&mut str_literals);
    }
    num_literals.retain(|n| n.is_finite());
    num_literals.sort_by(f64::total_cmp);
    num_literals.dedup();
    str_literals.sort();

    let ladder = vars.len().max(1);
    let candidates: Vec<Vec<ModelValue>> = vars
        .iter()
        .map(|(_, sort)| match sort {
            Sort::Real => real_candidates(&num_literals, ladder),
            Sort::Int => int_candidates(&num_literals, ladder),
            Sort::Str => str_candidates(&str_literals, ladder),
            Sort::Bool => vec![ModelValue::Bool(false), ModelValue::Bool(true)],
        })
        .collect();

    let index: HashMap<&str, usize> = vars
        .iter()
        .enumerate()
        .map(|(i, (n, _))| (n.as_str(), i))
        .collect();

    // Odometer enumeration, deterministic order.
    let mut cursor = vec![0usize; vars.len()];
    let mut evaluated = 0usize;
    loop {
        let env = Env {
            index: &index,
            assignment: cursor
                .iter()
                .enumerate()
                .map(|(i, &c)| &candidates[i][c])
                .collect(),
        };
        if assertions.iter().all(|t| env.eval_bool(t)) {
            let model = Model {
                values: vars
                    .iter()
                    .enumerate()
                    .map(|(i, (n, _))| (n.clone(), candidates[i][cursor[i]].clone()))
                    .collect(),
            };
            return (SatResult::Sat, Some(model));
        }

        evaluated += 1;
        if evaluated >= eval_budget {
            return (
                SatResult::Unknown("evaluation budget exhausted".to_string()),
                None,
            );
        }

        // Advance the odometer; the last variable spins fastest.
        let mut pos = vars.len();
        loop {
            if pos == 0 {
                return (SatResult::Unsat, None);
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < candidates[pos].len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
}

fn real_candidates(literals: &[f64], ladder: usize) -> Vec<ModelValue> {
    let mut points = Vec::new();
    if literals.is_empty() {
        for k in -(ladder as i64)..=(ladder as i64) {
            points.push(k as f64);
        }
    } else {
        points.extend_from_slice(literals);
        for pair in literals.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            for k in 1..=ladder {
                points.push(a + (b - a) * k as f64 / (ladder + 1) as f64);
            }
        }
        let (min, max) = (literals[0], literals[literals.len() - 1]);
        for k in 1..=ladder {
            points.push(min - k as f64);
            points.push(max + k as f64);
        }
    }
    points.sort_by(f64::total_cmp);
    points.dedup();
    points.into_iter().map(ModelValue::Num).collect()
}

fn int_candidates(literals: &[f64], ladder: usize) -> Vec<ModelValue> {
    let mut points: Vec<i64> = Vec::new();
    if literals.is_empty() {
        points.extend(-(ladder as i64)..=(ladder as i64));
    } else {
        for &l in literals {
            let (lo, hi) = (l.floor() as i64, l.ceil() as i64);
            for k in 0..=(ladder as i64) {
                points.push(lo - k);
                points.push(lo + k);
                points.push(hi - k);
                points.push(hi + k);
            }
        }
        for pair in literals.windows(2) {
            points.push(((pair[0] + pair[1]) / 2.0).floor() as i64);
        }
    }
    points.sort_unstable();
    points.dedup();
    points.into_iter().map(|n| ModelValue::Num(n as f64)).collect()
}

fn str_candidates(literals: &[String], ladder: usize) -> Vec<ModelValue> {
    let mut values: Vec<String> = literals.to_vec();
    for k in 0..ladder {
        values.push(format!("__fresh_{}", k));
    }
    values.dedup();
    values.into_iter().map(ModelValue::Str).collect()
}

/// An assignment under evaluation.
struct Env<'a> {
    index: &'a HashMap<&'a str, usize>,
    assignment: Vec<&'a ModelValue>,
}

impl<'a> Env<'a> {
    fn value_of(&self, term: &'a Term) -> Option<ModelValue> {
        match term {
            Term::Var(name) => self
                .index
                .get(name.as_str())
                .map(|&i| self.assignment[i].clone()),
            Term::NumLit(n) => Some(ModelValue::Num(*n)),
            Term::StrLit(s) => Some(ModelValue::Str(s.clone())),
            Term::BoolLit(b) => Some(ModelValue::Bool(*b)),
            _ => self.try_eval_bool(term).map(ModelValue::Bool),
        }
    }

    /// Evaluate a term in boolean position. Non-boolean or unresolvable
    /// terms evaluate to false (fail closed).
    fn eval_bool(&self, term: &'a Term) -> bool {
        self.try_eval_bool(term).unwrap_or(false)
    }

    fn try_eval_bool(&self, term: &'a Term) -> Option<bool> {
        match term {
            Term::BoolLit(b) => Some(*b),
            Term::Var(name) => {
                let i = self.index.get(name.as_str())?;
                match self.assignment[*i] {
                    ModelValue::Bool(b) => Some(*b),
                    _ => None,
                }
            }
            Term::Eq(a, b) => Some(self.compare(a, b, Cmp::Eq)),
            Term::Ne(a, b) => Some(self.compare(a, b, Cmp::Ne)),
            Term::Lt(a, b) => Some(self.compare(a, b, Cmp::Lt)),
            Term::Le(a, b) => Some(self.compare(a, b, Cmp::Le)),
            Term::Gt(a, b) => Some(self.compare(a, b, Cmp::Gt)),
            Term::Ge(a, b) => Some(self.compare(a, b, Cmp::Ge)),
            Term::And(terms) => Some(terms.iter().all(|t| self.eval_bool(t))),
            Term::Or(terms) => Some(terms.iter().any(|t| self.eval_bool(t))),
            Term::Not(inner) => Some(!self.eval_bool(inner)),
            Term::Implies(a, b) => Some(!self.eval_bool(a) || self.eval_bool(b)),
            Term::Ite(c, t, e) => Some(if self.eval_bool(c) {
                self.eval_bool(t)
            } else {
                self.eval_bool(e)
            }),
            Term::NumLit(_) | Term::StrLit(_) => None,
        }
    }

    fn compare(&self, a: &'a Term, b: &'a Term, cmp: Cmp) -> bool {
        let (Some(a), Some(b)) = (self.value_of(a), self.value_of(b)) else {
            return matches!(cmp, Cmp::Ne);
        };
        match (&a, &b) {
            (ModelValue::Num(x), ModelValue::Num(y)) => match cmp {
                Cmp::Eq => x == y,
                Cmp::Ne => x != y,
                Cmp::Lt => x < y,
                Cmp::Le => x <= y,
                Cmp::Gt => x > y,
                Cmp::Ge => x >= y,
            },
            (ModelValue::Str(x), ModelValue::Str(y)) => match cmp {
                Cmp::Eq => x == y,
                Cmp::Ne => x != y,
                // Ordered operators are undefined on strings.
                _ => false,
            },
            (ModelValue::Bool(x), ModelValue::Bool(y)) => match cmp {
                Cmp::Eq => x == y,
                Cmp::Ne => x != y,
                _ => false,
            },
            // Sort mismatch: equal never, different always.
            _ => matches!(cmp, Cmp::Ne),
        }
    }
}

#[derive(Clone, Copy)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
