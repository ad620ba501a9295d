//! Lowering of condition trees to solver formulas.

use edcheck_condition::{CompareOp, Comparison, ConditionExpr, FieldRef, Operand};
use edcheck_core::{FieldType, Specification, Value};
use edcheck_solver::{Sort, Term};

/// Sentinel string asserted on a field's presence shadow variable when
/// the field is null/missing.
pub const NULL_SENTINEL: &str = "\u{0}null";

/// A condition lowered to a solver formula plus the variable
/// declarations it relies on.
#[derive(Debug, Clone)]
pub struct LoweredCondition {
    pub term: Term,
    pub decls: Vec<(String, Sort)>,
}

impl LoweredCondition {
    /// Declare this condition's variables into a session.
    pub fn declare_into(&self, session: &mut edcheck_solver::Session) {
        for (name, sort) in &self.decls {
            session.declare(name.clone(), *sort);
        }
    }
}

/// Solver sort for a field reference, per the specification.
pub fn sort_for(field_ref: &FieldRef, spec: &Specification) -> Sort {
    match spec.field_type_or_text(&field_ref.form, &field_ref.field) {
        FieldType::Numeric => Sort::Real,
        // Dates and times live on an integer axis (units since epoch).
        FieldType::Date | FieldType::DateTime | FieldType::Time => Sort::Int,
        FieldType::Boolean => Sort::Bool,
        FieldType::Categorical | FieldType::Text => Sort::Str,
    }
}

/// Lower a condition tree to a solver formula.
pub fn lower_condition(expr: &ConditionExpr, spec: &Specification) -> LoweredCondition {
    let mut decls = Vec::new();
    let term = lower_expr(expr, spec, &mut decls);
    LoweredCondition { term, decls }
}

fn declare(decls: &mut Vec<(String, Sort)>, name: String, sort: Sort) {
    if !decls.iter().any(|(n, _)| *n == name) {
        decls.push((name, sort));
    }
}

fn lower_expr(expr: &ConditionExpr, spec: &Specification, decls: &mut Vec<(String, Sort)>) -> Term {
    match expr {
        ConditionExpr::Comparison(cmp) => lower_comparison(cmp, spec, decls),
        ConditionExpr::And(parts) => Term::and(
            parts
                .iter()
                .map(|p| lower_expr(p, spec, decls))
                .collect(),
        ),
        ConditionExpr::Or(parts) => Term::or(
            parts
                .iter()
                .map(|p| lower_expr(p, spec, decls))
                .collect(),
        ),
        ConditionExpr::Not(inner) => lower_expr(inner, spec, decls).not(),
        ConditionExpr::IfThenElse {
            cond,
            then,
            otherwise,
        } => {
            let cond = lower_expr(cond, spec, decls);
            let then = lower_expr(then, spec, decls);
            let otherwise = otherwise
                .as_ref()
                .map(|e| lower_expr(e, spec, decls))
                .unwrap_or(Term::bool_lit(true));
            Term::ite(cond, then, otherwise)
        }
        ConditionExpr::IsNull { field, negated } => {
            let shadow = presence_var(field);
            declare(decls, shadow.clone(), Sort::Str);
            let eq = Term::var(shadow).eq(Term::str_lit(NULL_SENTINEL));
            if *negated {
                eq.not()
            } else {
                eq
            }
        }
        ConditionExpr::InSet {
            field,
            values,
            negated,
        } => {
            let name = field.to_string();
            declare(decls, name.clone(), sort_for(field, spec));
            let membership = Term::or(
                values
                    .iter()
                    .map(|v| Term::var(name.clone()).eq(Term::str_lit(v.clone())))
                    .collect(),
            );
            if *negated {
                membership.not()
            } else {
                membership
            }
        }
        ConditionExpr::Between { field, lo, hi } => {
            let name = field.to_string();
            declare(decls, name.clone(), sort_for(field, spec));
            Term::and(vec![
                Term::var(name.clone()).ge(Term::num(*lo)),
                Term::var(name).le(Term::num(*hi)),
            ])
        }
    }
}

fn lower_comparison(cmp: &Comparison, spec: &Specification, decls: &mut Vec<(String, Sort)>) -> Term {
    let lhs = lower_operand(&cmp.lhs, &cmp.rhs, spec, decls);
    let rhs = lower_operand(&cmp.rhs, &cmp.lhs, spec, decls);
    match cmp.op {
        CompareOp::Eq => lhs.eq(rhs),
        CompareOp::Ne => lhs.ne(rhs),
        CompareOp::Lt => lhs.lt(rhs),
        CompareOp::Le => lhs.le(rhs),
        CompareOp::Gt => lhs.gt(rhs),
        CompareOp::Ge => lhs.ge(rhs),
    }
}

/// Lower one operand. The opposite operand supplies typing context:
/// a text literal facing a date-typed field becomes epoch days.
fn lower_operand(
    operand: &Operand,
    other: &Operand,
    spec: &Specification,
    decls: &mut Vec<(String, Sort)>,
) -> Term {
    match operand {
        Operand::Field(field_ref) => {
            let name = field_ref.to_string();
            declare(decls, name.clone(), sort_for(field_ref, spec));
            Term::var(name)
        }
        Operand::Number(n) => Term::num(*n),
        Operand::Text(s) => {
            if let Operand::Field(field_ref) = other {
                if sort_for(field_ref, spec) == Sort::Int {
                    if let Some(days) = Value::date_from_iso(s).and_then(|v| v.as_date_days()) {
                        return Term::num(days as f64);
                    }
                }
            }
            Term::str_lit(s.clone())
        }
        Operand::Flag(b) => Term::bool_lit(*b),
    }
}

/// Name of the presence shadow variable for a field.
pub fn presence_var(field: &FieldRef) -> String {
    format!("{}\u{0}presence", field)
}
