//! Multi-modal verification of candidate test cases.
//!
//! Each candidate is re-checked through up to three independent
//! opinions: a solver re-check of the grounded rule formula, a direct
//! evaluation through the condition model's sandboxed evaluator, and a
//! cross-check against related rules. A candidate with no opinions is
//! discarded; otherwise it survives only on a strict majority.

use edcheck_condition::{
    evaluate, extract_field_references, parse_condition, ConditionExpr, FieldRef,
};
use edcheck_core::{Rule, Specification, TestCase, Value};
use edcheck_solver::{SatResult, Session, Sort, Term, DEFAULT_EVAL_BUDGET};
use edcheck_verify::{lower_condition, NULL_SENTINEL};
use tracing::{debug, info};

/// Verifies candidate test cases by majority vote.
pub struct MultiModalVerifier<'a> {
    related_rules: &'a [Rule],
    eval_budget: usize,
}

impl Default for MultiModalVerifier<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiModalVerifier<'static> {
    pub fn new() -> Self {
        Self {
            related_rules: &[],
            eval_budget: DEFAULT_EVAL_BUDGET,
        }
    }
}

impl<'a> MultiModalVerifier<'a> {
    /// Enable cross-validation against the given rule set.
    pub fn with_related_rules(rules: &'a [Rule]) -> Self {
        Self {
            related_rules: rules,
            eval_budget: DEFAULT_EVAL_BUDGET,
        }
    }

    pub fn with_budget(mut self, eval_budget: usize) -> Self {
        self.eval_budget = eval_budget;
        self
    }

    /// Filter candidates down to those a strict majority of the
    /// returned opinions consider valid, annotating survivors with the
    /// vote tally.
    pub fn verify(
        &self,
        rule: &Rule,
        spec: &Specification,
        candidates: Vec<TestCase>,
    ) -> Vec<TestCase> {
        let total = candidates.len();
        let mut kept = Vec::new();
        for mut candidate in candidates {
            let opinions: Vec<bool> = [
                self.solver_opinion(rule, spec, &candidate),
                self.direct_opinion(rule, &candidate),
                self.cross_opinion(rule, &candidate),
            ]
            .into_iter()
            .flatten()
            .collect();

            if opinions.is_empty() {
                debug!(rule = %rule.id, description = %candidate.description, "no opinions; discarding");
                continue;
            }
            let valid = opinions.iter().filter(|&&o| o).count();
            let invalid = opinions.len() - valid;
            if valid > invalid {
                candidate.description =
                    format!("{} [verified {}/{}]", candidate.description, valid, opinions.len());
                kept.push(candidate);
            }
        }
        info!(
            rule = %rule.id,
            kept = kept.len(),
            candidates = total,
            "multi-modal verification complete"
        );
        kept
    }

    /// Opinion 1: ground the rule formula with the test data as
    /// equality bindings and ask the solver for the formula's truth.
    ///
    /// Truth is established only when exactly one of `bindings AND f` /
    /// `bindings AND NOT f` is satisfiable; anything else (unbound
    /// variables, unrepresentable values, budget exhaustion) yields no
    /// opinion.
    fn solver_opinion(
        &self,
        rule: &Rule,
        spec: &Specification,
        candidate: &TestCase,
    ) -> Option<bool> {
        if !rule.is_formalized() {
            return None;
        }
        let expr = parse_condition(rule.effective_condition())?;
        let lowered = lower_condition(&expr, spec);

        let mut session = Session::with_budget(self.eval_budget);
        lowered.declare_into(&mut session);
        for (name, sort) in &lowered.decls {
            if let Some(binding) = binding_term(name, *sort, candidate) {
                session.assert(binding);
            }
        }

        session.push();
        session.assert(lowered.term.clone());
        let positive = session.check();
        session.pop();

        session.push();
        session.assert(lowered.term.clone().not());
        let negative = session.check();
        session.pop();

        let truth = match (positive, negative) {
            (SatResult::Sat, SatResult::Unsat) => true,
            (SatResult::Unsat, SatResult::Sat) => false,
            _ => return None,
        };
        Some(truth == candidate.expected_result)
    }

    /// Opinion 2: direct evaluation through the sandboxed evaluator.
    fn direct_opinion(&self, rule: &Rule, candidate: &TestCase) -> Option<bool> {
        let expr = parse_condition(rule.effective_condition())?;
        let truth = evaluate(&expr, &candidate.test_data)?;
        Some(truth == candidate.expected_result)
    }

    /// Opinion 3: cross-validation against related rules. Rules
    /// sharing a field reference whose condition is structurally
    /// identical to (or the direct negation of) this rule's. Returns
    /// no opinion when no such rule gives a definite evaluation.
    fn cross_opinion(&self, rule: &Rule, candidate: &TestCase) -> Option<bool> {
        let own_expr = parse_condition(rule.effective_condition())?;
        let own_refs = extract_field_references(rule.effective_condition());

        for related in self.related_rules {
            if related.id == rule.id {
                continue;
            }
            let shared = extract_field_references(related.effective_condition())
                .intersection(&own_refs)
                .next()
                .is_some();
            if !shared {
                continue;
            }
            let Some(related_expr) = parse_condition(related.effective_condition()) else {
                continue;
            };

            if related_expr == own_expr {
                let truth = evaluate(&related_expr, &candidate.test_data)?;
                return Some(truth == candidate.expected_result);
            }
            if is_negation(&related_expr, &own_expr) {
                let truth = evaluate(&related_expr, &candidate.test_data)?;
                return Some(truth != candidate.expected_result);
            }
        }
        None
    }
}

/// Equality binding for one declared variable, when the test data
/// carries a usable value for it. Presence shadow variables bind to
/// the null sentinel exactly when the field is absent or null.
fn binding_term(name: &str, sort: Sort, candidate: &TestCase) -> Option<Term> {
    if let Some(field) = name.strip_suffix("\u{0}presence") {
        let field_ref = FieldRef::parse(field)?;
        let present = matches!(
            candidate.value(&field_ref.form, &field_ref.field),
            Some(v) if !v.is_null()
        );
        let var = Term::var(name);
        return Some(if present {
            var.ne(Term::str_lit(NULL_SENTINEL))
        } else {
            var.eq(Term::str_lit(NULL_SENTINEL))
        });
    }

    let field_ref = FieldRef::parse(name)?;
    let value = candidate.value(&field_ref.form, &field_ref.field)?;
    let term = match value {
        Value::Int(i) => Term::num(*i as f64),
        Value::Float(f) => Term::num(*f),
        Value::Date(d) => Term::num(*d as f64),
        Value::Bool(b) => Term::bool_lit(*b),
        Value::String(s) => {
            // An ISO date string bound to a date-sorted variable lands
            // on the integer day axis.
            if sort == Sort::Int {
                match Value::date_from_iso(s) {
                    Some(Value::Date(d)) => Term::num(d as f64),
                    _ => Term::str_lit(s.clone()),
                }
            } else {
                Term::str_lit(s.clone())
            }
        }
        Value::Null => return None,
    };
    Some(Term::var(name).eq(term))
}

fn is_negation(a: &ConditionExpr, b: &ConditionExpr) -> bool {
    match (a, b) {
        (ConditionExpr::Not(inner), other) | (other, ConditionExpr::Not(inner)) => {
            inner.as_ref() == other
        }
        (ConditionExpr::Comparison(x), ConditionExpr::Comparison(y)) => {
            x.lhs == y.lhs && x.rhs == y.rhs && x.op == y.op.negate()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcheck_core::{single_value, Field, FieldType, Form, Technique};

    fn age_spec() -> Specification {
        Specification::new().with_form(
            Form::new("Demographics").with_field(Field::new("Age", FieldType::Numeric)),
        )
    }

    fn age_rule() -> Rule {
        Rule::new("AGE001", "adults only").with_formalized("Demographics.Age >= 18")
    }

    fn candidate(expected: bool, age: i64) -> TestCase {
        TestCase::new(
            "AGE001",
            "candidate",
            expected,
            single_value("Demographics", "Age", Value::Int(age)),
            Technique::Adversarial,
        )
    }

    #[test]
    fn test_consistent_candidate_survives() {
        let verifier = MultiModalVerifier::new();
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![candidate(true, 30)]);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].description.contains("[verified 2/2]"));
    }

    #[test]
    fn test_majority_discard_of_mislabeled_candidate() {
        // Data violating the condition but labeled expected=true: both
        // the solver and direct evaluation disagree with the label, so
        // the candidate is discarded.
        let verifier = MultiModalVerifier::new();
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![candidate(true, 12)]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_correctly_labeled_negative_survives() {
        let verifier = MultiModalVerifier::new();
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![candidate(false, 12)]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_zero_opinion_candidate_discarded() {
        // An unformalized, unparseable rule yields no opinions at all.
        let rule = Rule::new("FREE01", "the subject seems unwell");
        let verifier = MultiModalVerifier::new();
        let kept = verifier.verify(&rule, &age_spec(), vec![candidate(true, 30)]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_missing_field_grounds_through_direct_evaluation() {
        // Empty data fails the comparison under the direct evaluator
        // (missing fields fail closed), while the solver abstains
        // because the variable is unbound.
        let verifier = MultiModalVerifier::new();
        let empty = TestCase::new(
            "AGE001",
            "missing",
            false,
            Default::default(),
            Technique::Adversarial,
        );
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![empty]);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].description.contains("[verified 1/1]"));
    }

    #[test]
    fn test_cross_validation_against_duplicate_rule() {
        let rules = vec![
            age_rule(),
            Rule::new("AGE002", "duplicate").with_formalized("Demographics.Age >= 18"),
        ];
        let verifier = MultiModalVerifier::with_related_rules(&rules);
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![candidate(true, 30)]);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].description.contains("[verified 3/3]"));
    }

    #[test]
    fn test_cross_validation_against_negated_rule() {
        let rules = vec![
            age_rule(),
            Rule::new("AGE003", "minors").with_formalized("Demographics.Age < 18"),
        ];
        let verifier = MultiModalVerifier::with_related_rules(&rules);
        let kept = verifier.verify(&age_rule(), &age_spec(), vec![candidate(true, 30)]);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].description.contains("[verified 3/3]"));
    }
}
