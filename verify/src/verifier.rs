//! Rule and rule-set verification.

use crate::lower::{lower_condition, LoweredCondition};
use edcheck_condition::{parse_condition, ConditionExpr};
use edcheck_core::{FindingKind, Rule, Specification, ValidationResult};
use edcheck_solver::{SatResult, Session, DEFAULT_EVAL_BUDGET};
use tracing::{debug, info, warn};

/// Verification limits.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Upper bound on the quadratic rule-pair sweep; pairs past the
    /// budget are skipped and reported in one warning log.
    pub max_rule_pairs: usize,
    /// Evaluation budget handed to each solver session.
    pub eval_budget: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_rule_pairs: 10_000,
            eval_budget: DEFAULT_EVAL_BUDGET,
        }
    }
}

/// Verifies rules for logical soundness and mutual consistency.
#[derive(Debug, Default)]
pub struct RuleVerifier {
    config: VerifierConfig,
}

impl RuleVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Verify a single rule: satisfiability, tautology, redundancy.
    pub fn verify_rule(&self, rule: &Rule, spec: &Specification) -> ValidationResult {
        let mut result = ValidationResult::new(&rule.id);

        if !rule.is_formalized() {
            result.add_warning(
                FindingKind::MissingCondition,
                format!("Rule {} has no formalized condition to verify", rule.id),
            );
            return result;
        }

        let condition = rule.effective_condition();
        let Some(expr) = parse_condition(condition) else {
            result.add_warning(
                FindingKind::ParseFailure,
                format!("Rule {} condition could not be parsed: {}", rule.id, condition),
            );
            return result;
        };

        let lowered = lower_condition(&expr, spec);
        let mut session = Session::with_budget(self.config.eval_budget);
        lowered.declare_into(&mut session);

        // Satisfiability.
        session.push();
        session.assert(lowered.term.clone());
        match session.check() {
            SatResult::Unsat => result.add_error(
                FindingKind::UnsatisfiableRule,
                format!("Rule {} is unsatisfiable (can never fire)", rule.id),
            ),
            SatResult::Unknown(reason) => result.add_warning(
                FindingKind::SolverInconclusive,
                format!("Satisfiability of rule {} undecided: {}", rule.id, reason),
            ),
            SatResult::Sat => {}
        }
        session.pop();

        // Tautology.
        session.push();
        session.assert(lowered.term.clone().not());
        match session.check() {
            SatResult::Unsat => result.add_warning(
                FindingKind::Tautology,
                format!("Rule {} is a tautology (always fires)", rule.id),
            ),
            SatResult::Unknown(reason) => result.add_warning(
                FindingKind::SolverInconclusive,
                format!("Tautology check for rule {} undecided: {}", rule.id, reason),
            ),
            SatResult::Sat => {}
        }
        session.pop();

        // Structural redundancy.
        if let Some(redundancy) = find_redundancy(&expr) {
            result.add_warning(
                FindingKind::RedundantCondition,
                format!("Rule {} contains redundant conditions: {}", rule.id, redundancy),
            );
        }

        debug!(rule = %rule.id, valid = result.is_valid, "verified rule");
        result
    }

    /// Verify a rule set: per-rule checks plus pairwise contradiction
    /// and implication sweeps.
    pub fn verify_rule_set(
        &self,
        rules: &[Rule],
        spec: &Specification,
    ) -> Vec<ValidationResult> {
        let mut results: Vec<ValidationResult> =
            rules.iter().map(|r| self.verify_rule(r, spec)).collect();

        let lowered: Vec<Option<LoweredCondition>> = rules
            .iter()
            .map(|rule| {
                if !rule.is_formalized() {
                    return None;
                }
                parse_condition(rule.effective_condition())
                    .map(|expr| lower_condition(&expr, spec))
            })
            .collect();

        let mut pairs_checked = 0usize;
        let mut pairs_skipped = 0usize;
        for i in 0..rules.len() {
            let Some(a) = &lowered[i] else { continue };
            for j in (i + 1)..rules.len() {
                let Some(b) = &lowered[j] else { continue };
                if pairs_checked >= self.config.max_rule_pairs {
                    pairs_skipped += 1;
                    continue;
                }
                pairs_checked += 1;
                self.check_pair(rules, &mut results, (i, a), (j, b));
            }
        }
        if pairs_skipped > 0 {
            warn!(
                skipped = pairs_skipped,
                budget = self.config.max_rule_pairs,
                "rule-pair budget exhausted; remaining pairs unchecked"
            );
        }

        info!(
            rules = rules.len(),
            pairs = pairs_checked,
            "verified rule set"
        );
        results
    }

    fn check_pair(
        &self,
        rules: &[Rule],
        results: &mut [ValidationResult],
        (i, a): (usize, &LoweredCondition),
        (j, b): (usize, &LoweredCondition),
    ) {
        let mut session = Session::with_budget(self.config.eval_budget);
        a.declare_into(&mut session);
        b.declare_into(&mut session);

        // Joint satisfiability.
        session.push();
        session.assert(a.term.clone());
        session.assert(b.term.clone());
        if session.check().is_unsat() {
            let message = format!(
                "Rules {} and {} are contradictory",
                rules[i].id, rules[j].id
            );
            results[i].add_error(FindingKind::ContradictoryRules, message.clone());
            results[j].add_error(FindingKind::ContradictoryRules, message);
        }
        session.pop();

        // a implies b?
        session.push();
        session.assert(a.term.clone());
        session.assert(b.term.clone().not());
        if session.check().is_unsat() {
            results[j].add_warning(
                FindingKind::ImpliedRule,
                format!("Rule {} is implied by rule {}", rules[j].id, rules[i].id),
            );
        }
        session.pop();

        // b implies a?
        session.push();
        session.assert(b.term.clone());
        session.assert(a.term.clone().not());
        if session.check().is_unsat() {
            results[i].add_warning(
                FindingKind::ImpliedRule,
                format!("Rule {} is implied by rule {}", rules[i].id, rules[j].id),
            );
        }
        session.pop();
    }
}

/// Structural redundancy inside a single connective: duplicated
/// members, or members that are direct negations of each other.
fn find_redundancy(expr: &ConditionExpr) -> Option<String> {
    match expr {
        ConditionExpr::And(parts) | ConditionExpr::Or(parts) => {
            for (i, a) in parts.iter().enumerate() {
                for b in parts.iter().skip(i + 1) {
                    if a == b {
                        return Some(format!("duplicate sub-condition {:?}", summary(a)));
                    }
                    if direct_negation(a, b) {
                        return Some(format!(
                            "directly contradictory sub-conditions {:?}",
                            summary(a)
                        ));
                    }
                }
            }
            parts.iter().find_map(find_redundancy)
        }
        ConditionExpr::Not(inner) => find_redundancy(inner),
        ConditionExpr::IfThenElse {
            cond,
            then,
            otherwise,
        } => find_redundancy(cond)
            .or_else(|| find_redundancy(then))
            .or_else(|| otherwise.as_deref().and_then(find_redundancy)),
        _ => None,
    }
}

fn direct_negation(a: &ConditionExpr, b: &ConditionExpr) -> bool {
    match (a, b) {
        (ConditionExpr::Comparison(x), ConditionExpr::Comparison(y)) => {
            x.lhs == y.lhs && x.rhs == y.rhs && x.op == y.op.negate()
        }
        (ConditionExpr::Not(inner), other) | (other, ConditionExpr::Not(inner)) => {
            inner.as_ref() == other
        }
        _ => false,
    }
}

fn summary(expr: &ConditionExpr) -> String {
    match expr {
        ConditionExpr::Comparison(cmp) => cmp.to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcheck_core::{Field, FieldType, Form};

    fn demographics_spec() -> Specification {
        Specification::new().with_form(
            Form::new("Demographics").with_field(Field::new("Age", FieldType::Numeric)),
        )
    }

    fn formalized(id: &str, condition: &str) -> Rule {
        Rule::new(id, condition).with_formalized(condition)
    }

    #[test]
    fn test_satisfiable_rule_is_valid() {
        let verifier = RuleVerifier::new();
        let rule = formalized("R1", "Demographics.Age >= 18");
        let result = verifier.verify_rule(&rule, &demographics_spec());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unsatisfiable_rule_flagged() {
        let verifier = RuleVerifier::new();
        let rule = formalized("R1", "Demographics.Age > 18 AND Demographics.Age < 10");
        let result = verifier.verify_rule(&rule, &demographics_spec());
        assert!(!result.is_valid);
        assert!(result.has_error(FindingKind::UnsatisfiableRule));
    }

    #[test]
    fn test_tautology_flagged_as_warning() {
        let verifier = RuleVerifier::new();
        let rule = formalized("R1", "Demographics.Age >= 18 OR Demographics.Age < 18");
        let result = verifier.verify_rule(&rule, &demographics_spec());
        assert!(result.is_valid);
        assert!(result.has_warning(FindingKind::Tautology));
    }

    #[test]
    fn test_redundant_duplicate_clause() {
        let verifier = RuleVerifier::new();
        let rule = formalized("R1", "Demographics.Age >= 18 AND Demographics.Age >= 18");
        let result = verifier.verify_rule(&rule, &demographics_spec());
        assert!(result.has_warning(FindingKind::RedundantCondition));
    }

    #[test]
    fn test_unformalized_rule_skipped() {
        let verifier = RuleVerifier::new();
        let rule = Rule::new("R1", "age looks wrong");
        let result = verifier.verify_rule(&rule, &demographics_spec());
        assert!(result.is_valid);
        assert!(result.has_warning(FindingKind::MissingCondition));
    }

    #[test]
    fn test_contradictory_pair_flagged_on_both() {
        let verifier = RuleVerifier::new();
        let rules = vec![
            formalized("R1", "Demographics.Age >= 18"),
            formalized("R2", "Demographics.Age < 18"),
        ];
        let results = verifier.verify_rule_set(&rules, &demographics_spec());
        assert!(results[0].has_error(FindingKind::ContradictoryRules));
        assert!(results[1].has_error(FindingKind::ContradictoryRules));
    }

    #[test]
    fn test_implication_warns_on_implied_rule() {
        let verifier = RuleVerifier::new();
        let rules = vec![
            formalized("R1", "Demographics.Age > 21"),
            formalized("R2", "Demographics.Age > 18"),
        ];
        let results = verifier.verify_rule_set(&rules, &demographics_spec());
        // Age > 21 implies Age > 18, so R2 is the implied rule.
        assert!(results[1].has_warning(FindingKind::ImpliedRule));
        assert!(!results[0].has_warning(FindingKind::ImpliedRule));
    }

    #[test]
    fn test_pair_budget_skips_excess_pairs() {
        let config = VerifierConfig {
            max_rule_pairs: 1,
            ..VerifierConfig::default()
        };
        let verifier = RuleVerifier::with_config(config);
        let rules = vec![
            formalized("R1", "Demographics.Age >= 18"),
            formalized("R2", "Demographics.Age < 18"),
            formalized("R3", "Demographics.Age > 100"),
        ];
        // Only the first pair is checked; no panic, no extra findings.
        let results = verifier.verify_rule_set(&rules, &demographics_spec());
        assert_eq!(results.len(), 3);
        assert!(results[0].has_error(FindingKind::ContradictoryRules));
    }
}
