//! Validation results and typed findings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind code for a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    /// The rule condition can never hold.
    UnsatisfiableRule,
    /// The rule condition always holds.
    Tautology,
    /// Duplicate or directly contradictory sub-clauses in one connective.
    RedundantCondition,
    /// Two rules can never both hold.
    ContradictoryRules,
    /// One rule's condition is implied by another's.
    ImpliedRule,
    /// The rule has no formalized condition to verify.
    MissingCondition,
    /// The condition could not be parsed into a checkable formula.
    ParseFailure,
    /// The solver could not decide a check within its budget.
    SolverInconclusive,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::UnsatisfiableRule => "unsatisfiable_rule",
            FindingKind::Tautology => "tautology",
            FindingKind::RedundantCondition => "redundant_condition",
            FindingKind::ContradictoryRules => "contradictory_rules",
            FindingKind::ImpliedRule => "implied_rule",
            FindingKind::MissingCondition => "missing_condition",
            FindingKind::ParseFailure => "parse_failure",
            FindingKind::SolverInconclusive => "solver_inconclusive",
        };
        f.write_str(name)
    }
}

/// A single typed finding on a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of verifying a single rule.
///
/// Any error forces `is_valid` to false; warnings never affect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_id: String,
    pub is_valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationResult {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error; the result becomes invalid.
    pub fn add_error(&mut self, kind: FindingKind, message: impl Into<String>) {
        self.errors.push(Finding::new(kind, message));
        self.is_valid = false;
    }

    /// Record a warning; validity is unchanged.
    pub fn add_warning(&mut self, kind: FindingKind, message: impl Into<String>) {
        self.warnings.push(Finding::new(kind, message));
    }

    /// True when an error of this kind is present.
    pub fn has_error(&self, kind: FindingKind) -> bool {
        self.errors.iter().any(|f| f.kind == kind)
    }

    /// True when a warning of this kind is present.
    pub fn has_warning(&self, kind: FindingKind) -> bool {
        self.warnings.iter().any(|f| f.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_invalidate() {
        let mut result = ValidationResult::new("R1");
        assert!(result.is_valid);

        result.add_warning(FindingKind::Tautology, "always true");
        assert!(result.is_valid);
        assert!(result.has_warning(FindingKind::Tautology));

        result.add_error(FindingKind::UnsatisfiableRule, "never true");
        assert!(!result.is_valid);
        assert!(result.has_error(FindingKind::UnsatisfiableRule));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(
            FindingKind::ContradictoryRules.to_string(),
            "contradictory_rules"
        );
        assert_eq!(FindingKind::ImpliedRule.to_string(), "implied_rule");
    }
}
