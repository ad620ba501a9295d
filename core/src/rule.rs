//! Edit-check rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an edit-check rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleSeverity {
    #[default]
    Error,
    Warning,
    Info,
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleSeverity::Error => "error",
            RuleSeverity::Warning => "warning",
            RuleSeverity::Info => "info",
        };
        f.write_str(name)
    }
}

/// An edit-check rule over case-report-form data.
///
/// Rules are immutable inputs produced by the out-of-scope parsing and
/// formalization stages. `formalized_condition` is the machine-checkable
/// logical expression (`Form.Field` references, `= != < <= > >=`,
/// `AND OR NOT`, `IF..THEN..ELSE`); when it is absent, verification and
/// symbolic generation skip the rule and the remaining techniques fall
/// back to the free-text `condition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// Free-text condition as authored in the study spreadsheet.
    pub condition: String,
    /// Formalized logical expression, filled in by the formalization stage.
    pub formalized_condition: Option<String>,
    /// Query message raised when the edit check fires.
    pub message: Option<String>,
    pub severity: RuleSeverity,
    /// Forms this rule reads from.
    pub forms: Vec<String>,
    /// Fields this rule reads from.
    pub fields: Vec<String>,
}

impl Rule {
    pub fn new(id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
            formalized_condition: None,
            message: None,
            severity: RuleSeverity::Error,
            forms: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_formalized(mut self, condition: impl Into<String>) -> Self {
        self.formalized_condition = Some(condition.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// The condition the generation techniques should work from:
    /// the formalized condition when present, the free text otherwise.
    pub fn effective_condition(&self) -> &str {
        self.formalized_condition
            .as_deref()
            .unwrap_or(&self.condition)
    }

    /// True when the rule can enter verification and symbolic paths.
    pub fn is_formalized(&self) -> bool {
        self.formalized_condition
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}
