//! Generated test cases.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which generation technique produced a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    Metamorphic,
    Symbolic,
    Adversarial,
    Causal,
    Llm,
}

impl Technique {
    /// All techniques, in pipeline order.
    pub const ALL: [Technique; 5] = [
        Technique::Metamorphic,
        Technique::Symbolic,
        Technique::Adversarial,
        Technique::Causal,
        Technique::Llm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Metamorphic => "metamorphic",
            Technique::Symbolic => "symbolic",
            Technique::Adversarial => "adversarial",
            Technique::Causal => "causal",
            Technique::Llm => "llm",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test data: form name -> field name -> value.
///
/// Every `test_data[form][field]` path must reference a field declared
/// in the specification for a form the owning rule reads from.
pub type TestData = BTreeMap<String, BTreeMap<String, Value>>;

/// A generated test case for a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub rule_id: String,
    pub description: String,
    /// Whether the rule condition is expected to hold on this data.
    pub expected_result: bool,
    pub test_data: TestData,
    pub technique: Technique,
    pub is_positive: bool,
}

impl TestCase {
    pub fn new(
        rule_id: impl Into<String>,
        description: impl Into<String>,
        expected_result: bool,
        test_data: TestData,
        technique: Technique,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            description: description.into(),
            expected_result,
            test_data,
            technique,
            is_positive: expected_result,
        }
    }

    /// Value at a form/field path, if present.
    pub fn value(&self, form: &str, field: &str) -> Option<&Value> {
        self.test_data.get(form)?.get(field)
    }

    /// Set a value at a form/field path, creating the form entry.
    pub fn set_value(&mut self, form: &str, field: &str, value: Value) {
        self.test_data
            .entry(form.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }
}

/// Build a single-path test data map.
pub fn single_value(form: &str, field: &str, value: Value) -> TestData {
    let mut data = TestData::new();
    data.entry(form.to_string())
        .or_default()
        .insert(field.to_string(), value);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technique_labels() {
        assert_eq!(Technique::Metamorphic.as_str(), "metamorphic");
        assert_eq!(Technique::Llm.to_string(), "llm");
        assert_eq!(Technique::ALL.len(), 5);
    }

    #[test]
    fn test_value_paths() {
        let data = single_value("VitalSigns", "SystolicBP", Value::Int(120));
        let mut case = TestCase::new("R1", "positive", true, data, Technique::Symbolic);

        assert_eq!(
            case.value("VitalSigns", "SystolicBP"),
            Some(&Value::Int(120))
        );
        assert_eq!(case.value("VitalSigns", "DiastolicBP"), None);

        case.set_value("VitalSigns", "DiastolicBP", Value::Int(80));
        assert_eq!(
            case.value("VitalSigns", "DiastolicBP"),
            Some(&Value::Int(80))
        );
        assert!(case.is_positive);
    }
}
