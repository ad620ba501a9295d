//! External mutation-advisor boundary.
//!
//! A collaborator (typically a text-generation service) may propose
//! additional mutation scenarios. The boundary contract is strict:
//! implementations must not panic past `propose_mutations`, and
//! unavailability or malformed output is simply "no proposals"; it
//! must never abort the built-in strategies.

use edcheck_core::{Rule, Specification, TestData, Value};
use serde::Deserialize;

/// A scenario proposed by the advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedScenario {
    pub description: String,
    pub expected_result: bool,
    pub test_data: TestData,
}

/// External collaborator proposing mutation scenarios for a rule.
pub trait MutationAdvisor: Send + Sync {
    /// Propose scenarios for a rule. Returning an empty list means
    /// "no proposals"; implementations swallow their own failures.
    fn propose_mutations(&self, rule: &Rule, spec: &Specification) -> Vec<ProposedScenario>;
}

#[derive(Deserialize)]
struct ScenarioPayload {
    #[serde(default)]
    test_cases: Vec<ScenarioEntry>,
}

#[derive(Deserialize)]
struct ScenarioEntry {
    description: String,
    expected_result: bool,
    #[serde(default)]
    test_data: serde_json::Map<String, serde_json::Value>,
}

/// Parse a JSON scenario payload of the form
/// `{"test_cases": [{"description", "expected_result", "test_data"}]}`.
///
/// Malformed input yields an empty list, never an error.
pub fn parse_scenarios(payload: &str) -> Vec<ProposedScenario> {
    let Ok(parsed) = serde_json::from_str::<ScenarioPayload>(payload) else {
        return Vec::new();
    };
    parsed
        .test_cases
        .into_iter()
        .filter_map(|entry| {
            let mut data = TestData::new();
            for (form, fields) in &entry.test_data {
                let serde_json::Value::Object(fields) = fields else {
                    return None;
                };
                let slot = data.entry(form.clone()).or_default();
                for (field, value) in fields {
                    slot.insert(field.clone(), json_to_value(value));
                }
            }
            Some(ProposedScenario {
                description: entry.description,
                expected_result: entry.expected_result,
                test_data: data,
            })
        })
        .collect()
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => {
            Value::date_from_iso(s).unwrap_or_else(|| Value::String(s.clone()))
        }
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_payload() {
        let payload = r#"{
            "test_cases": [
                {
                    "description": "adult subject",
                    "expected_result": true,
                    "test_data": {"Demographics": {"Age": 30, "Sex": "Male"}}
                }
            ]
        }"#;
        let scenarios = parse_scenarios(payload);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].description, "adult subject");
        assert_eq!(
            scenarios[0].test_data["Demographics"]["Age"],
            Value::Int(30)
        );
    }

    #[test]
    fn test_iso_dates_are_promoted() {
        let payload = r#"{"test_cases": [{
            "description": "d",
            "expected_result": false,
            "test_data": {"Visit": {"StartDate": "2024-01-01"}}
        }]}"#;
        let scenarios = parse_scenarios(payload);
        assert!(scenarios[0].test_data["Visit"]["StartDate"].is_date());
    }

    #[test]
    fn test_malformed_payload_yields_nothing() {
        assert!(parse_scenarios("not json at all").is_empty());
        assert!(parse_scenarios("{}").is_empty());
        assert!(parse_scenarios(r#"{"test_cases": [{"description": "x"}]}"#).is_empty());
    }
}
