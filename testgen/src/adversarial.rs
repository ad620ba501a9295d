//! Adversarial test generation.
//!
//! Five independent mutation strategies over a rule's field references
//! and comparisons, plus an optional externally-advised path. Each
//! strategy is self-contained; the advisor path is skipped silently
//! when the collaborator is absent or unhelpful.

use crate::config::GeneratorConfig;
use crate::llm::MutationAdvisor;
use edcheck_condition::{extract_comparisons, CompareOp, Comparison, FieldRef, Operand};
use edcheck_core::{
    days_from_civil, single_value, FieldType, Rule, Specification, Technique, TestCase, TestData,
    Value,
};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Generates adversarial test cases.
pub struct AdversarialGenerator<'a> {
    config: GeneratorConfig,
    advisor: Option<&'a dyn MutationAdvisor>,
}

impl<'a> AdversarialGenerator<'a> {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            advisor: None,
        }
    }

    /// Attach an external mutation advisor.
    pub fn with_advisor(mut self, advisor: &'a dyn MutationAdvisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Run every strategy over the rule's references and comparisons.
    pub fn generate(
        &self,
        rule: &Rule,
        spec: &Specification,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let condition = rule.effective_condition();
        let comparisons = extract_comparisons(condition);
        let field_refs = referenced_fields(&comparisons);

        let mut tests = Vec::new();
        tests.extend(self.boundary_strategy(rule, spec, &comparisons));
        tests.extend(self.missing_value_strategy(rule, &field_refs));
        tests.extend(self.type_confusion_strategy(rule, spec, &field_refs));
        tests.extend(self.logical_inversion_strategy(rule, spec, &comparisons, rng));
        tests.extend(self.special_value_strategy(rule, spec, &field_refs));
        tests.extend(self.advisor_strategy(rule, spec));

        info!(
            rule = %rule.id,
            count = tests.len(),
            "generated adversarial test cases"
        );
        tests
    }

    /// Values exactly at each literal threshold and just past it on
    /// the failing side.
    fn boundary_strategy(
        &self,
        rule: &Rule,
        spec: &Specification,
        comparisons: &[Comparison],
    ) -> Vec<TestCase> {
        let eps = self.config.boundary_epsilon;
        let mut tests = Vec::new();
        for cmp in comparisons {
            let (Operand::Field(field_ref), Operand::Number(threshold)) = (&cmp.lhs, &cmp.rhs)
            else {
                continue;
            };
            if spec.field_type_or_text(&field_ref.form, &field_ref.field) != FieldType::Numeric {
                continue;
            }

            let probes: Vec<(f64, bool)> = match cmp.op {
                CompareOp::Gt | CompareOp::Ge => vec![
                    (*threshold, cmp.op.is_inclusive()),
                    (*threshold - eps, false),
                ],
                CompareOp::Lt | CompareOp::Le => vec![
                    (*threshold, cmp.op.is_inclusive()),
                    (*threshold + eps, false),
                ],
                CompareOp::Eq => vec![(*threshold - eps, false), (*threshold + eps, false)],
                CompareOp::Ne => vec![(*threshold, false)],
            };

            for (probe, expected) in probes {
                tests.push(TestCase::new(
                    &rule.id,
                    format!(
                        "Boundary test for rule {} with {}={}",
                        rule.id, field_ref, probe
                    ),
                    expected,
                    single_value(&field_ref.form, &field_ref.field, Value::Float(probe)),
                    Technique::Adversarial,
                ));
            }
        }
        tests
    }

    /// Each referenced field omitted from its form.
    fn missing_value_strategy(&self, rule: &Rule, field_refs: &BTreeSet<FieldRef>) -> Vec<TestCase> {
        field_refs
            .iter()
            .map(|field_ref| {
                let mut data = TestData::new();
                data.entry(field_ref.form.clone()).or_default();
                TestCase::new(
                    &rule.id,
                    format!(
                        "Missing value test for rule {} with {} missing",
                        rule.id, field_ref
                    ),
                    false,
                    data,
                    Technique::Adversarial,
                )
            })
            .collect()
    }

    /// A value of an incompatible semantic type for each field.
    fn type_confusion_strategy(
        &self,
        rule: &Rule,
        spec: &Specification,
        field_refs: &BTreeSet<FieldRef>,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for field_ref in field_refs {
            let confused = match spec.field_type_or_text(&field_ref.form, &field_ref.field) {
                FieldType::Numeric => Value::String("not_a_number".into()),
                FieldType::Date | FieldType::DateTime | FieldType::Time => {
                    Value::String("not_a_date".into())
                }
                FieldType::Categorical => Value::String("invalid_category".into()),
                FieldType::Boolean => Value::String("not_a_boolean".into()),
                FieldType::Text => Value::Int(12345),
            };
            tests.push(TestCase::new(
                &rule.id,
                format!(
                    "Type confusion test for rule {} with {}={}",
                    rule.id, field_ref, confused
                ),
                false,
                single_value(&field_ref.form, &field_ref.field, confused),
                Technique::Adversarial,
            ));
        }
        tests
    }

    /// A value one unit against the operator's direction. Only `!=`
    /// has a computable expected result; everything else is left false
    /// for the verifier to prune.
    fn logical_inversion_strategy(
        &self,
        rule: &Rule,
        spec: &Specification,
        comparisons: &[Comparison],
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for cmp in comparisons {
            let Operand::Field(field_ref) = &cmp.lhs else {
                continue;
            };
            let field_type = spec.field_type_or_text(&field_ref.form, &field_ref.field);
            let expected = cmp.op == CompareOp::Ne;

            let inverted = match (&cmp.rhs, field_type) {
                (Operand::Number(threshold), FieldType::Numeric) => {
                    let value = match cmp.op {
                        CompareOp::Gt | CompareOp::Ge => threshold - 1.0,
                        CompareOp::Lt | CompareOp::Le => threshold + 1.0,
                        CompareOp::Eq => threshold + 1.0,
                        CompareOp::Ne => *threshold,
                    };
                    Value::Float(value)
                }
                (Operand::Text(expected_value), FieldType::Categorical) => {
                    let valid = spec.valid_values(&field_ref.form, &field_ref.field);
                    let others: Vec<&String> =
                        valid.iter().filter(|v| *v != expected_value).collect();
                    if others.is_empty() {
                        continue;
                    }
                    Value::String(others[rng.gen_range(0..others.len())].clone())
                }
                _ => continue,
            };

            tests.push(TestCase::new(
                &rule.id,
                format!(
                    "Logical inversion test for rule {} with {}={}",
                    rule.id, field_ref, inverted
                ),
                expected,
                single_value(&field_ref.form, &field_ref.field, inverted),
                Technique::Adversarial,
            ));
        }
        tests
    }

    /// Type-specific edge constants.
    fn special_value_strategy(
        &self,
        rule: &Rule,
        spec: &Specification,
        field_refs: &BTreeSet<FieldRef>,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for field_ref in field_refs {
            let values: Vec<Value> =
                match spec.field_type_or_text(&field_ref.form, &field_ref.field) {
                    FieldType::Numeric => vec![
                        Value::Int(0),
                        Value::Int(-1),
                        Value::Float(f64::INFINITY),
                        Value::Float(f64::NEG_INFINITY),
                        Value::Float(f64::NAN),
                    ],
                    FieldType::Date => vec![
                        Value::Date(days_from_civil(1900, 1, 1)),
                        Value::Date(days_from_civil(2100, 12, 31)),
                    ],
                    FieldType::Text => ["", " ", "NULL", "null", "None", "undefined"]
                        .iter()
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                    FieldType::Categorical => ["", " ", "OTHER", "Unknown"]
                        .iter()
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };

            for value in values {
                tests.push(TestCase::new(
                    &rule.id,
                    format!(
                        "Special value test for rule {} with {}={}",
                        rule.id, field_ref, value
                    ),
                    false,
                    single_value(&field_ref.form, &field_ref.field, value),
                    Technique::Adversarial,
                ));
            }
        }
        tests
    }

    /// The optional externally-advised path. Failure here must never
    /// abort the five built-in strategies.
    fn advisor_strategy(&self, rule: &Rule, spec: &Specification) -> Vec<TestCase> {
        let Some(advisor) = self.advisor else {
            return Vec::new();
        };
        let scenarios = advisor.propose_mutations(rule, spec);
        if scenarios.is_empty() {
            debug!(rule = %rule.id, "advisor returned no proposals");
            return Vec::new();
        }
        scenarios
            .into_iter()
            .map(|scenario| {
                TestCase::new(
                    &rule.id,
                    scenario.description,
                    scenario.expected_result,
                    scenario.test_data,
                    Technique::Llm,
                )
            })
            .collect()
    }
}

/// Field references appearing on either side of any comparison.
fn referenced_fields(comparisons: &[Comparison]) -> BTreeSet<FieldRef> {
    comparisons
        .iter()
        .flat_map(|cmp| cmp.field_refs().cloned())
        .collect()
}
