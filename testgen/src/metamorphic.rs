//! Metamorphic test generation.
//!
//! A base positive/negative pair is derived from the rule's numeric
//! comparisons, then an operator-indexed table of metamorphic relations
//! produces follow-up cases. The table is the correctness contract: a
//! follow-up's expected result is read from the table, never re-derived
//! by evaluating the rule.

use crate::config::GeneratorConfig;
use edcheck_condition::{extract_comparisons, CompareOp, Comparison, FieldRef, Operand};
use edcheck_core::{FieldType, Rule, Specification, Technique, TestCase, TestData, Value};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::info;

/// A perturbation with a provable effect on an operator's truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetamorphicRelation {
    /// Move the operand further into the satisfying region.
    Increase,
    Decrease,
    /// Move toward the threshold but stay within the margin.
    IncreaseWithin,
    DecreaseWithin,
    /// Move past the threshold by more than the margin.
    IncreaseBeyond,
    DecreaseBeyond,
    /// Land exactly on the threshold.
    ExactMatch,
    /// Step just off the threshold.
    SlightChange,
    /// Any perturbation that avoids the threshold.
    AnyChange,
}

impl MetamorphicRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetamorphicRelation::Increase => "increase",
            MetamorphicRelation::Decrease => "decrease",
            MetamorphicRelation::IncreaseWithin => "increase_within",
            MetamorphicRelation::DecreaseWithin => "decrease_within",
            MetamorphicRelation::IncreaseBeyond => "increase_beyond",
            MetamorphicRelation::DecreaseBeyond => "decrease_beyond",
            MetamorphicRelation::ExactMatch => "exact_match",
            MetamorphicRelation::SlightChange => "slight_change",
            MetamorphicRelation::AnyChange => "any_change",
        }
    }
}

/// Relations provably true for each operator, with the expected result
/// each one produces when applied to a satisfying base value.
pub fn relations_for(op: CompareOp) -> &'static [(MetamorphicRelation, bool)] {
    use MetamorphicRelation::*;
    match op {
        // x > a: growing x preserves truth; shrinking may or does cross.
        CompareOp::Gt => &[(Increase, true), (DecreaseWithin, false), (DecreaseBeyond, false)],
        // x >= a: shrinking within the margin keeps the inclusive bound.
        CompareOp::Ge => &[(Increase, true), (DecreaseWithin, true), (DecreaseBeyond, false)],
        CompareOp::Lt => &[(Decrease, true), (IncreaseWithin, false), (IncreaseBeyond, false)],
        CompareOp::Le => &[(Decrease, true), (IncreaseWithin, true), (IncreaseBeyond, false)],
        CompareOp::Eq => &[(ExactMatch, true), (SlightChange, false)],
        CompareOp::Ne => &[(AnyChange, true), (ExactMatch, false)],
    }
}

/// Generates test cases from metamorphic relations.
#[derive(Debug, Clone)]
pub struct MetamorphicTester {
    config: GeneratorConfig,
}

impl MetamorphicTester {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate base and follow-up test cases for a rule.
    pub fn generate(
        &self,
        rule: &Rule,
        spec: &Specification,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let comparisons = threshold_comparisons(rule.effective_condition());
        if comparisons.is_empty() {
            return Vec::new();
        }

        let mut tests = Vec::new();
        for base in self.base_tests(rule, spec, &comparisons, rng) {
            let follow_ups = self.follow_up_tests(rule, spec, &base, &comparisons);
            tests.push(base);
            tests.extend(follow_ups);
        }

        info!(
            rule = %rule.id,
            count = tests.len(),
            "generated metamorphic test cases"
        );
        tests
    }

    /// One positive base (every comparison satisfied) and one negative
    /// base (a randomly chosen comparison violated, the rest satisfied).
    fn base_tests(
        &self,
        rule: &Rule,
        spec: &Specification,
        comparisons: &[(FieldRef, CompareOp, f64)],
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();

        let mut positive = TestData::new();
        for (field_ref, op, threshold) in comparisons {
            let value = self.satisfying_value(spec, field_ref, *op, *threshold, rng);
            insert(&mut positive, field_ref, value);
        }
        if !positive.is_empty() {
            tests.push(TestCase::new(
                &rule.id,
                format!("Base positive test for rule {}", rule.id),
                true,
                positive,
                Technique::Metamorphic,
            ));
        }

        let violated = rng.gen_range(0..comparisons.len());
        let mut negative = TestData::new();
        for (i, (field_ref, op, threshold)) in comparisons.iter().enumerate() {
            let value = if i == violated {
                self.violating_value(spec, field_ref, *op, *threshold, rng)
            } else {
                self.satisfying_value(spec, field_ref, *op, *threshold, rng)
            };
            insert(&mut negative, field_ref, value);
        }
        if !negative.is_empty() {
            tests.push(TestCase::new(
                &rule.id,
                format!("Base negative test for rule {}", rule.id),
                false,
                negative,
                Technique::Metamorphic,
            ));
        }

        tests
    }

    /// Apply every table relation for each comparison to the base
    /// case's field value. Numeric and date fields only; the expected
    /// result comes straight from the table.
    fn follow_up_tests(
        &self,
        rule: &Rule,
        spec: &Specification,
        base: &TestCase,
        comparisons: &[(FieldRef, CompareOp, f64)],
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for (field_ref, op, threshold) in comparisons {
            let Some(base_value) = base.value(&field_ref.form, &field_ref.field) else {
                continue;
            };
            let field_type = spec.field_type_or_text(&field_ref.form, &field_ref.field);
            for &(relation, expected) in relations_for(*op) {
                let perturbed = match (field_type, base_value) {
                    (FieldType::Numeric, value) => {
                        let Some(base_num) = value.as_number() else {
                            continue;
                        };
                        Value::Float(apply_numeric(relation, base_num, *threshold))
                    }
                    (FieldType::Date, Value::Date(days)) => {
                        Value::Date(apply_date(relation, *days, *threshold))
                    }
                    _ => continue,
                };

                let mut data = base.test_data.clone();
                insert(&mut data, field_ref, perturbed);
                tests.push(TestCase::new(
                    &rule.id,
                    format!(
                        "Follow-up test for rule {} with {} on {}",
                        rule.id,
                        relation.as_str(),
                        field_ref
                    ),
                    expected,
                    data,
                    Technique::Metamorphic,
                ));
            }
        }
        tests
    }

    fn satisfying_value(
        &self,
        spec: &Specification,
        field_ref: &FieldRef,
        op: CompareOp,
        threshold: f64,
        rng: &mut StdRng,
    ) -> Value {
        match spec.field_type_or_text(&field_ref.form, &field_ref.field) {
            FieldType::Numeric => Value::Float(satisfying_numeric(op, threshold, rng)),
            FieldType::Date => Value::Date(satisfying_numeric(op, threshold, rng).round() as i64),
            FieldType::Categorical => {
                let values = spec.valid_values(&field_ref.form, &field_ref.field);
                if values.is_empty() {
                    Value::String("Test Value".into())
                } else {
                    Value::String(values[rng.gen_range(0..values.len())].clone())
                }
            }
            _ => Value::String("Test Value".into()),
        }
    }

    fn violating_value(
        &self,
        spec: &Specification,
        field_ref: &FieldRef,
        op: CompareOp,
        threshold: f64,
        rng: &mut StdRng,
    ) -> Value {
        match spec.field_type_or_text(&field_ref.form, &field_ref.field) {
            FieldType::Numeric => Value::Float(violating_numeric(op, threshold, rng)),
            FieldType::Date => Value::Date(violating_numeric(op, threshold, rng).round() as i64),
            _ => Value::String("Invalid Value".into()),
        }
    }
}

/// A value satisfying `x op threshold`.
fn satisfying_numeric(op: CompareOp, threshold: f64, rng: &mut StdRng) -> f64 {
    match op {
        CompareOp::Gt => threshold + rng.gen_range(1.0..10.0),
        CompareOp::Ge => threshold + rng.gen_range(0.0..10.0),
        CompareOp::Lt => threshold - rng.gen_range(1.0..10.0),
        CompareOp::Le => threshold - rng.gen_range(0.0..10.0),
        CompareOp::Eq => threshold,
        CompareOp::Ne => threshold + if rng.gen_bool(0.5) { 10.0 } else { -10.0 },
    }
}

/// A value violating `x op threshold`.
fn violating_numeric(op: CompareOp, threshold: f64, rng: &mut StdRng) -> f64 {
    match op {
        CompareOp::Gt => threshold - rng.gen_range(0.0..5.0),
        CompareOp::Ge => threshold - rng.gen_range(0.1..5.0),
        CompareOp::Lt => threshold + rng.gen_range(0.0..5.0),
        CompareOp::Le => threshold + rng.gen_range(0.1..5.0),
        CompareOp::Eq => threshold + if rng.gen_bool(0.5) { 5.0 } else { -5.0 },
        CompareOp::Ne => threshold,
    }
}

/// Numeric comparisons `Form.Field op literal`, the only shape the
/// relation table applies to.
fn threshold_comparisons(condition: &str) -> Vec<(FieldRef, CompareOp, f64)> {
    extract_comparisons(condition)
        .into_iter()
        .filter_map(|Comparison { lhs, op, rhs }| match (lhs, rhs) {
            (Operand::Field(field_ref), Operand::Number(n)) => Some((field_ref, op, n)),
            _ => None,
        })
        .collect()
}

fn insert(data: &mut TestData, field_ref: &FieldRef, value: Value) {
    data.entry(field_ref.form.clone())
        .or_default()
        .insert(field_ref.field.clone(), value);
}

/// Perturb a numeric base value per the relation's algebra. The margin
/// is the distance from the base to the threshold: "within" stays
/// inside it, "beyond" crosses it with room to spare.
fn apply_numeric(relation: MetamorphicRelation, base: f64, threshold: f64) -> f64 {
    let margin = (threshold - base).abs();
    match relation {
        MetamorphicRelation::Increase => base + margin * 0.5 + 1.0,
        MetamorphicRelation::Decrease => base - margin * 0.5 - 1.0,
        MetamorphicRelation::IncreaseWithin => base + margin * 0.5,
        MetamorphicRelation::DecreaseWithin => base - margin * 0.5,
        MetamorphicRelation::IncreaseBeyond => base + margin * 1.5 + 1.0,
        MetamorphicRelation::DecreaseBeyond => base - margin * 1.5 - 1.0,
        MetamorphicRelation::ExactMatch => threshold,
        MetamorphicRelation::SlightChange => threshold + 0.1,
        MetamorphicRelation::AnyChange => base + margin + 1.0,
    }
}

/// Date variant of the relation algebra, in whole days.
fn apply_date(relation: MetamorphicRelation, base_days: i64, threshold: f64) -> i64 {
    let margin = ((threshold - base_days as f64).abs().round() as i64).max(1);
    match relation {
        MetamorphicRelation::Increase => base_days + margin / 2 + 1,
        MetamorphicRelation::Decrease => base_days - margin / 2 - 1,
        MetamorphicRelation::IncreaseWithin => base_days + margin / 2,
        MetamorphicRelation::DecreaseWithin => base_days - margin / 2,
        MetamorphicRelation::IncreaseBeyond => base_days + margin * 3 / 2 + 1,
        MetamorphicRelation::DecreaseBeyond => base_days - margin * 3 / 2 - 1,
        MetamorphicRelation::ExactMatch => threshold.round() as i64,
        MetamorphicRelation::SlightChange => threshold.round() as i64 + 1,
        MetamorphicRelation::AnyChange => base_days + margin + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcheck_condition::{evaluate, parse_condition};
    use edcheck_core::{Field, Form};
    use rand::SeedableRng;

    fn age_spec() -> Specification {
        Specification::new().with_form(
            Form::new("Demographics").with_field(Field::new("Age", FieldType::Numeric)),
        )
    }

    fn age_rule() -> Rule {
        Rule::new("AGE001", "adults only").with_formalized("Demographics.Age >= 18")
    }

    #[test]
    fn test_base_pair_generated() {
        let tester = MetamorphicTester::new(GeneratorConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let tests = tester.generate(&age_rule(), &age_spec(), &mut rng);

        let positive = tests
            .iter()
            .find(|t| t.description.starts_with("Base positive"))
            .expect("positive base");
        assert!(positive.expected_result);
        let age = positive.value("Demographics", "Age").unwrap();
        assert!(age.as_number().unwrap() >= 18.0);

        let negative = tests
            .iter()
            .find(|t| t.description.starts_with("Base negative"))
            .expect("negative base");
        assert!(!negative.expected_result);
        let age = negative.value("Demographics", "Age").unwrap();
        assert!(age.as_number().unwrap() < 18.0);
    }

    #[test]
    fn test_follow_up_labels_come_from_table() {
        let tester = MetamorphicTester::new(GeneratorConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        let tests = tester.generate(&age_rule(), &age_spec(), &mut rng);

        // Every >= follow-up derived from the positive base must match
        // the table row for its relation name.
        for (relation, expected) in relations_for(CompareOp::Ge) {
            let matching: Vec<_> = tests
                .iter()
                .filter(|t| {
                    t.description
                        .contains(&format!("with {} on", relation.as_str()))
                })
                .collect();
            assert!(!matching.is_empty(), "no follow-up for {:?}", relation);
            // The first match descends from the positive base.
            assert_eq!(matching[0].expected_result, *expected);
        }
    }

    #[test]
    fn test_ge_relation_algebra_over_many_bases() {
        // decrease_within must stay true and decrease_beyond false for
        // any satisfying base value of x >= threshold.
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let threshold: f64 = rng.gen_range(-500.0..500.0);
            let base = threshold + rng.gen_range(0.0..100.0);

            let within = apply_numeric(MetamorphicRelation::DecreaseWithin, base, threshold);
            assert!(
                within >= threshold,
                "decrease_within left the satisfying region: base={} threshold={}",
                base,
                threshold
            );

            let beyond = apply_numeric(MetamorphicRelation::DecreaseBeyond, base, threshold);
            assert!(
                beyond < threshold,
                "decrease_beyond failed to cross: base={} threshold={}",
                base,
                threshold
            );
        }
    }

    #[test]
    fn test_positive_follow_ups_actually_satisfy() {
        // Table rows marked true must agree with a direct evaluation
        // when derived from the positive base.
        let tester = MetamorphicTester::new(GeneratorConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let tests = tester.generate(&age_rule(), &age_spec(), &mut rng);
        let expr = parse_condition("Demographics.Age >= 18").unwrap();

        let positive_base = tests
            .iter()
            .position(|t| t.description.starts_with("Base positive"))
            .unwrap();
        // Follow-ups directly after the positive base derive from it.
        for test in &tests[positive_base + 1..] {
            if test.description.starts_with("Base") {
                break;
            }
            if test.expected_result {
                assert_eq!(evaluate(&expr, &test.test_data), Some(true));
            }
        }
    }

    #[test]
    fn test_rules_without_numeric_comparisons_yield_nothing() {
        let tester = MetamorphicTester::new(GeneratorConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let rule = Rule::new("TXT01", "free text only");
        assert!(tester.generate(&rule, &age_spec(), &mut rng).is_empty());
    }
}
