//! Symbolic test generation.
//!
//! Builds typed symbolic variables for each field a rule references,
//! solves the rule's conjunctive constraint for satisfying and
//! violating assignments, and bisects numeric variables to find the
//! boundary where satisfiability flips.

use crate::config::GeneratorConfig;
use edcheck_condition::{extract_comparisons, ConditionExpr, FieldRef};
use edcheck_core::{
    single_value, FieldType, Rule, Specification, Technique, TestCase, TestData, Value,
};
use edcheck_solver::{Model, ModelValue, Session, Sort, Term};
use edcheck_verify::{lower_condition, LoweredCondition};
use tracing::{debug, info};

/// Generates test cases by symbolic constraint solving.
#[derive(Debug, Clone)]
pub struct SymbolicExecutor {
    config: GeneratorConfig,
}

impl SymbolicExecutor {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate positive, negative, and boundary test cases for a rule.
    ///
    /// Rules without a formalized condition are skipped entirely.
    pub fn generate(&self, rule: &Rule, spec: &Specification) -> Vec<TestCase> {
        if !rule.is_formalized() {
            debug!(rule = %rule.id, "skipping symbolic generation: no formalized condition");
            return Vec::new();
        }

        let comparisons = extract_comparisons(rule.effective_condition());
        if comparisons.is_empty() {
            return Vec::new();
        }

        // Conjunctive approximation over the extracted atoms.
        let conjunction = ConditionExpr::And(
            comparisons
                .iter()
                .cloned()
                .map(ConditionExpr::Comparison)
                .collect(),
        );
        let lowered = lower_condition(&conjunction, spec);
        let bounds = field_bound_terms(&lowered, spec);

        let mut tests = Vec::new();

        // Positive: the constraint as-is.
        if let Some(model) = self.solve(&lowered, &bounds, false) {
            tests.push(self.test_from_model(
                rule,
                spec,
                &lowered,
                &model,
                true,
                format!("Positive symbolic test for rule {}", rule.id),
            ));
        }

        // Negative: the negation, with field bounds kept in force.
        if let Some(model) = self.solve(&lowered, &bounds, true) {
            tests.push(self.test_from_model(
                rule,
                spec,
                &lowered,
                &model,
                false,
                format!("Negative symbolic test for rule {}", rule.id),
            ));
        }

        tests.extend(self.boundary_tests(rule, &lowered, &bounds));

        info!(
            rule = %rule.id,
            count = tests.len(),
            "generated symbolic test cases"
        );
        tests
    }

    fn solve(
        &self,
        lowered: &LoweredCondition,
        bounds: &[Term],
        negate: bool,
    ) -> Option<Model> {
        let mut session = Session::with_budget(self.config.eval_budget);
        lowered.declare_into(&mut session);
        for bound in bounds {
            session.assert(bound.clone());
        }
        let term = if negate {
            lowered.term.clone().not()
        } else {
            lowered.term.clone()
        };
        session.assert(term);
        let (result, model) = session.check_with_model();
        if result.is_sat() {
            model
        } else {
            None
        }
    }

    fn test_from_model(
        &self,
        rule: &Rule,
        spec: &Specification,
        lowered: &LoweredCondition,
        model: &Model,
        expected: bool,
        description: String,
    ) -> TestCase {
        let mut data = TestData::new();
        for (name, _) in &lowered.decls {
            let Some(field_ref) = FieldRef::parse(name) else {
                continue;
            };
            let Some(model_value) = model.values.get(name) else {
                continue;
            };
            let field_type = spec.field_type_or_text(&field_ref.form, &field_ref.field);
            data.entry(field_ref.form.clone())
                .or_default()
                .insert(field_ref.field.clone(), decode(model_value, field_type));
        }
        TestCase::new(&rule.id, description, expected, data, Technique::Symbolic)
    }

    /// For every numeric variable, bisect the fixed search interval to
    /// find where satisfiability flips, then emit one test epsilon
    /// below and one epsilon above the boundary.
    fn boundary_tests(
        &self,
        rule: &Rule,
        lowered: &LoweredCondition,
        bounds: &[Term],
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for (name, sort) in &lowered.decls {
            if *sort != Sort::Real {
                continue;
            }
            let Some(field_ref) = FieldRef::parse(name) else {
                continue;
            };

            let (mut lo, mut hi) = self.config.bisection_range;
            let lo_sat = self.sat_with_pin(lowered, bounds, name, lo);
            let hi_sat = self.sat_with_pin(lowered, bounds, name, hi);
            if lo_sat == hi_sat {
                // No flip inside the interval; nothing to bisect.
                continue;
            }

            // Termination comes from the fixed iteration cap, not from
            // a convergence tolerance. Invariant: satisfiability at
            // `lo` stays `lo_sat` and at `hi` stays `hi_sat`, so the
            // bracket always straddles the flip.
            for _ in 0..self.config.bisection_iterations {
                let mid = (lo + hi) / 2.0;
                if self.sat_with_pin(lowered, bounds, name, mid) == lo_sat {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }

            // The final bracket endpoints sit one half-width on each
            // side of the discovered boundary, with solver-observed
            // results that are opposite by construction.
            for (probe, expected) in [(lo, lo_sat), (hi, hi_sat)] {
                tests.push(TestCase::new(
                    &rule.id,
                    format!(
                        "Boundary test for rule {} with {}={}",
                        rule.id, field_ref, probe
                    ),
                    expected,
                    single_value(&field_ref.form, &field_ref.field, Value::Float(probe)),
                    Technique::Symbolic,
                ));
            }
        }
        tests
    }

    fn sat_with_pin(
        &self,
        lowered: &LoweredCondition,
        bounds: &[Term],
        var: &str,
        value: f64,
    ) -> bool {
        let mut session = Session::with_budget(self.config.eval_budget);
        lowered.declare_into(&mut session);
        for bound in bounds {
            session.assert(bound.clone());
        }
        session.assert(lowered.term.clone());
        session.assert(Term::var(var).eq(Term::num(value)));
        session.check().is_sat()
    }
}

/// Declared numeric/date bounds for every variable in the condition,
/// as extra solver constraints. Keeps models inside plausible clinical
/// ranges instead of at arbitrary grid points.
fn field_bound_terms(lowered: &LoweredCondition, spec: &Specification) -> Vec<Term> {
    let mut terms = Vec::new();
    for (name, sort) in &lowered.decls {
        if !matches!(sort, Sort::Real | Sort::Int) {
            continue;
        }
        let Some(field_ref) = FieldRef::parse(name) else {
            continue;
        };
        let Some(field) = spec.get_field(&field_ref.form, &field_ref.field) else {
            continue;
        };
        if let Some(min) = field.min_value.as_ref().and_then(bound_number) {
            terms.push(Term::var(name.clone()).ge(Term::num(min)));
        }
        if let Some(max) = field.max_value.as_ref().and_then(bound_number) {
            terms.push(Term::var(name.clone()).le(Term::num(max)));
        }
    }
    terms
}

fn bound_number(value: &Value) -> Option<f64> {
    value
        .as_number()
        .or_else(|| value.as_date_days().map(|d| d as f64))
}

fn decode(model_value: &ModelValue, field_type: FieldType) -> Value {
    match (model_value, field_type) {
        (ModelValue::Num(n), FieldType::Date) => Value::Date(*n as i64),
        (ModelValue::Num(n), FieldType::DateTime | FieldType::Time) => Value::Int(*n as i64),
        (ModelValue::Num(n), _) => {
            if n.fract() == 0.0 {
                Value::Int(*n as i64)
            } else {
                Value::Float(*n)
            }
        }
        (ModelValue::Str(s), _) => Value::String(s.clone()),
        (ModelValue::Bool(b), _) => Value::Bool(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcheck_condition::evaluate;
    use edcheck_condition::parse_condition;
    use edcheck_core::{Field, Form};

    fn vitals_spec() -> Specification {
        Specification::new().with_form(
            Form::new("VitalSigns")
                .with_field(
                    Field::new("SystolicBP", FieldType::Numeric)
                        .with_range(Value::Int(60), Value::Int(250)),
                )
                .with_field(
                    Field::new("DiastolicBP", FieldType::Numeric)
                        .with_range(Value::Int(30), Value::Int(150)),
                ),
        )
    }

    fn bp_rule() -> Rule {
        Rule::new("BP001", "systolic must exceed diastolic")
            .with_formalized("VitalSigns.SystolicBP <= VitalSigns.DiastolicBP")
    }

    #[test]
    fn test_positive_and_negative_models() {
        let executor = SymbolicExecutor::new(GeneratorConfig::default());
        let spec = vitals_spec();
        let tests = executor.generate(&bp_rule(), &spec);

        let positive = tests
            .iter()
            .find(|t| t.expected_result && t.description.starts_with("Positive"))
            .expect("positive test");
        let s = positive.value("VitalSigns", "SystolicBP").unwrap();
        let d = positive.value("VitalSigns", "DiastolicBP").unwrap();
        assert!(s.as_number().unwrap() <= d.as_number().unwrap());

        let negative = tests
            .iter()
            .find(|t| !t.expected_result && t.description.starts_with("Negative"))
            .expect("negative test");
        let s = negative.value("VitalSigns", "SystolicBP").unwrap();
        let d = negative.value("VitalSigns", "DiastolicBP").unwrap();
        assert!(s.as_number().unwrap() > d.as_number().unwrap());
    }

    #[test]
    fn test_models_respect_declared_bounds() {
        let executor = SymbolicExecutor::new(GeneratorConfig::default());
        let spec = vitals_spec();
        for test in executor.generate(&bp_rule(), &spec) {
            if let Some(s) = test.value("VitalSigns", "SystolicBP") {
                if test.description.starts_with("Boundary") {
                    continue;
                }
                let s = s.as_number().unwrap();
                assert!((60.0..=250.0).contains(&s), "systolic {} out of range", s);
            }
        }
    }

    #[test]
    fn test_boundary_tests_flip_at_threshold() {
        let executor = SymbolicExecutor::new(GeneratorConfig::default());
        let spec = Specification::new().with_form(
            Form::new("Demographics").with_field(Field::new("Age", FieldType::Numeric)),
        );
        let rule = Rule::new("AGE001", "adults only").with_formalized("Demographics.Age >= 18");
        let tests = executor.generate(&rule, &spec);

        let boundary: Vec<&TestCase> = tests
            .iter()
            .filter(|t| t.description.starts_with("Boundary"))
            .collect();
        assert_eq!(boundary.len(), 2);
        // The two sides must disagree, and the labels must match a
        // direct evaluation of the condition at each probe.
        assert_ne!(boundary[0].expected_result, boundary[1].expected_result);
        let expr = parse_condition("Demographics.Age >= 18").unwrap();
        for test in boundary {
            assert_eq!(
                evaluate(&expr, &test.test_data),
                Some(test.expected_result),
                "boundary label mismatch at {:?}",
                test.value("Demographics", "Age")
            );
        }
    }

    #[test]
    fn test_unformalized_rule_produces_nothing() {
        let executor = SymbolicExecutor::new(GeneratorConfig::default());
        let rule = Rule::new("FREE01", "weight looks odd");
        assert!(executor.generate(&rule, &vitals_spec()).is_empty());
    }

    #[test]
    fn test_unsatisfiable_rule_produces_no_positive_tests() {
        let executor = SymbolicExecutor::new(GeneratorConfig::default());
        let spec = Specification::new().with_form(
            Form::new("Demographics").with_field(Field::new("Age", FieldType::Numeric)),
        );
        let rule = Rule::new("IMP01", "impossible")
            .with_formalized("Demographics.Age > 50 AND Demographics.Age < 40");
        let tests = executor.generate(&rule, &spec);
        assert!(tests.iter().all(|t| !t.expected_result));
    }
}
