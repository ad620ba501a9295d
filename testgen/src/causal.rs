//! Causal test generation.
//!
//! Builds a directed causal graph over a rule's field references
//! (temporal, co-form, and comparison relationships, in that order)
//! and derives intervention, counterfactual, and confounding test
//! cases by propagating values along graph edges. Propagation touches
//! descendants only; nodes outside the intervened node's reach keep
//! independent values.

use crate::config::GeneratorConfig;
use edcheck_condition::{
    extract_comparisons, extract_field_references, CompareOp, FieldRef, Operand,
};
use edcheck_core::{
    days_from_civil, FieldType, Rule, Specification, Technique, TestCase, TestData, Value,
};
use edcheck_graph::{CausalGraph, EdgeKind};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// Fixed anchor date for generated timelines (2024-01-01).
fn anchor_days() -> i64 {
    days_from_civil(2024, 1, 1)
}

/// Generates test cases by causal-graph intervention.
#[derive(Debug, Clone)]
pub struct CausalTestGenerator {
    config: GeneratorConfig,
}

impl CausalTestGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Build the causal graph for a rule.
    ///
    /// Construction order matters: temporal edges first, then co-form
    /// edges, then comparison edges: later relationships refine
    /// earlier ones on the same node pair.
    pub fn build_graph(&self, rule: &Rule, spec: &Specification) -> CausalGraph {
        let condition = rule.effective_condition();
        let refs = extract_field_references(condition);

        let mut graph = CausalGraph::new();
        for field_ref in &refs {
            graph.add_node(field_ref.clone());
        }

        // (1) Temporal: earlier date influences later date. "Earlier"
        // is heuristic: declaration order within the specification.
        let mut date_refs: Vec<&FieldRef> = refs
            .iter()
            .filter(|r| spec.field_type_or_text(&r.form, &r.field) == FieldType::Date)
            .collect();
        date_refs.sort_by_key(|r| {
            let position = spec
                .forms
                .get(&r.form)
                .and_then(|form| form.fields.iter().position(|f| f.name == r.field))
                .unwrap_or(usize::MAX);
            (r.form.clone(), position, r.field.clone())
        });
        for i in 0..date_refs.len() {
            for j in (i + 1)..date_refs.len() {
                graph.add_edge(date_refs[i], date_refs[j], EdgeKind::Temporal);
            }
        }

        // (2) Co-form correlation, both directions.
        let mut by_form: BTreeMap<&str, Vec<&FieldRef>> = BTreeMap::new();
        for field_ref in &refs {
            by_form.entry(&field_ref.form).or_default().push(field_ref);
        }
        for fields in by_form.values() {
            for i in 0..fields.len() {
                for j in (i + 1)..fields.len() {
                    graph.add_edge(fields[i], fields[j], EdgeKind::Form);
                    graph.add_edge(fields[j], fields[i], EdgeKind::Form);
                }
            }
        }

        // (3) Directly compared pairs, the reverse edge carrying the
        // algebraic inverse of the operator.
        for cmp in extract_comparisons(condition) {
            let (Operand::Field(left), Operand::Field(right)) = (&cmp.lhs, &cmp.rhs) else {
                continue;
            };
            graph.add_edge(left, right, EdgeKind::Comparison(cmp.op));
            graph.add_edge(right, left, EdgeKind::Comparison(cmp.op.inverse()));
        }

        graph
    }

    /// Generate intervention, counterfactual, and confounding tests.
    pub fn generate(
        &self,
        rule: &Rule,
        spec: &Specification,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let graph = self.build_graph(rule, spec);
        if graph.node_count() == 0 {
            return Vec::new();
        }

        let mut tests = Vec::new();
        tests.extend(self.intervention_tests(rule, spec, &graph, rng));
        tests.extend(self.counterfactual_tests(rule, spec, &graph, rng));
        tests.extend(self.confounding_tests(rule, spec, &graph, rng));

        info!(
            rule = %rule.id,
            count = tests.len(),
            "generated causal test cases"
        );
        tests
    }

    /// Probe the highest-centrality nodes and push each change to the
    /// node's descendants.
    fn intervention_tests(
        &self,
        rule: &Rule,
        spec: &Specification,
        graph: &CausalGraph,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for node in graph.top_by_centrality(self.config.intervention_nodes) {
            let field_type = spec.field_type_or_text(&node.form, &node.field);
            for value in probe_values(field_type, spec, &node) {
                let mut data = TestData::new();
                insert(&mut data, &node, value.clone());
                self.propagate(&mut data, &node, &value, graph, spec, rng);

                tests.push(TestCase::new(
                    &rule.id,
                    format!(
                        "Causal intervention test for rule {} with {}={}",
                        rule.id, node, value
                    ),
                    true,
                    data,
                    Technique::Causal,
                ));
            }
        }
        tests
    }

    /// For the top nodes, pair a propagated base world with an
    /// explicitly opposite value on the node itself.
    fn counterfactual_tests(
        &self,
        rule: &Rule,
        spec: &Specification,
        graph: &CausalGraph,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for node in graph.top_by_centrality(self.config.counterfactual_nodes) {
            let field_type = spec.field_type_or_text(&node.form, &node.field);
            let base = base_value(field_type, spec, &node, rng);

            let mut data = TestData::new();
            insert(&mut data, &node, base.clone());
            self.propagate(&mut data, &node, &base, graph, spec, rng);

            let counterfactual = opposite_value(field_type, spec, &node, &base);
            insert(&mut data, &node, counterfactual.clone());

            tests.push(TestCase::new(
                &rule.id,
                format!(
                    "Counterfactual test for rule {} with {}={}",
                    rule.id, node, counterfactual
                ),
                false,
                data,
                Technique::Causal,
            ));
        }
        tests
    }

    /// Nodes with more than one outgoing edge exercise multi-path
    /// influence: the confounder gets a value, two randomly selected
    /// descendants get independent values.
    fn confounding_tests(
        &self,
        rule: &Rule,
        spec: &Specification,
        graph: &CausalGraph,
        rng: &mut StdRng,
    ) -> Vec<TestCase> {
        let mut tests = Vec::new();
        for confounder in graph.confounders() {
            let descendants = graph.descendants(&confounder);
            if descendants.len() < 2 {
                continue;
            }

            let field_type = spec.field_type_or_text(&confounder.form, &confounder.field);
            let value = base_value(field_type, spec, &confounder, rng);
            let mut data = TestData::new();
            insert(&mut data, &confounder, value.clone());

            let first = rng.gen_range(0..descendants.len());
            let mut second = rng.gen_range(0..descendants.len() - 1);
            if second >= first {
                second += 1;
            }
            for descendant in [&descendants[first], &descendants[second]] {
                let desc_type = spec.field_type_or_text(&descendant.form, &descendant.field);
                insert(&mut data, descendant, independent_value(desc_type, spec, descendant, rng));
            }

            tests.push(TestCase::new(
                &rule.id,
                format!(
                    "Confounding test for rule {} with {}={}",
                    rule.id, confounder, value
                ),
                true,
                data,
                Technique::Causal,
            ));
        }
        tests
    }

    /// Push an intervened value to the node's descendants using
    /// edge-kind-specific rules. Only descendants are touched.
    fn propagate(
        &self,
        data: &mut TestData,
        node: &FieldRef,
        value: &Value,
        graph: &CausalGraph,
        spec: &Specification,
        rng: &mut StdRng,
    ) {
        for descendant in graph.descendants(node) {
            let desc_type = spec.field_type_or_text(&descendant.form, &descendant.field);
            let propagated = match graph.edge_kind(node, &descendant) {
                Some(EdgeKind::Temporal) => match value {
                    // Timeline order: the descendant happens later.
                    Value::Date(days) => Value::Date(days + rng.gen_range(1..=30)),
                    _ => Value::Date(anchor_days()),
                },
                Some(EdgeKind::Form) => match (value.as_number(), desc_type) {
                    (Some(n), FieldType::Numeric) => {
                        Value::Float(n + rng.gen_range(-10.0..10.0))
                    }
                    _ => Value::String(format!("Related to {}", value)),
                },
                Some(EdgeKind::Comparison(op)) => comparison_satisfying(op, value, rng),
                None => independent_value(desc_type, spec, &descendant, rng),
            };
            insert(data, &descendant, propagated);
        }
    }
}

fn insert(data: &mut TestData, field_ref: &FieldRef, value: Value) {
    data.entry(field_ref.form.clone())
        .or_default()
        .insert(field_ref.field.clone(), value);
}

/// A value for the edge's target that satisfies `source op target`.
fn comparison_satisfying(op: CompareOp, source: &Value, rng: &mut StdRng) -> Value {
    match source {
        Value::Date(days) => {
            let offset = rng.gen_range(1..=30);
            match op {
                CompareOp::Gt | CompareOp::Ge => Value::Date(days - offset),
                CompareOp::Lt | CompareOp::Le => Value::Date(days + offset),
                CompareOp::Eq => Value::Date(*days),
                CompareOp::Ne => Value::Date(days + offset),
            }
        }
        other => {
            let n = other.as_number().unwrap_or(0.0);
            match op {
                CompareOp::Gt => Value::Float(n - rng.gen_range(1.0..10.0)),
                CompareOp::Ge => Value::Float(n - rng.gen_range(0.0..10.0)),
                CompareOp::Lt => Value::Float(n + rng.gen_range(1.0..10.0)),
                CompareOp::Le => Value::Float(n + rng.gen_range(0.0..10.0)),
                CompareOp::Eq => other.clone(),
                CompareOp::Ne => Value::Float(n + if rng.gen_bool(0.5) { 10.0 } else { -10.0 }),
            }
        }
    }
}

/// Type-appropriate probe values for an intervention.
fn probe_values(field_type: FieldType, spec: &Specification, node: &FieldRef) -> Vec<Value> {
    match field_type {
        FieldType::Numeric => vec![Value::Int(0), Value::Int(10), Value::Int(100)],
        FieldType::Date => {
            let anchor = anchor_days();
            vec![
                Value::Date(anchor),
                Value::Date(anchor - 30),
                Value::Date(anchor + 30),
            ]
        }
        FieldType::Categorical => {
            let valid = spec.valid_values(&node.form, &node.field);
            if valid.is_empty() {
                vec![
                    Value::String("Category A".into()),
                    Value::String("Category B".into()),
                    Value::String("Other".into()),
                ]
            } else {
                valid.into_iter().take(3).map(Value::String).collect()
            }
        }
        _ => vec![Value::String("Test Value".into()), Value::String(String::new())],
    }
}

fn base_value(
    field_type: FieldType,
    spec: &Specification,
    node: &FieldRef,
    rng: &mut StdRng,
) -> Value {
    match field_type {
        FieldType::Numeric => Value::Float(rng.gen_range(10.0..50.0)),
        FieldType::Date => Value::Date(anchor_days()),
        FieldType::Categorical => spec
            .valid_values(&node.form, &node.field)
            .first()
            .map(|v| Value::String(v.clone()))
            .unwrap_or_else(|| Value::String("Category A".into())),
        _ => Value::String("Base Value".into()),
    }
}

/// The explicit opposite of a base value: sign flip, half a year
/// later, or the alternate category.
fn opposite_value(
    field_type: FieldType,
    spec: &Specification,
    node: &FieldRef,
    base: &Value,
) -> Value {
    match (field_type, base) {
        (FieldType::Numeric, _) => Value::Float(-base.as_number().unwrap_or(1.0)),
        (FieldType::Date, Value::Date(days)) => Value::Date(days + 180),
        (FieldType::Categorical, Value::String(current)) => {
            let valid = spec.valid_values(&node.form, &node.field);
            valid
                .iter()
                .find(|v| *v != current)
                .map(|v| Value::String(v.clone()))
                .unwrap_or_else(|| Value::String("Category B".into()))
        }
        _ => Value::String("Counterfactual Value".into()),
    }
}

fn independent_value(
    field_type: FieldType,
    spec: &Specification,
    node: &FieldRef,
    rng: &mut StdRng,
) -> Value {
    match field_type {
        FieldType::Numeric => Value::Float(rng.gen_range(0.0..100.0)),
        FieldType::Date => Value::Date(anchor_days()),
        FieldType::Categorical => spec
            .valid_values(&node.form, &node.field)
            .first()
            .map(|v| Value::String(v.clone()))
            .unwrap_or_else(|| Value::String("Category A".into())),
        _ => Value::String("Test Value".into()),
    }
}
