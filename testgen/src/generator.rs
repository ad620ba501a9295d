//! Test-generation orchestration.
//!
//! Fans a (rule x technique) grid out to a bounded worker pool, merges
//! each rule's results, and passes them through the multi-modal
//! verifier. Every task is a bulkhead: a panicking or failing
//! technique is logged and contributes zero tests without affecting
//! its siblings.

use crate::adversarial::AdversarialGenerator;
use crate::causal::CausalTestGenerator;
use crate::config::GeneratorConfig;
use crate::llm::MutationAdvisor;
use crate::metamorphic::MetamorphicTester;
use crate::symbolic::SymbolicExecutor;
use crate::verifier::MultiModalVerifier;
use edcheck_core::{Rule, Specification, Technique, TestCase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{info, warn};

/// The technique pipeline, in execution order. The externally-advised
/// path rides inside the adversarial technique and tags its output
/// with [`Technique::Llm`].
const PIPELINE: [Technique; 4] = [
    Technique::Metamorphic,
    Technique::Symbolic,
    Technique::Adversarial,
    Technique::Causal,
];

/// Orchestrates test generation across rules and techniques.
pub struct TestGenerator<'a> {
    config: GeneratorConfig,
    advisor: Option<&'a dyn MutationAdvisor>,
}

impl Default for TestGenerator<'static> {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl<'a> TestGenerator<'a> {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            advisor: None,
        }
    }

    /// Attach an external mutation advisor for the adversarial path.
    pub fn with_advisor(mut self, advisor: &'a dyn MutationAdvisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Generate a verified test suite for every rule.
    ///
    /// `techniques` restricts the pipeline; an empty slice selects all
    /// techniques. Parallel and sequential modes perform identical
    /// steps; sequential mode exists for deterministic testing.
    pub fn generate_tests(
        &self,
        rules: &[Rule],
        spec: &Specification,
        parallel: bool,
        techniques: &[Technique],
    ) -> BTreeMap<String, Vec<TestCase>> {
        let pipeline: Vec<Technique> = PIPELINE
            .into_iter()
            .filter(|t| techniques.is_empty() || techniques.contains(t))
            .collect();

        // The work grid: one task per (rule, technique) pair.
        let tasks: Vec<(usize, Technique)> = (0..rules.len())
            .flat_map(|i| pipeline.iter().map(move |&t| (i, t)))
            .collect();

        let slots = if parallel {
            self.run_parallel(rules, spec, &tasks)
        } else {
            tasks
                .iter()
                .map(|&(i, technique)| self.run_technique(&rules[i], technique, spec))
                .collect()
        };

        // Fan-in per rule, then verify.
        let verifier = MultiModalVerifier::with_related_rules(rules)
            .with_budget(self.config.eval_budget);
        let mut merged: BTreeMap<String, Vec<TestCase>> = rules
            .iter()
            .map(|r| (r.id.clone(), Vec::new()))
            .collect();
        for (&(rule_idx, _), tests) in tasks.iter().zip(slots) {
            if let Some(bucket) = merged.get_mut(&rules[rule_idx].id) {
                bucket.extend(tests);
            }
        }

        let mut suite = BTreeMap::new();
        for rule in rules {
            let candidates = merged.remove(&rule.id).unwrap_or_default();
            let verified = verifier.verify(rule, spec, candidates);
            info!(
                rule = %rule.id,
                tests = verified.len(),
                "rule test suite ready"
            );
            suite.insert(rule.id.clone(), verified);
        }
        suite
    }

    /// Generate a verified suite for a single rule, sequentially.
    pub fn generate_tests_for_rule(
        &self,
        rule: &Rule,
        spec: &Specification,
        techniques: &[Technique],
    ) -> Vec<TestCase> {
        let rules = std::slice::from_ref(rule);
        self.generate_tests(rules, spec, false, techniques)
            .remove(&rule.id)
            .unwrap_or_default()
    }

    /// Dispatch tasks to a bounded worker pool. Results land in
    /// task-indexed slots, so merge order is independent of
    /// scheduling.
    fn run_parallel(
        &self,
        rules: &[Rule],
        spec: &Specification,
        tasks: &[(usize, Technique)],
    ) -> Vec<Vec<TestCase>> {
        let worker_count = self.config.max_workers.min(tasks.len()).max(1);
        let next_task = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, Vec<TestCase>)>();

        let mut slots: Vec<Vec<TestCase>> = vec![Vec::new(); tasks.len()];
        thread::scope(|scope| {
            for _ in 0..worker_count {
                let tx = tx.clone();
                let next_task = &next_task;
                scope.spawn(move || loop {
                    let index = next_task.fetch_add(1, Ordering::SeqCst);
                    if index >= tasks.len() {
                        break;
                    }
                    let (rule_idx, technique) = tasks[index];
                    let tests = self.run_technique(&rules[rule_idx], technique, spec);
                    if tx.send((index, tests)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);
            for (index, tests) in rx {
                slots[index] = tests;
            }
        });
        slots
    }

    /// Run one technique for one rule inside a bulkhead: a panic is
    /// caught, logged, and converted to zero tests.
    fn run_technique(
        &self,
        rule: &Rule,
        technique: Technique,
        spec: &Specification,
    ) -> Vec<TestCase> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut rng = StdRng::seed_from_u64(task_seed(self.config.seed, &rule.id, technique));
            match technique {
                Technique::Metamorphic => {
                    MetamorphicTester::new(self.config.clone()).generate(rule, spec, &mut rng)
                }
                Technique::Symbolic => {
                    SymbolicExecutor::new(self.config.clone()).generate(rule, spec)
                }
                Technique::Adversarial | Technique::Llm => {
                    let mut generator = AdversarialGenerator::new(self.config.clone());
                    if let Some(advisor) = self.advisor {
                        generator = generator.with_advisor(advisor);
                    }
                    generator.generate(rule, spec, &mut rng)
                }
                Technique::Causal => {
                    CausalTestGenerator::new(self.config.clone()).generate(rule, spec, &mut rng)
                }
            }
        }));

        match outcome {
            Ok(mut tests) => {
                for test in &mut tests {
                    test.description = format!("[{}] {}", test.technique, test.description);
                }
                tests
            }
            Err(_) => {
                warn!(
                    rule = %rule.id,
                    technique = %technique,
                    "technique panicked; contributing zero tests"
                );
                Vec::new()
            }
        }
    }
}

/// Deterministic per-task seed: identical inputs generate identical
/// data regardless of worker scheduling.
fn task_seed(seed: u64, rule_id: &str, technique: Technique) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in rule_id.bytes() {
        hash = (hash ^ byte as u64).wrapping_mul(0x100_0000_01b3);
    }
    hash = (hash ^ technique as u64).wrapping_mul(0x100_0000_01b3);
    seed ^ hash
}
