//! Configuration for test generation.

use edcheck_solver::DEFAULT_EVAL_BUDGET;

/// Configuration for test generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Worker pool bound for parallel generation.
    pub max_workers: usize,
    /// How many top-centrality nodes receive causal interventions.
    pub intervention_nodes: usize,
    /// How many top-centrality nodes receive counterfactuals.
    pub counterfactual_nodes: usize,
    /// Hard cap on boundary bisection iterations.
    pub bisection_iterations: u32,
    /// Fixed search interval for boundary bisection.
    pub bisection_range: (f64, f64),
    /// Offset applied on each side of a discovered boundary.
    pub boundary_epsilon: f64,
    /// Evaluation budget handed to each solver session.
    pub eval_budget: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_workers: 8,
            intervention_nodes: 3,
            counterfactual_nodes: 2,
            bisection_iterations: 10,
            bisection_range: (-1000.0, 1000.0),
            boundary_epsilon: 0.001,
            eval_budget: DEFAULT_EVAL_BUDGET,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_workers(mut self, count: usize) -> Self {
        self.max_workers = count.max(1);
        self
    }

    pub fn with_intervention_nodes(mut self, count: usize) -> Self {
        self.intervention_nodes = count;
        self
    }

    pub fn with_bisection_iterations(mut self, count: u32) -> Self {
        self.bisection_iterations = count;
        self
    }

    /// Small preset for quick runs.
    pub fn minimal() -> Self {
        Self {
            seed: 42,
            max_workers: 2,
            intervention_nodes: 1,
            counterfactual_nodes: 1,
            bisection_iterations: 5,
            bisection_range: (-100.0, 100.0),
            boundary_epsilon: 0.001,
            eval_budget: DEFAULT_EVAL_BUDGET / 10,
        }
    }
}
