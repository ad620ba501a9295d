//! EDCHECK Testgen
//!
//! Multi-technique test-case generation for edit-check rules.
//!
//! Four complementary techniques produce candidate test cases
//! (symbolic constraint solving, metamorphic relation propagation,
//! adversarial mutation, and causal-graph intervention) plus an
//! optional externally-advised path. A multi-modal verifier then
//! re-checks every candidate through independent opinions and keeps
//! only those a strict majority agrees on.
//!
//! The orchestrator fans a (rule x technique) grid out to a bounded
//! worker pool; each task is a bulkhead, so one technique's failure
//! never affects its siblings.

mod adversarial;
mod causal;
mod config;
mod generator;
mod llm;
mod metamorphic;
mod symbolic;
mod verifier;

pub use adversarial::AdversarialGenerator;
pub use causal::CausalTestGenerator;
pub use config::GeneratorConfig;
pub use generator::TestGenerator;
pub use llm::{parse_scenarios, MutationAdvisor, ProposedScenario};
pub use metamorphic::{MetamorphicRelation, MetamorphicTester};
pub use symbolic::SymbolicExecutor;
pub use verifier::MultiModalVerifier;
