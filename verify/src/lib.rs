//! EDCHECK Verify
//!
//! Formal verification of edit-check rules.
//!
//! Responsibilities:
//! - Lower parsed conditions to solver formulas, typed per the
//!   specification's field types
//! - Per-rule checks: satisfiability, tautology, structural redundancy
//! - Rule-set checks: pairwise contradiction and implication
//!
//! Every check runs in its own pushed solver scope and pops it before
//! the next, so scopes never leak constraints across checks. Unknown
//! solver results are surfaced as warnings, never errors.

mod lower;
mod verifier;

pub use lower::{lower_condition, LoweredCondition, NULL_SENTINEL};
pub use verifier::{RuleVerifier, VerifierConfig};
