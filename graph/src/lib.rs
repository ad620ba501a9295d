//! EDCHECK Graph
//!
//! Directed causal graph over the field references of a rule.
//!
//! Responsibilities:
//! - Adjacency-list storage with typed edges (temporal, co-form, comparison)
//! - Degree centrality and in/out-degree queries
//! - Descendant reachability (BFS)
//!
//! A plain adjacency list is all the causal generator needs; there is no
//! external graph dependency.

mod graph;

pub use graph::{CausalGraph, EdgeKind};
