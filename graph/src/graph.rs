//! Causal graph storage.

use edcheck_condition::{CompareOp, FieldRef};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Relationship carried by a causal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Earlier date influences later date within a subject's timeline.
    Temporal,
    /// Fields on the same form correlate.
    Form,
    /// Fields directly compared by the rule; carries the operator as
    /// seen from the edge's source.
    Comparison(CompareOp),
}

/// Directed graph over the field references of one rule.
///
/// The node set is exactly the reference set the condition model
/// extracts; edges never introduce nodes on their own. At most one
/// edge exists per ordered pair; re-adding replaces the kind (so a
/// comparison relationship refines an earlier co-form one).
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    nodes: Vec<FieldRef>,
    index: HashMap<FieldRef, usize>,
    /// Out-adjacency per node, ordered for deterministic traversal.
    out_edges: Vec<BTreeMap<usize, EdgeKind>>,
    in_degrees: Vec<usize>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Re-adding an existing reference is a no-op.
    pub fn add_node(&mut self, node: FieldRef) {
        if self.index.contains_key(&node) {
            return;
        }
        self.index.insert(node.clone(), self.nodes.len());
        self.nodes.push(node);
        self.out_edges.push(BTreeMap::new());
        self.in_degrees.push(0);
    }

    /// Add or replace the edge `from -> to`. Unknown endpoints are
    /// ignored, preserving the no-orphan-nodes invariant.
    pub fn add_edge(&mut self, from: &FieldRef, to: &FieldRef, kind: EdgeKind) {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return;
        };
        if f == t {
            return;
        }
        if self.out_edges[f].insert(t, kind).is_none() {
            self.in_degrees[t] += 1;
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: &FieldRef) -> bool {
        self.index.contains_key(node)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &FieldRef> {
        self.nodes.iter()
    }

    pub fn out_degree(&self, node: &FieldRef) -> usize {
        self.index
            .get(node)
            .map(|&i| self.out_edges[i].len())
            .unwrap_or(0)
    }

    pub fn in_degree(&self, node: &FieldRef) -> usize {
        self.index.get(node).map(|&i| self.in_degrees[i]).unwrap_or(0)
    }

    /// Degree centrality: total degree over `n - 1` possible neighbors.
    pub fn degree_centrality(&self, node: &FieldRef) -> f64 {
        if self.nodes.len() < 2 {
            return 0.0;
        }
        let degree = (self.out_degree(node) + self.in_degree(node)) as f64;
        degree / (self.nodes.len() - 1) as f64
    }

    /// Top `k` nodes by degree centrality, ties broken by insertion
    /// order so results are deterministic.
    pub fn top_by_centrality(&self, k: usize) -> Vec<FieldRef> {
        let mut ranked: Vec<(usize, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (i, self.degree_centrality(n)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .take(k)
            .map(|(i, _)| self.nodes[i].clone())
            .collect()
    }

    /// Kind of the direct edge `from -> to`, if one exists.
    pub fn edge_kind(&self, from: &FieldRef, to: &FieldRef) -> Option<EdgeKind> {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return None;
        };
        self.out_edges[f].get(&t).copied()
    }

    /// All nodes reachable from `node` by directed edges, excluding
    /// `node` itself. BFS order is deterministic.
    pub fn descendants(&self, node: &FieldRef) -> Vec<FieldRef> {
        let Some(&start) = self.index.get(node) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        seen.insert(start);
        while let Some(current) = queue.pop_front() {
            for &next in self.out_edges[current].keys() {
                if seen.insert(next) {
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        order.into_iter().map(|i| self.nodes[i].clone()).collect()
    }

    /// Nodes with more than one outgoing edge ("confounders").
    pub fn confounders(&self) -> Vec<FieldRef> {
        self.nodes
            .iter()
            .filter(|n| self.out_degree(n) > 1)
            .cloned()
            .collect()
    }
}
