//! Variable space and objective of the clique-partitioning model.
//!
//! A variable `x_ij = 1` means `i` and `j` are in the same cluster. The
//! disagreement cost
//!
//! ```text
//! Σ_{w_ij < 0} |w_ij| x_ij + Σ_{w_ij > 0} w_ij (1 - x_ij)
//! ```
//!
//! is the linear form `Σ -w_ij x_ij + K` with `K = Σ_{w > 0} w`.

use std::sync::Arc;

use crate::graph::{Edge, EdgeKey, SignedGraph};
use crate::snapshot::ValueProvider;

pub type VarId = usize;

/// Which vertex pairs carry a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableSpace {
    /// One variable per unordered vertex pair.
    Complete,
    /// One variable per graph edge; feasibility comes from cycle inequalities.
    Sparse,
}

/// Bijection between edge keys and dense variable ids.
///
/// Ids follow ascending key order in both spaces.
#[derive(Debug, Clone)]
pub struct VariableIndex {
    n: usize,
    space: VariableSpace,
    keys: Vec<EdgeKey>,
}

impl VariableIndex {
    pub fn complete(n: usize) -> Self {
        let mut keys = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                keys.push(EdgeKey::new(i, j));
            }
        }
        Self {
            n,
            space: VariableSpace::Complete,
            keys,
        }
    }

    pub fn sparse(graph: &SignedGraph) -> Self {
        Self {
            n: graph.n(),
            space: VariableSpace::Sparse,
            keys: graph.edges().iter().map(|e| e.key).collect(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn space(&self) -> VariableSpace {
        self.space
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[EdgeKey] {
        &self.keys
    }

    pub fn key(&self, var: VarId) -> EdgeKey {
        self.keys[var]
    }

    pub fn variable(&self, key: EdgeKey) -> Option<VarId> {
        if key.hi() >= self.n {
            return None;
        }
        match self.space {
            VariableSpace::Complete => {
                let (lo, hi) = key.endpoints();
                Some(lo * (2 * self.n - lo - 1) / 2 + (hi - lo - 1))
            }
            VariableSpace::Sparse => self.keys.binary_search(&key).ok(),
        }
    }

    pub fn variable_of(&self, i: usize, j: usize) -> Option<VarId> {
        if i == j {
            return None;
        }
        self.variable(EdgeKey::new(i, j))
    }
}

/// A signed graph together with its variable space and objective.
#[derive(Debug, Clone)]
pub struct Formulation {
    graph: SignedGraph,
    index: Arc<VariableIndex>,
    variable_graph: SignedGraph,
    costs: Vec<f64>,
    constant: f64,
}

impl Formulation {
    pub fn new(graph: SignedGraph, space: VariableSpace) -> Self {
        let index = match space {
            VariableSpace::Complete => VariableIndex::complete(graph.n()),
            VariableSpace::Sparse => VariableIndex::sparse(&graph),
        };
        let variable_graph = match space {
            VariableSpace::Complete => SignedGraph::from_edges(
                graph.n(),
                index
                    .keys()
                    .iter()
                    .map(|&key| Edge {
                        key,
                        weight: graph.weight(key.lo(), key.hi()).unwrap_or(0.0),
                    })
                    .collect(),
            ),
            VariableSpace::Sparse => graph.clone(),
        };
        let costs = index
            .keys()
            .iter()
            .map(|key| -graph.weight(key.lo(), key.hi()).unwrap_or(0.0))
            .collect();
        let constant = graph.positive_weight_sum();
        Self {
            graph,
            index: Arc::new(index),
            variable_graph,
            costs,
            constant,
        }
    }

    pub fn complete(graph: SignedGraph) -> Self {
        Self::new(graph, VariableSpace::Complete)
    }

    pub fn sparse(graph: SignedGraph) -> Self {
        Self::new(graph, VariableSpace::Sparse)
    }

    pub fn graph(&self) -> &SignedGraph {
        &self.graph
    }

    /// The graph whose edges are exactly the variables, weighted by the input
    /// weights (zero for pairs the input graph does not connect).
    pub fn variable_graph(&self) -> &SignedGraph {
        &self.variable_graph
    }

    pub fn index(&self) -> &Arc<VariableIndex> {
        &self.index
    }

    pub fn space(&self) -> VariableSpace {
        self.index.space()
    }

    pub fn n(&self) -> usize {
        self.graph.n()
    }

    pub fn variable_count(&self) -> usize {
        self.index.len()
    }

    pub fn keys(&self) -> &[EdgeKey] {
        self.index.keys()
    }

    pub fn key(&self, var: VarId) -> EdgeKey {
        self.index.key(var)
    }

    pub fn variable(&self, key: EdgeKey) -> Option<VarId> {
        self.index.variable(key)
    }

    pub fn has_variable(&self, i: usize, j: usize) -> bool {
        self.index.variable_of(i, j).is_some()
    }

    /// Input weight of `{i, j}`, zero when absent.
    pub fn edge_weight(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        self.graph.weight(i, j).unwrap_or(0.0)
    }

    pub fn objective_coefficient(&self, var: VarId) -> f64 {
        self.costs[var]
    }

    pub fn objective_coefficients(&self) -> &[f64] {
        &self.costs
    }

    pub fn objective_constant(&self) -> f64 {
        self.constant
    }

    /// Objective value of a (possibly fractional) assignment.
    pub fn objective_value(&self, values: &dyn ValueProvider) -> f64 {
        self.keys()
            .iter()
            .zip(&self.costs)
            .map(|(&key, &c)| c * values.value(key))
            .sum::<f64>()
            + self.constant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ValueSnapshot;

    fn graph() -> SignedGraph {
        SignedGraph::new(4, vec![(0, 1, 2.0), (1, 2, -1.0), (0, 3, 0.5)]).unwrap()
    }

    #[test]
    fn test_complete_index_round_trip() {
        let index = VariableIndex::complete(5);
        assert_eq!(index.len(), 10);
        for (var, &key) in index.keys().iter().enumerate() {
            assert_eq!(index.variable(key), Some(var));
        }
        assert_eq!(index.variable_of(3, 3), None);
        assert_eq!(index.variable(EdgeKey::new(1, 7)), None);
    }

    #[test]
    fn test_sparse_index_uses_edges() {
        let f = Formulation::sparse(graph());
        assert_eq!(f.variable_count(), 3);
        assert!(f.has_variable(1, 2));
        assert!(!f.has_variable(0, 2));
        assert_eq!(f.key(0), EdgeKey::new(0, 1));
    }

    #[test]
    fn test_objective_coefficients() {
        let f = Formulation::complete(graph());
        assert_eq!(f.variable_count(), 6);
        let var01 = f.variable(EdgeKey::new(0, 1)).unwrap();
        let var12 = f.variable(EdgeKey::new(1, 2)).unwrap();
        let var02 = f.variable(EdgeKey::new(0, 2)).unwrap();
        assert_eq!(f.objective_coefficient(var01), -2.0);
        assert_eq!(f.objective_coefficient(var12), 1.0);
        assert_eq!(f.objective_coefficient(var02), 0.0);
        assert!((f.objective_constant() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_objective_value_counts_disagreements() {
        let f = Formulation::complete(graph());
        // {0, 1, 2} together, {3} alone: pays |-1| on (1,2) and 0.5 on (0,3).
        let mut values = vec![0.0; f.variable_count()];
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            values[f.variable(EdgeKey::new(i, j)).unwrap()] = 1.0;
        }
        let snapshot = ValueSnapshot::new(f.index().clone(), values);
        assert!((f.objective_value(&snapshot) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_variable_graph_is_complete() {
        let f = Formulation::complete(graph());
        assert_eq!(f.variable_graph().edge_count(), 6);
        assert_eq!(f.variable_graph().weight(0, 2), Some(0.0));
        assert_eq!(f.edge_weight(2, 1), -1.0);
    }
}
