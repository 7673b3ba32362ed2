use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::formulation::Formulation;
use crate::graph::{EdgeKey, SignedGraph, UnionFind};
use crate::snapshot::ValueProvider;

/// Objective differences below this are ties.
const OBJECTIVE_EPS: f64 = 1e-9;

/// A partition of the vertices with its disagreement cost.
///
/// Cluster ids are dense and numbered by first appearance, so two equal
/// partitions always have equal memberships.
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibleSolution {
    membership: Vec<usize>,
    objective: f64,
}

fn normalize(labels: &[usize]) -> Vec<usize> {
    let mut ids = HashMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = ids.len();
            *ids.entry(label).or_insert(next)
        })
        .collect()
}

impl FeasibleSolution {
    /// Builds a solution from arbitrary cluster labels, one per vertex.
    pub fn from_membership(graph: &SignedGraph, labels: &[usize]) -> Result<Self> {
        if labels.len() != graph.n() {
            return Err(Error::InvalidSettings(format!(
                "membership has {} entries for {} vertices",
                labels.len(),
                graph.n()
            )));
        }
        Ok(Self::from_labels(graph, labels))
    }

    pub(crate) fn from_labels(graph: &SignedGraph, labels: &[usize]) -> Self {
        let membership = normalize(labels);
        let objective = Self::evaluate(graph, &membership);
        Self {
            membership,
            objective,
        }
    }

    /// Every vertex in its own cluster.
    pub fn singletons(graph: &SignedGraph) -> Self {
        let labels: Vec<usize> = (0..graph.n()).collect();
        Self::from_labels(graph, &labels)
    }

    /// Clusters joined by variables above one half.
    ///
    /// Exact for integral values satisfying transitivity; for anything else
    /// it still yields a partition, possibly merging more than the values say.
    pub fn from_values(formulation: &Formulation, values: &dyn ValueProvider) -> Self {
        let mut uf = UnionFind::new(formulation.n());
        for &key in formulation.keys() {
            if values.value(key) > 0.5 {
                uf.union(key.lo(), key.hi());
            }
        }
        let (labels, _) = uf.labels();
        Self::from_labels(formulation.graph(), &labels)
    }

    /// Disagreement cost of `membership` on `graph`: attractive edges cut
    /// plus repulsive edges kept.
    pub fn evaluate(graph: &SignedGraph, membership: &[usize]) -> f64 {
        graph
            .edges()
            .iter()
            .map(|e| {
                let (i, j) = e.key.endpoints();
                let same = membership[i] == membership[j];
                match (same, e.weight > 0.0) {
                    (true, false) => -e.weight,
                    (false, true) => e.weight,
                    _ => 0.0,
                }
            })
            .fold(0.0, |acc, cost| acc + cost)
    }

    pub fn membership(&self) -> &[usize] {
        &self.membership
    }

    /// Cluster ids starting at 1, the form written to membership files.
    pub fn one_indexed(&self) -> Vec<usize> {
        self.membership.iter().map(|c| c + 1).collect()
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn cluster_count(&self) -> usize {
        self.membership.iter().max().map_or(0, |&m| m + 1)
    }

    pub fn same_cluster(&self, i: usize, j: usize) -> bool {
        self.membership[i] == self.membership[j]
    }

    /// Value of every variable of `formulation` under this partition.
    pub fn assignment(&self, formulation: &Formulation) -> Vec<(EdgeKey, f64)> {
        formulation
            .keys()
            .iter()
            .map(|&key| {
                let value = if self.same_cluster(key.lo(), key.hi()) {
                    1.0
                } else {
                    0.0
                };
                (key, value)
            })
            .collect()
    }

    /// Strictly lower objective.
    pub fn is_better_than(&self, other: &FeasibleSolution) -> bool {
        self.objective < other.objective - OBJECTIVE_EPS
    }
}
