use log::debug;

use crate::formulation::Formulation;
use crate::graph::{EdgeKey, SignedGraph};
use crate::snapshot::ValueProvider;

use super::{FeasibleSolution, PrimalHeuristic};

const IMPROVEMENT_EPS: f64 = 1e-9;

/// Greedy rounding of relaxation values.
///
/// Starts from singletons and walks the variables above `threshold` in order
/// of decreasing value, merging the two clusters of a variable whenever that
/// strictly lowers the disagreement cost. Passes repeat until one makes no
/// merge. The result is always a valid partition.
#[derive(Debug, Clone)]
pub struct GreedyRounding {
    threshold: f64,
}

impl Default for GreedyRounding {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl GreedyRounding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Cost decrease of merging clusters `a` and `b`: the total weight between them.
fn merge_gain(graph: &SignedGraph, labels: &[usize], a: usize, b: usize) -> f64 {
    graph
        .edges()
        .iter()
        .filter(|e| {
            let (la, lb) = (labels[e.key.lo()], labels[e.key.hi()]);
            (la == a && lb == b) || (la == b && lb == a)
        })
        .map(|e| e.weight)
        .sum()
}

impl PrimalHeuristic for GreedyRounding {
    fn name(&self) -> &str {
        "greedy-rounding"
    }

    fn generate(&self, formulation: &Formulation, values: &dyn ValueProvider) -> FeasibleSolution {
        let graph = formulation.graph();
        let mut order: Vec<(EdgeKey, f64)> = formulation
            .keys()
            .iter()
            .map(|&key| (key, values.value(key)))
            .filter(|&(_, v)| v > self.threshold)
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut labels: Vec<usize> = (0..formulation.n()).collect();
        let mut passes = 0;
        let mut merges = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for &(key, _) in &order {
                let (a, b) = (labels[key.lo()], labels[key.hi()]);
                if a == b || merge_gain(graph, &labels, a, b) <= IMPROVEMENT_EPS {
                    continue;
                }
                labels.iter_mut().filter(|l| **l == b).for_each(|l| *l = a);
                merges += 1;
                changed = true;
            }
            if !changed {
                break;
            }
        }

        let solution = FeasibleSolution::from_labels(graph, &labels);
        debug!(
            "rounding: {} candidates, {merges} merges in {passes} passes, objective {}",
            order.len(),
            solution.objective()
        );
        solution
    }
}
