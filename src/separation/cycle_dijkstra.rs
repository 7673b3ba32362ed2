use std::collections::HashSet;

use crate::graph::SignedGraph;
use crate::inequality::{CycleInequality, Inequality};
use crate::snapshot::ValueProvider;

use super::{most_violated, SeparationContext, Separator};

/// Values at or below this are treated as absent from the support graph.
const SUPPORT_EPS: f64 = 1e-4;

/// Cycle separation by shortest paths under the cost `1 - x`.
///
/// A cycle inequality with chord `(i, j)` is violated exactly when some path
/// from `i` to `j` has `Σ (1 - x_e) < 1 - x_ij`, so the cheapest path is the
/// best candidate for every chord.
#[derive(Debug, Clone, Default)]
pub struct CycleDijkstraSeparator {
    max_cuts: Option<usize>,
    chordless: bool,
}

impl CycleDijkstraSeparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.max_cuts = Some(max_cuts);
        self
    }

    /// Keep only cycles without a support edge between non-consecutive path vertices.
    pub fn chordless(mut self, chordless: bool) -> Self {
        self.chordless = chordless;
        self
    }
}

fn is_chordless(support: &SignedGraph, path: &[usize]) -> bool {
    let last = path.len() - 1;
    for a in 0..path.len() {
        for b in a + 2..path.len() {
            if a == 0 && b == last {
                continue;
            }
            if support.has_edge(path[a], path[b]) {
                return false;
            }
        }
    }
    true
}

impl Separator for CycleDijkstraSeparator {
    fn name(&self) -> &str {
        "cycle-dijkstra"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        let values = ctx.values;
        let support = ctx
            .formulation
            .variable_graph()
            .filtered(|e| values.value(e.key) > SUPPORT_EPS);

        let mut seen = HashSet::new();
        let mut cuts = Vec::new();
        for &chord in ctx.formulation.keys() {
            let chord_value = values.value(chord);
            if chord_value >= 1.0 - SUPPORT_EPS {
                continue;
            }
            let (i, j) = chord.endpoints();
            if !support.same_component(i, j) {
                continue;
            }
            let path = support.shortest_weighted_path(i, j, |key, _| {
                if key == chord {
                    None
                } else {
                    Some((1.0 - values.value(key)).max(0.0))
                }
            });
            if path.len() <= 2 {
                continue;
            }
            if self.chordless && !is_chordless(&support, &path) {
                continue;
            }
            let cycle = Inequality::from(CycleInequality::new(path));
            if ctx.is_violated(&cycle) && seen.insert(cycle.canonical()) {
                cuts.push(cycle);
            }
        }
        most_violated(cuts, ctx, self.max_cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::Formulation;
    use crate::inequality::ValidInequality;
    use crate::separation::test_support::values;

    fn pentagon() -> Formulation {
        let edges = (0..5).map(|i| (i, (i + 1) % 5, 1.0)).collect::<Vec<_>>();
        Formulation::sparse(SignedGraph::new(5, edges).unwrap())
    }

    #[test]
    fn test_finds_cheap_cycle() {
        let f = pentagon();
        let x = values(
            f.index(),
            &[(0, 1, 0.9), (1, 2, 0.9), (2, 3, 0.9), (3, 4, 0.9), (0, 4, 0.3)],
        );
        let ctx = SeparationContext::new(&f, &x);
        let cuts = CycleDijkstraSeparator::new().separate(&ctx);
        assert!(!cuts.is_empty());
        for cut in &cuts {
            assert!(cut.slack(&x) < -ctx.eps);
        }
        // The chord (0, 4) gives 3.6 - 0.3 = 3.3 > 3.
        assert!(cuts.iter().any(|c| match c {
            Inequality::Cycle(cycle) => cycle.chord() == crate::graph::EdgeKey::new(0, 4),
            _ => false,
        }));
    }

    #[test]
    fn test_chordless_filter() {
        let mut edges = (0..5).map(|i| (i, (i + 1) % 5, 1.0)).collect::<Vec<_>>();
        edges.push((1, 3, 1.0));
        let f = Formulation::sparse(SignedGraph::new(5, edges).unwrap());
        let support = f.variable_graph().clone();
        assert!(is_chordless(&support, &[0, 1, 2]));
        assert!(!is_chordless(&support, &[0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_integral_consistent_point_has_no_cut() {
        let f = pentagon();
        let x = values(f.index(), &[(0, 1, 1.0), (1, 2, 1.0), (3, 4, 1.0)]);
        let ctx = SeparationContext::new(&f, &x);
        assert!(CycleDijkstraSeparator::new().separate(&ctx).is_empty());
    }
}
