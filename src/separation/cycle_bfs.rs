use crate::inequality::{CycleInequality, Inequality};
use crate::snapshot::ValueProvider;

use super::{most_violated, SeparationContext, Separator};

/// Threshold splitting edges into the "zero" and "one" classes.
const ONE_THRESHOLD: f64 = 0.5;

/// Cycle separation by breadth-first search.
///
/// Edges with value `>= 0.5` form `G_one`. For every edge `(i, j)` below the
/// threshold, taken in ascending key order, a shortest `G_one` path from `i`
/// to `j` closes a cycle whose only "zero" edge is the chord `(i, j)`.
#[derive(Debug, Clone, Default)]
pub struct CycleBfsSeparator {
    max_cuts: Option<usize>,
}

impl CycleBfsSeparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.max_cuts = Some(max_cuts);
        self
    }
}

impl Separator for CycleBfsSeparator {
    fn name(&self) -> &str {
        "cycle-bfs"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        let full = ctx.formulation.variable_graph();
        let one = full.filtered(|e| ctx.values.value(e.key) >= ONE_THRESHOLD);

        let mut cuts = Vec::new();
        for edge in full.edges() {
            let (i, j) = edge.key.endpoints();
            if ctx.values.value(edge.key) >= ONE_THRESHOLD {
                continue;
            }
            if !full.same_component(i, j) || !one.same_component(i, j) {
                continue;
            }
            let path = one.shortest_path(i, j);
            if path.len() <= 2 {
                continue;
            }
            let cycle = CycleInequality::new(path);
            if ctx.is_violated(&cycle) {
                cuts.push(Inequality::from(cycle));
            }
        }
        most_violated(cuts, ctx, self.max_cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::Formulation;
    use crate::graph::SignedGraph;
    use crate::inequality::ValidInequality;
    use crate::separation::test_support::values;

    fn square() -> Formulation {
        // 4-cycle with one repulsive edge.
        Formulation::sparse(
            SignedGraph::new(4, vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (0, 3, -1.0)]).unwrap(),
        )
    }

    #[test]
    fn test_finds_frustrated_square() {
        let f = square();
        let x = values(f.index(), &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (0, 3, 0.0)]);
        let ctx = SeparationContext::new(&f, &x);
        let cuts = CycleBfsSeparator::new().separate(&ctx);
        assert_eq!(cuts.len(), 1);
        match &cuts[0] {
            Inequality::Cycle(c) => assert_eq!(c.path(), &[0, 1, 2, 3]),
            other => panic!("unexpected {other}"),
        }
        assert!((cuts[0].slack(&x) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_consistent_point_has_no_cut() {
        let f = square();
        let x = values(f.index(), &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 0.0), (0, 3, 0.0)]);
        let ctx = SeparationContext::new(&f, &x);
        assert!(CycleBfsSeparator::new().separate(&ctx).is_empty());
    }

    #[test]
    fn test_fractional_violation_needs_margin() {
        let f = square();
        let x = values(f.index(), &[(0, 1, 0.7), (1, 2, 0.7), (2, 3, 0.7), (0, 3, 0.2)]);
        let ctx = SeparationContext::new(&f, &x);
        // 2.1 - 0.2 = 1.9 <= 2: not violated.
        assert!(CycleBfsSeparator::new().separate(&ctx).is_empty());

        let x = values(f.index(), &[(0, 1, 0.9), (1, 2, 0.9), (2, 3, 0.9), (0, 3, 0.1)]);
        let ctx = SeparationContext::new(&f, &x);
        let cuts = CycleBfsSeparator::new().with_max_cuts(5).separate(&ctx);
        assert_eq!(cuts.len(), 1);
        assert!(cuts[0].slack(&x) < -ctx.eps);
    }
}
