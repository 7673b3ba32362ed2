use std::collections::HashSet;

use crate::inequality::{Inequality, TriangleInequality};

use super::{most_violated, SeparationContext, Separator};

/// Triangle separation over the complete variable space.
///
/// Candidates are pairs `i < j` with `x_ij < 0.5` and a common vertex `k`
/// with `x_ik > 0.5` and `x_jk > 0.5`, giving `s = k, t1 = i, t2 = j`. Only
/// vertices already known to be "high" neighbours of `i` are tried as `k`.
#[derive(Debug, Clone, Default)]
pub struct TriangleSeparator {
    reduced: bool,
    max_cuts: Option<usize>,
}

impl TriangleSeparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider triangles where `s` has a positive weight to `t1` or `t2`.
    pub fn reduced(mut self, reduced: bool) -> Self {
        self.reduced = reduced;
        self
    }

    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.max_cuts = Some(max_cuts);
        self
    }
}

impl Separator for TriangleSeparator {
    fn name(&self) -> &str {
        if self.reduced {
            "triangle-reduced"
        } else {
            "triangle"
        }
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        let n = ctx.formulation.n();
        let x = ctx.values.to_matrix();
        let high: Vec<Vec<usize>> = (0..n)
            .map(|i| (0..n).filter(|&k| k != i && x.get(i, k) > 0.5).collect())
            .collect();

        let mut seen = HashSet::new();
        let mut cuts = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                if x.get(i, j) >= 0.5 {
                    continue;
                }
                for &k in &high[i] {
                    if k == j || x.get(j, k) <= 0.5 {
                        continue;
                    }
                    if self.reduced
                        && ctx.formulation.edge_weight(k, i) <= 0.0
                        && ctx.formulation.edge_weight(k, j) <= 0.0
                    {
                        continue;
                    }
                    let triangle = TriangleInequality::new(k, i, j);
                    if ctx.is_violated(&triangle) && seen.insert(triangle) {
                        cuts.push(Inequality::from(triangle));
                    }
                }
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
    use crate::separation::test_support::{complete, values};

    #[test]
    fn test_finds_open_triangle() {
        let f = complete(3);
        let x = values(f.index(), &[(0, 2, 1.0), (1, 2, 1.0)]);
        let ctx = SeparationContext::new(&f, &x);
        let cuts = TriangleSeparator::new().separate(&ctx);
        assert_eq!(cuts, vec![Inequality::from(TriangleInequality::new(2, 0, 1))]);
    }

    #[test]
    fn test_every_cut_is_violated() {
        let f = complete(6);
        let mut entries = Vec::new();
        for i in 0..6 {
            for j in i + 1..6 {
                let v = ((i * 7 + j * 3) % 10) as f64 / 10.0;
                entries.push((i, j, v));
            }
        }
        let x = values(f.index(), &entries);
        let ctx = SeparationContext::new(&f, &x);
        let cuts = TriangleSeparator::new().separate(&ctx);
        for cut in &cuts {
            assert!(cut.slack(&x) < -ctx.eps);
        }
        let capped = TriangleSeparator::new().with_max_cuts(2).separate(&ctx);
        assert!(capped.len() <= 2);
    }

    #[test]
    fn test_reduced_form_skips_repulsive_centres() {
        // s = 2 repels both 0 and 1.
        let g = SignedGraph::new(3, vec![(0, 2, -1.0), (1, 2, -1.0), (0, 1, 1.0)]).unwrap();
        let f = Formulation::complete(g);
        let x = values(f.index(), &[(0, 2, 1.0), (1, 2, 1.0)]);
        let ctx = SeparationContext::new(&f, &x);
        assert_eq!(TriangleSeparator::new().separate(&ctx).len(), 1);
        assert!(TriangleSeparator::new().reduced(true).separate(&ctx).is_empty());
    }
}
