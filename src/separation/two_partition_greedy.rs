//! Constructive 2-partition heuristics with `S = {v}`.

use rand::seq::SliceRandom;

use crate::inequality::{Inequality, TwoPartitionInequality};
use crate::snapshot::ValueMatrix;

use super::{most_violated, RngSource, SeparationContext, Separator};

/// Grötschel–Wakabayashi star heuristic.
///
/// For each vertex `v`, its fractional neighbours are shuffled and added to
/// `T` greedily. The first rule only accepts a neighbour whose values to all
/// of `T` are zero; when a full sweep with that rule finds nothing, a second
/// sweep accepts `w` while `x(w, v) - Σ_{t in T} x(w, t)` stays non-negative.
#[derive(Debug, Default)]
pub struct GrotschellSeparator {
    max_cuts: Option<usize>,
    rng: RngSource,
}

impl GrotschellSeparator {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            max_cuts: None,
            rng: RngSource::new(seed),
        }
    }

    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.max_cuts = Some(max_cuts);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acceptance {
    Disjoint,
    NonNegativeGain,
}

fn grow_star(
    x: &ValueMatrix,
    v: usize,
    neighbours: &[usize],
    rule: Acceptance,
    eps: f64,
) -> Vec<usize> {
    let mut t = vec![neighbours[0]];
    for &w in &neighbours[1..] {
        let accept = match rule {
            Acceptance::Disjoint => t.iter().all(|&u| x.get(w, u) < eps),
            Acceptance::NonNegativeGain => {
                let gain = x.get(w, v) - t.iter().map(|&u| x.get(w, u)).sum::<f64>();
                gain >= -eps
            }
        };
        if accept {
            t.push(w);
        }
    }
    t
}

impl Separator for GrotschellSeparator {
    fn name(&self) -> &str {
        "2-partition-grotschel"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        let n = ctx.formulation.n();
        let x = ctx.values.to_matrix();
        let mut rng = self.rng.next_rng();
        let budget = self.max_cuts.map(|m| m.saturating_mul(5));

        let mut cuts = Vec::new();
        for rule in [Acceptance::Disjoint, Acceptance::NonNegativeGain] {
            for v in 0..n {
                if budget.is_some_and(|b| cuts.len() >= b) {
                    break;
                }
                let mut neighbours: Vec<usize> = (0..n)
                    .filter(|&w| w != v && x.get(v, w) > ctx.eps && x.get(v, w) < 1.0 - ctx.eps)
                    .collect();
                if neighbours.len() < 2 {
                    continue;
                }
                neighbours.shuffle(&mut rng);
                let t = grow_star(&x, v, &neighbours, rule, ctx.eps);
                if t.len() < 2 {
                    continue;
                }
                let ineq = TwoPartitionInequality::new(vec![v], t);
                if ctx.is_violated(&ineq) {
                    cuts.push(Inequality::from(ineq));
                }
            }
            if !cuts.is_empty() {
                break;
            }
        }
        most_violated(cuts, ctx, self.max_cuts)
    }
}

/// Labbé star heuristic.
///
/// Seeds `s` are tried in random order. `T` grows from the fractional
/// neighbours of `s` while adding a candidate `c` raises the score by
/// `x(s, c) - x(c, T) > 0`. The first star with `|T| > 2` and score above
/// `1` is returned.
#[derive(Debug, Default)]
pub struct LabbeSeparator {
    rng: RngSource,
}

impl LabbeSeparator {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: RngSource::new(seed),
        }
    }
}

impl Separator for LabbeSeparator {
    fn name(&self) -> &str {
        "2-partition-labbe"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        let n = ctx.formulation.n();
        let x = ctx.values.to_matrix();
        let mut rng = self.rng.next_rng();
        let mut seeds: Vec<usize> = (0..n).collect();
        seeds.shuffle(&mut rng);

        for &s in &seeds {
            let mut t: Vec<usize> = Vec::new();
            let mut score = 0.0;
            for c in (0..n).filter(|&c| c != s && x.get(s, c) > ctx.eps) {
                let gain = x.get(s, c) - t.iter().map(|&u| x.get(c, u)).sum::<f64>();
                if gain <= ctx.eps {
                    continue;
                }
                t.push(c);
                score += gain;
                if t.len() > 2 && score > 1.0 + ctx.eps {
                    let ineq = TwoPartitionInequality::new(vec![s], t);
                    if ctx.is_violated(&ineq) {
                        return vec![ineq.into()];
                    }
                    break;
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inequality::ValidInequality;
    use crate::separation::test_support::{complete, values};

    fn fractional_star() -> (crate::formulation::Formulation, crate::snapshot::ValueSnapshot) {
        let f = complete(5);
        let x = values(
            f.index(),
            &[(0, 1, 0.5), (0, 2, 0.5), (0, 3, 0.5), (0, 4, 0.5)],
        );
        (f, x)
    }

    #[test]
    fn test_grotschell_finds_star() {
        let (f, x) = fractional_star();
        let ctx = SeparationContext::new(&f, &x);
        let cuts = GrotschellSeparator::new(Some(3)).separate(&ctx);
        assert!(!cuts.is_empty());
        for cut in &cuts {
            assert!(cut.slack(&x) < -ctx.eps);
            match cut {
                Inequality::TwoPartition(p) => assert_eq!(p.s(), &[0]),
                other => panic!("unexpected {other}"),
            }
        }
    }

    #[test]
    fn test_labbe_finds_star() {
        let (f, x) = fractional_star();
        let ctx = SeparationContext::new(&f, &x);
        let cuts = LabbeSeparator::new(Some(11)).separate(&ctx);
        assert_eq!(cuts.len(), 1);
        assert!(cuts[0].slack(&x) < -ctx.eps);
    }

    #[test]
    fn test_integral_transitive_point_has_no_star() {
        let f = complete(4);
        let x = values(f.index(), &[(0, 1, 1.0), (2, 3, 1.0)]);
        let ctx = SeparationContext::new(&f, &x);
        assert!(GrotschellSeparator::new(Some(1)).separate(&ctx).is_empty());
        assert!(LabbeSeparator::new(Some(1)).separate(&ctx).is_empty());
    }
}
