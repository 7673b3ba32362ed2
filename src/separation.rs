//! Separation algorithms: given relaxation values, find violated inequalities.
//!
//! Separators are shared between the root cutting-plane loop and concurrent
//! branch-and-bound callbacks, so they are `Send + Sync`, take `&self`, and
//! keep every piece of scratch state local to one [`Separator::separate`] call.

pub mod cycle_bfs;
pub mod cycle_dijkstra;
pub mod kernighan_lin;
pub mod odd_cycle_kl;
pub mod triangle;
pub mod two_partition_greedy;
pub mod two_partition_kl;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::formulation::Formulation;
use crate::inequality::{Inequality, ValidInequality};
use crate::snapshot::ValueSnapshot;

pub use cycle_bfs::CycleBfsSeparator;
pub use cycle_dijkstra::CycleDijkstraSeparator;
pub use kernighan_lin::{KlSettings, KlStrategy};
pub use odd_cycle_kl::OddCycleKlSeparator;
pub use triangle::TriangleSeparator;
pub use two_partition_greedy::{GrotschellSeparator, LabbeSeparator};
pub use two_partition_kl::TwoPartitionKlSeparator;

/// Separation tolerance: a candidate is kept when its slack is below `-eps`.
pub const SEPARATION_EPS: f64 = 1e-4;

/// Everything one separation call may read. Built fresh for every call.
#[derive(Debug, Clone, Copy)]
pub struct SeparationContext<'a> {
    pub formulation: &'a Formulation,
    pub values: &'a ValueSnapshot,
    pub eps: f64,
}

impl<'a> SeparationContext<'a> {
    pub fn new(formulation: &'a Formulation, values: &'a ValueSnapshot) -> Self {
        Self {
            formulation,
            values,
            eps: SEPARATION_EPS,
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn is_violated(&self, inequality: &dyn ValidInequality) -> bool {
        inequality.slack(self.values) < -self.eps
    }
}

/// A separation algorithm for one inequality family.
pub trait Separator: Send + Sync {
    fn name(&self) -> &str;

    /// Violated inequalities for the values in `ctx`, each with slack below `-ctx.eps`.
    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality>;
}

/// Drops duplicates, orders by slack (most violated first, stable otherwise)
/// and keeps at most `max_cuts`.
pub fn most_violated(
    cuts: Vec<Inequality>,
    ctx: &SeparationContext<'_>,
    max_cuts: Option<usize>,
) -> Vec<Inequality> {
    let mut seen = HashSet::new();
    let mut scored: Vec<(f64, Inequality)> = cuts
        .into_iter()
        .filter(|cut| seen.insert(cut.canonical()))
        .map(|cut| (cut.slack(ctx.values), cut))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    if let Some(max) = max_cuts {
        scored.truncate(max);
    }
    scored.into_iter().map(|(_, cut)| cut).collect()
}

/// Per-call random streams for randomized separators.
///
/// With a base seed, call `k` is seeded from `seed + k`, which makes runs
/// reproducible; otherwise each call draws a seed from the thread RNG.
#[derive(Debug, Default)]
pub struct RngSource {
    seed: Option<u64>,
    calls: AtomicU64,
}

impl RngSource {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            calls: AtomicU64::new(0),
        }
    }

    pub fn next_rng(&self) -> ChaCha8Rng {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let seed = match self.seed {
            Some(base) => base.wrapping_add(call),
            None => rand::thread_rng().gen(),
        };
        ChaCha8Rng::seed_from_u64(seed)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::formulation::{Formulation, VariableIndex};
    use crate::graph::{EdgeKey, SignedGraph};
    use crate::snapshot::ValueSnapshot;

    /// Complete formulation on `n` vertices where every pair attracts with weight 1.
    pub fn complete(n: usize) -> Formulation {
        let mut edges = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                edges.push((i, j, 1.0));
            }
        }
        Formulation::complete(SignedGraph::new(n, edges).unwrap())
    }

    pub fn values(index: &Arc<VariableIndex>, entries: &[(usize, usize, f64)]) -> ValueSnapshot {
        let assignment: Vec<_> = entries
            .iter()
            .map(|&(i, j, v)| (EdgeKey::new(i, j), v))
            .collect();
        ValueSnapshot::from_assignment(index.clone(), &assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::inequality::TriangleInequality;

    #[test]
    fn test_most_violated_orders_and_caps() {
        let f = complete(4);
        let values = values(
            f.index(),
            &[(0, 1, 1.0), (0, 2, 1.0), (0, 3, 0.8), (1, 3, 0.2)],
        );
        let ctx = SeparationContext::new(&f, &values);
        let cuts = vec![
            TriangleInequality::new(0, 1, 3).into(),
            TriangleInequality::new(0, 1, 2).into(),
            TriangleInequality::new(0, 2, 1).into(),
        ];
        let kept = most_violated(cuts, &ctx, Some(1));
        assert_eq!(kept, vec![Inequality::from(TriangleInequality::new(0, 1, 2))]);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a = RngSource::new(Some(7));
        let b = RngSource::new(Some(7));
        let x: u64 = a.next_rng().gen();
        let y: u64 = b.next_rng().gen();
        assert_eq!(x, y);
        let z: u64 = a.next_rng().gen();
        assert_ne!(x, z);
    }
}
