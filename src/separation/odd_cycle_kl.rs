use bitvec::prelude::*;
use rand::seq::index::sample;
use rand::Rng;

use crate::inequality::{Inequality, OddCycleInequality};
use crate::snapshot::ValueMatrix;

use super::kernighan_lin::{keep_best, search, Candidate, KlReport, KlSettings, KlStrategy};
use super::{RngSource, SeparationContext, Separator};

const OUTSIDE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMove {
    /// Vertex `new` (outside the cycle) takes position `pos` from `old`.
    Replace { pos: usize, old: usize, new: usize },
    /// The vertices at two positions at cyclic distance at least 3 trade places.
    Swap { p1: usize, p2: usize, v1: usize, v2: usize },
}

/// Local search over a cyclic sequence `C` of fixed odd length `k = 2p + 1`.
///
/// Sub-slacks: `g[v][q] = x(v, C[q-1]) + x(v, C[q+1]) - x(v, C[q-2]) - x(v, C[q+2])`,
/// the left-hand side contributed by placing `v` at position `q`. A vertex
/// that leaves the cycle cannot re-enter it during the phase, and each pair
/// of cycle vertices is swapped at most once.
#[derive(Debug, Clone)]
pub struct OddCycleStrategy<'a> {
    x: &'a ValueMatrix,
    k: usize,
    cycle: Vec<usize>,
    position: Vec<usize>,
    g: Vec<f64>,
    locked: BitVec,
    swapped: BitVec,
}

impl<'a> OddCycleStrategy<'a> {
    pub fn new(x: &'a ValueMatrix, k: usize) -> Self {
        let n = x.n();
        debug_assert!(k >= 5 && k % 2 == 1 && k <= n);
        Self {
            x,
            k,
            cycle: Vec::with_capacity(k),
            position: vec![OUTSIDE; n],
            g: vec![0.0; n * k],
            locked: bitvec![0; n],
            swapped: bitvec![0; n * n],
        }
    }

    fn n(&self) -> usize {
        self.position.len()
    }

    fn at(&self, pos: isize) -> usize {
        self.cycle[pos.rem_euclid(self.k as isize) as usize]
    }

    fn gain(&self, v: usize, pos: usize) -> f64 {
        self.g[v * self.k + pos]
    }

    fn lhs(&self) -> f64 {
        (0..self.k as isize)
            .map(|i| self.x.get(self.at(i), self.at(i + 1)) - self.x.get(self.at(i), self.at(i + 2)))
            .sum()
    }

    fn bound(&self) -> f64 {
        ((self.k - 1) / 2) as f64
    }

    fn cyclic_distance(&self, p1: usize, p2: usize) -> usize {
        let d = p1.abs_diff(p2);
        d.min(self.k - d)
    }

    fn sync_positions(&mut self) {
        self.position.fill(OUTSIDE);
        for (pos, &v) in self.cycle.iter().enumerate() {
            self.position[v] = pos;
        }
    }

    /// Position `pos` changed from `old` to `new`.
    fn shift(&mut self, pos: usize, old: usize, new: usize) {
        let k = self.k as isize;
        let p = pos as isize;
        for (offset, coef) in [(1, 1.0), (-1, 1.0), (2, -1.0), (-2, -1.0)] {
            let q = (p + offset).rem_euclid(k) as usize;
            for i in 0..self.n() {
                self.g[i * self.k + q] += coef * (self.x.get(i, new) - self.x.get(i, old));
            }
        }
    }
}

impl KlStrategy for OddCycleStrategy<'_> {
    type Transformation = CycleMove;
    type Structure = Vec<usize>;

    fn initialize_structure<R: Rng>(&mut self, rng: &mut R) {
        self.cycle = sample(rng, self.n(), self.k).into_vec();
        self.sync_positions();
    }

    fn initialize_sub_slacks(&mut self) {
        let k = self.k as isize;
        for v in 0..self.n() {
            for q in 0..k {
                let value = self.x.get(v, self.at(q - 1)) + self.x.get(v, self.at(q + 1))
                    - self.x.get(v, self.at(q - 2))
                    - self.x.get(v, self.at(q + 2));
                self.g[v * self.k + q as usize] = value;
            }
        }
        self.locked.fill(false);
        self.swapped.fill(false);
    }

    fn slack(&self) -> f64 {
        self.bound() - self.lhs()
    }

    fn best_transformation(&self) -> Option<Candidate<CycleMove>> {
        let n = self.n();
        let lhs = self.lhs();
        let bound = self.bound();
        let mut best = None;

        for pos in 0..self.k {
            let old = self.cycle[pos];
            let leaving = self.gain(old, pos);
            for new in 0..n {
                if self.position[new] != OUTSIDE || self.locked[new] {
                    continue;
                }
                let change = self.gain(new, pos) - leaving;
                keep_best(
                    &mut best,
                    Candidate {
                        transformation: CycleMove::Replace { pos, old, new },
                        delta: -change,
                        ratio: (lhs + change) / bound,
                    },
                );
            }
        }

        for p1 in 0..self.k {
            for p2 in p1 + 1..self.k {
                if self.cyclic_distance(p1, p2) < 3 {
                    continue;
                }
                let v1 = self.cycle[p1];
                let v2 = self.cycle[p2];
                if self.swapped[v1 * n + v2] {
                    continue;
                }
                let change = self.gain(v2, p1) - self.gain(v1, p1) + self.gain(v1, p2)
                    - self.gain(v2, p2);
                keep_best(
                    &mut best,
                    Candidate {
                        transformation: CycleMove::Swap { p1, p2, v1, v2 },
                        delta: -change,
                        ratio: (lhs + change) / bound,
                    },
                );
            }
        }
        best
    }

    fn apply_transformation(&mut self, t: CycleMove) {
        match t {
            CycleMove::Replace { pos, old, new } => {
                debug_assert_eq!(self.cycle[pos], old);
                self.cycle[pos] = new;
                self.position[old] = OUTSIDE;
                self.position[new] = pos;
                self.locked.set(old, true);
            }
            CycleMove::Swap { p1, p2, v1, v2 } => {
                debug_assert!(self.cycle[p1] == v1 && self.cycle[p2] == v2);
                let n = self.n();
                self.cycle.swap(p1, p2);
                self.position[v1] = p2;
                self.position[v2] = p1;
                self.swapped.set(v1 * n + v2, true);
                self.swapped.set(v2 * n + v1, true);
            }
        }
    }

    fn update_sub_slacks(&mut self, t: CycleMove) {
        match t {
            CycleMove::Replace { pos, old, new } => self.shift(pos, old, new),
            CycleMove::Swap { p1, p2, v1, v2 } => {
                self.shift(p1, v1, v2);
                self.shift(p2, v2, v1);
            }
        }
    }

    fn structure(&self) -> Vec<usize> {
        self.cycle.clone()
    }

    fn restore(&mut self, structure: Vec<usize>) {
        self.cycle = structure;
        self.sync_positions();
    }

    fn to_inequality(&self, structure: &Vec<usize>) -> Inequality {
        OddCycleInequality::new(structure.clone()).into()
    }
}

/// Kernighan–Lin separation of two-chorded odd cycle inequalities.
///
/// Without explicit sizes every odd length from 5 to `n` is searched.
#[derive(Debug)]
pub struct OddCycleKlSeparator {
    settings: KlSettings,
    sizes: Option<Vec<usize>>,
    rng: RngSource,
}

impl Default for OddCycleKlSeparator {
    fn default() -> Self {
        Self::new(KlSettings::default().with_iterations(2), None, None)
    }
}

impl OddCycleKlSeparator {
    pub fn new(settings: KlSettings, sizes: Option<Vec<usize>>, seed: Option<u64>) -> Self {
        Self {
            settings,
            sizes,
            rng: RngSource::new(seed),
        }
    }

    fn sizes(&self, n: usize) -> Vec<usize> {
        match &self.sizes {
            Some(sizes) => sizes
                .iter()
                .copied()
                .filter(|&k| k >= 5 && k % 2 == 1 && k <= n)
                .collect(),
            None => (5..=n).step_by(2).collect(),
        }
    }

    /// Runs the search for every size and merges the reports.
    pub fn search(&self, ctx: &SeparationContext<'_>) -> KlReport {
        let n = ctx.formulation.n();
        let mut merged = KlReport::default();
        let sizes = self.sizes(n);
        if sizes.is_empty() {
            return merged;
        }
        let x = ctx.values.to_matrix();
        let mut rng = self.rng.next_rng();
        for k in sizes {
            let mut strategy = OddCycleStrategy::new(&x, k);
            let report = search(&mut strategy, &self.settings, ctx.values, ctx.eps, &mut rng);
            merged.phase_slacks.extend(report.phase_slacks);
            merged.cuts.extend(report.cuts);
            if self.settings.stop_on_first_cut && !merged.cuts.is_empty() {
                break;
            }
        }
        merged
    }
}

impl Separator for OddCycleKlSeparator {
    fn name(&self) -> &str {
        "odd-cycle-kl"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        self.search(ctx).cuts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inequality::ValidInequality;
    use crate::separation::test_support::{complete, values};
    use rand::{rngs::StdRng, SeedableRng};

    fn random_point(n: usize, rng: &mut StdRng) -> Vec<(usize, usize, f64)> {
        let mut entries = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                entries.push((i, j, rng.gen_range(0.0..1.0)));
            }
        }
        entries
    }

    /// Pentagon 0-1-2-3-4 at 1, every other pair at 0.
    fn pentagon_point(n: usize) -> (crate::formulation::Formulation, crate::snapshot::ValueSnapshot) {
        let f = complete(n);
        let entries: Vec<_> = (0..5).map(|i| (i, (i + 1) % 5, 1.0)).collect();
        let x = values(f.index(), &entries);
        (f, x)
    }

    #[test]
    fn test_incremental_slack_matches_recomputation() {
        let n = 9;
        let f = complete(n);
        let mut rng = StdRng::seed_from_u64(3);
        let snapshot = values(f.index(), &random_point(n, &mut rng));
        let x = snapshot.to_matrix();
        let mut strategy = OddCycleStrategy::new(&x, 7);
        strategy.initialize_structure(&mut rng);
        strategy.initialize_sub_slacks();
        let mut current = strategy.slack();
        let mut steps = 0;
        while let Some(candidate) = strategy.best_transformation() {
            strategy.apply_transformation(candidate.transformation);
            strategy.update_sub_slacks(candidate.transformation);
            current += candidate.delta;
            let direct = strategy.to_inequality(&strategy.structure()).slack(&snapshot);
            assert!((current - direct).abs() < 1e-9);
            steps += 1;
            assert!(steps < 1000);
        }
    }

    #[test]
    fn test_replacement_closes_pentagon() {
        let (_, snapshot) = pentagon_point(7);
        let x = snapshot.to_matrix();
        let mut strategy = OddCycleStrategy::new(&x, 5);
        strategy.restore(vec![0, 1, 2, 3, 5]);
        strategy.initialize_sub_slacks();
        // Three cycle edges at 1, nothing on the chords: lhs 3 against bound 2.
        assert!((strategy.slack() + 1.0).abs() < 1e-12);

        let mut current = strategy.slack();
        let mut best = current;
        while let Some(candidate) = strategy.best_transformation() {
            strategy.apply_transformation(candidate.transformation);
            strategy.update_sub_slacks(candidate.transformation);
            current += candidate.delta;
            best = best.min(current);
        }
        assert!((best + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_finds_violated_pentagon() {
        // On five vertices only the pentagon order itself is violated.
        let (f, x) = pentagon_point(5);
        let ctx = SeparationContext::new(&f, &x);
        let separator = OddCycleKlSeparator::new(
            KlSettings::default().with_iterations(200),
            Some(vec![5]),
            Some(2),
        );
        let cuts = separator.separate(&ctx);
        assert_eq!(cuts.len(), 1);
        assert!((cuts[0].slack(&x) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_sizes_are_odd() {
        let separator = OddCycleKlSeparator::default();
        assert_eq!(separator.sizes(10), vec![5, 7, 9]);
        assert!(separator.sizes(4).is_empty());
        let explicit = OddCycleKlSeparator::new(KlSettings::default(), Some(vec![3, 5, 6, 11]), None);
        assert_eq!(explicit.sizes(9), vec![5]);
    }

    #[test]
    fn test_phases_improve_and_terminate() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 5..=12 {
            let f = complete(n);
            let snapshot = values(f.index(), &random_point(n, &mut rng));
            let ctx = SeparationContext::new(&f, &snapshot);
            let separator = OddCycleKlSeparator::new(
                KlSettings::default().with_iterations(3).with_stop_on_first_cut(false),
                None,
                Some(n as u64),
            );
            let report = separator.search(&ctx);
            for trace in &report.phase_slacks {
                for pair in trace.windows(2) {
                    assert!(pair[1] < pair[0]);
                }
            }
            for cut in &report.cuts {
                assert!(cut.slack(&snapshot) < -ctx.eps);
            }
        }
    }

    #[test]
    fn test_small_graph_is_skipped() {
        let f = complete(4);
        let x = values(f.index(), &[(0, 1, 1.0)]);
        let ctx = SeparationContext::new(&f, &x);
        assert!(OddCycleKlSeparator::default().separate(&ctx).is_empty());
    }
}
