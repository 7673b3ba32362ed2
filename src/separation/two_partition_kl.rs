use bitvec::prelude::*;
use rand::Rng;

use crate::inequality::{Inequality, TwoPartitionInequality};
use crate::snapshot::ValueMatrix;

use super::kernighan_lin::{keep_best, search, Candidate, KlReport, KlSettings, KlStrategy};
use super::{RngSource, SeparationContext, Separator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    S = 0,
    T = 1,
    U = 2,
}

const SIDES: [Side; 3] = [Side::S, Side::T, Side::U];

/// A move of one vertex, or the exchange of two vertices on different sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMove {
    Move { v: usize, from: Side, to: Side },
    Exchange { u: usize, u_side: Side, v: usize, v_side: Side },
}

/// Local search over `(S, T, U)` for `x(S, T) - x(S) - x(T) <= |S|`.
///
/// Sub-slacks: `a[v] = x(v, S \ v)` and `b[v] = x(v, T \ v)`. Relative to
/// leaving it in `U`, vertex `v` adds `b - a` to the left-hand side when in
/// `S` and `a - b` when in `T`. A vertex never returns to a side it already
/// occupied during the phase, and each pair is exchanged at most once.
#[derive(Debug, Clone)]
pub struct TwoPartitionStrategy<'a> {
    x: &'a ValueMatrix,
    side: Vec<Side>,
    s_count: usize,
    t_count: usize,
    a: Vec<f64>,
    b: Vec<f64>,
    visited: BitVec,
    exchanged: BitVec,
}

impl<'a> TwoPartitionStrategy<'a> {
    pub fn new(x: &'a ValueMatrix) -> Self {
        let n = x.n();
        Self {
            x,
            side: vec![Side::U; n],
            s_count: 0,
            t_count: 0,
            a: vec![0.0; n],
            b: vec![0.0; n],
            visited: bitvec![0; n * 3],
            exchanged: bitvec![0; n * n],
        }
    }

    fn n(&self) -> usize {
        self.side.len()
    }

    fn recount(&mut self) {
        self.s_count = self.side.iter().filter(|&&s| s == Side::S).count();
        self.t_count = self.side.iter().filter(|&&s| s == Side::T).count();
    }

    fn contribution(side: Side, a: f64, b: f64) -> f64 {
        match side {
            Side::S => b - a,
            Side::T => a - b,
            Side::U => 0.0,
        }
    }

    fn lhs(&self) -> f64 {
        let mut within_s = 0.0;
        let mut across = 0.0;
        let mut within_t = 0.0;
        for v in 0..self.n() {
            match self.side[v] {
                Side::S => {
                    within_s += self.a[v];
                    across += self.b[v];
                }
                Side::T => within_t += self.b[v],
                Side::U => {}
            }
        }
        across - within_s / 2.0 - within_t / 2.0
    }

    fn seen(&self, v: usize, side: Side) -> bool {
        self.visited[v * 3 + side as usize]
    }

    fn mark(&mut self, v: usize, side: Side) {
        self.visited.set(v * 3 + side as usize, true);
    }

    fn shift(&mut self, v: usize, from: Side, to: Side) {
        for w in 0..self.n() {
            if w == v {
                continue;
            }
            let value = self.x.get(w, v);
            match from {
                Side::S => self.a[w] -= value,
                Side::T => self.b[w] -= value,
                Side::U => {}
            }
            match to {
                Side::S => self.a[w] += value,
                Side::T => self.b[w] += value,
                Side::U => {}
            }
        }
    }

    fn random_member<R: Rng>(&self, side: Side, rng: &mut R) -> Option<usize> {
        let members: Vec<usize> = (0..self.n()).filter(|&v| self.side[v] == side).collect();
        if members.is_empty() {
            None
        } else {
            Some(members[rng.gen_range(0..members.len())])
        }
    }
}

impl KlStrategy for TwoPartitionStrategy<'_> {
    type Transformation = PartitionMove;
    type Structure = Vec<Side>;

    fn initialize_structure<R: Rng>(&mut self, rng: &mut R) {
        let n = self.n();
        for v in 0..n {
            self.side[v] = SIDES[rng.gen_range(0..3)];
        }
        self.recount();

        if self.s_count >= self.t_count {
            if self.s_count == self.t_count {
                let moved = match self.random_member(Side::S, rng) {
                    Some(s) => s,
                    None => rng.gen_range(0..n),
                };
                self.side[moved] = Side::T;
            } else {
                for side in &mut self.side {
                    *side = match *side {
                        Side::S => Side::T,
                        Side::T => Side::S,
                        Side::U => Side::U,
                    };
                }
            }
            self.recount();
        }

        if self.s_count == 0 {
            if self.t_count == 1 {
                let mut t = rng.gen_range(0..n);
                while self.side[t] == Side::T {
                    t = (t + 1) % n;
                }
                self.side[t] = Side::T;
                self.recount();
            }
            let mut s = rng.gen_range(0..n);
            if self.t_count < n {
                while self.side[s] == Side::T {
                    s = (s + 1) % n;
                }
            }
            self.side[s] = Side::S;
            self.recount();
        }
        debug_assert!(self.s_count >= 1 && self.s_count < self.t_count);
    }

    fn initialize_sub_slacks(&mut self) {
        let n = self.n();
        for w in 0..n {
            let row = self.x.row(w);
            let mut a = 0.0;
            let mut b = 0.0;
            for (v, &value) in row.iter().enumerate() {
                match self.side[v] {
                    Side::S if v != w => a += value,
                    Side::T if v != w => b += value,
                    _ => {}
                }
            }
            self.a[w] = a;
            self.b[w] = b;
        }
        self.visited.fill(false);
        self.exchanged.fill(false);
        for v in 0..n {
            let side = self.side[v];
            self.mark(v, side);
        }
    }

    fn slack(&self) -> f64 {
        self.s_count as f64 - self.lhs()
    }

    fn best_transformation(&self) -> Option<Candidate<PartitionMove>> {
        let n = self.n();
        let lhs = self.lhs();
        let mut best = None;

        for v in 0..n {
            let from = self.side[v];
            let current = Self::contribution(from, self.a[v], self.b[v]);
            for to in SIDES {
                if to == from || self.seen(v, to) {
                    continue;
                }
                let s = self.s_count + usize::from(to == Side::S) - usize::from(from == Side::S);
                let t = self.t_count + usize::from(to == Side::T) - usize::from(from == Side::T);
                if s < 1 || s >= t {
                    continue;
                }
                let change = Self::contribution(to, self.a[v], self.b[v]) - current;
                let delta = (s as f64 - self.s_count as f64) - change;
                keep_best(
                    &mut best,
                    Candidate {
                        transformation: PartitionMove::Move { v, from, to },
                        delta,
                        ratio: (lhs + change) / s as f64,
                    },
                );
            }
        }

        for u in 0..n {
            let u_side = self.side[u];
            for v in u + 1..n {
                let v_side = self.side[v];
                if v_side == u_side || self.exchanged[u * n + v] {
                    continue;
                }
                let first = Self::contribution(v_side, self.a[u], self.b[u])
                    - Self::contribution(u_side, self.a[u], self.b[u]);
                let xuv = self.x.get(u, v);
                let mut a = self.a[v];
                let mut b = self.b[v];
                match u_side {
                    Side::S => a -= xuv,
                    Side::T => b -= xuv,
                    Side::U => {}
                }
                match v_side {
                    Side::S => a += xuv,
                    Side::T => b += xuv,
                    Side::U => {}
                }
                let second = Self::contribution(u_side, a, b) - Self::contribution(v_side, a, b);
                let change = first + second;
                keep_best(
                    &mut best,
                    Candidate {
                        transformation: PartitionMove::Exchange {
                            u,
                            u_side,
                            v,
                            v_side,
                        },
                        delta: -change,
                        ratio: (lhs + change) / self.s_count as f64,
                    },
                );
            }
        }
        best
    }

    fn apply_transformation(&mut self, t: PartitionMove) {
        match t {
            PartitionMove::Move { v, from, to } => {
                debug_assert_eq!(self.side[v], from);
                self.side[v] = to;
                self.mark(v, to);
            }
            PartitionMove::Exchange {
                u,
                u_side,
                v,
                v_side,
            } => {
                debug_assert!(self.side[u] == u_side && self.side[v] == v_side);
                let n = self.n();
                self.side[u] = v_side;
                self.side[v] = u_side;
                self.mark(u, v_side);
                self.mark(v, u_side);
                self.exchanged.set(u * n + v, true);
            }
        }
        self.recount();
        debug_assert!(self.s_count >= 1 && self.s_count < self.t_count);
    }

    fn update_sub_slacks(&mut self, t: PartitionMove) {
        match t {
            PartitionMove::Move { v, from, to } => self.shift(v, from, to),
            PartitionMove::Exchange {
                u,
                u_side,
                v,
                v_side,
            } => {
                self.shift(u, u_side, v_side);
                self.shift(v, v_side, u_side);
            }
        }
    }

    fn structure(&self) -> Vec<Side> {
        self.side.clone()
    }

    fn restore(&mut self, structure: Vec<Side>) {
        self.side = structure;
        self.recount();
    }

    fn to_inequality(&self, structure: &Vec<Side>) -> Inequality {
        let members = |side: Side| -> Vec<usize> {
            (0..structure.len())
                .filter(|&v| structure[v] == side)
                .collect()
        };
        TwoPartitionInequality::new(members(Side::S), members(Side::T)).into()
    }
}

/// Kernighan–Lin separation of 2-partition inequalities.
#[derive(Debug, Default)]
pub struct TwoPartitionKlSeparator {
    settings: KlSettings,
    rng: RngSource,
}

impl TwoPartitionKlSeparator {
    pub fn new(settings: KlSettings, seed: Option<u64>) -> Self {
        Self {
            settings,
            rng: RngSource::new(seed),
        }
    }

    /// Runs the search and returns the full report, phase trace included.
    pub fn search(&self, ctx: &SeparationContext<'_>) -> KlReport {
        if ctx.formulation.n() < 3 {
            return KlReport::default();
        }
        let x = ctx.values.to_matrix();
        let mut strategy = TwoPartitionStrategy::new(&x);
        let mut rng = self.rng.next_rng();
        search(&mut strategy, &self.settings, ctx.values, ctx.eps, &mut rng)
    }
}

impl Separator for TwoPartitionKlSeparator {
    fn name(&self) -> &str {
        "2-partition-kl"
    }

    fn separate(&self, ctx: &SeparationContext<'_>) -> Vec<Inequality> {
        self.search(ctx).cuts
    }
}
