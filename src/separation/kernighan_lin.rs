//! Kernighan–Lin style local search for violated inequalities.
//!
//! A strategy owns a vertex structure (a bipartition, a cycle) together with
//! per-vertex sub-slacks that price every legal transformation in O(1). The
//! driver repeatedly applies the best transformation until none is left,
//! keeps the best structure seen in the phase, and starts a new phase from it
//! while phases keep improving.

use std::collections::HashSet;

use rand::Rng;

use crate::inequality::{Inequality, ValidInequality};
use crate::snapshot::ValueSnapshot;

/// Two candidate deltas closer than this are considered equal.
const DELTA_TIE: f64 = 1e-12;

/// Search parameters shared by every strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct KlSettings {
    /// Random restarts per call.
    pub iterations: usize,
    /// Return after the first violated inequality.
    pub stop_on_first_cut: bool,
}

impl Default for KlSettings {
    fn default() -> Self {
        Self {
            iterations: 5,
            stop_on_first_cut: true,
        }
    }
}

impl KlSettings {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_stop_on_first_cut(mut self, stop: bool) -> Self {
        self.stop_on_first_cut = stop;
        self
    }
}

/// A priced transformation.
///
/// `delta` is the change of the slack. `ratio` is `lhs / rhs` after the
/// transformation and only breaks ties between equal deltas: among equally
/// good moves the one leaving the inequality relatively more violated wins.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<T> {
    pub transformation: T,
    pub delta: f64,
    pub ratio: f64,
}

impl<T> Candidate<T> {
    pub fn is_better_than(&self, other: &Candidate<T>) -> bool {
        if (self.delta - other.delta).abs() <= DELTA_TIE {
            self.ratio > other.ratio
        } else {
            self.delta < other.delta
        }
    }
}

/// Keeps `candidate` in `best` if it improves on what is there.
pub fn keep_best<T>(best: &mut Option<Candidate<T>>, candidate: Candidate<T>) {
    match best {
        Some(current) if !candidate.is_better_than(current) => {}
        _ => *best = Some(candidate),
    }
}

/// One inequality family's structure, sub-slacks and transformation catalogue.
pub trait KlStrategy {
    type Transformation: Copy;
    type Structure: Clone;

    /// Random starting structure.
    fn initialize_structure<R: Rng>(&mut self, rng: &mut R);

    /// Recomputes the sub-slacks and clears the used-transformation tables.
    fn initialize_sub_slacks(&mut self);

    /// Slack of the current structure, computed from scratch.
    fn slack(&self) -> f64;

    /// Best legal, unused transformation, or `None` when the phase is exhausted.
    fn best_transformation(&self) -> Option<Candidate<Self::Transformation>>;

    /// Mutates the structure and marks `t` used for the rest of the phase.
    fn apply_transformation(&mut self, t: Self::Transformation);

    /// Brings the sub-slacks in line with the structure after `t`.
    fn update_sub_slacks(&mut self, t: Self::Transformation);

    fn structure(&self) -> Self::Structure;

    fn restore(&mut self, structure: Self::Structure);

    fn to_inequality(&self, structure: &Self::Structure) -> Inequality;
}

/// What one search produced.
#[derive(Debug, Clone, Default)]
pub struct KlReport {
    pub cuts: Vec<Inequality>,
    /// Best slack of each completed improving phase, one list per iteration.
    pub phase_slacks: Vec<Vec<f64>>,
}

/// Runs the multi-start, multi-phase search.
///
/// Each recorded inequality is re-evaluated on `values` and kept only if its
/// slack is below `-eps`; duplicates within the call are dropped.
pub fn search<S, R>(
    strategy: &mut S,
    settings: &KlSettings,
    values: &ValueSnapshot,
    eps: f64,
    rng: &mut R,
) -> KlReport
where
    S: KlStrategy,
    R: Rng,
{
    let mut report = KlReport::default();
    let mut seen = HashSet::new();

    for _ in 0..settings.iterations {
        strategy.initialize_structure(rng);
        let mut best_previous: Option<(S::Structure, f64)> = None;
        let mut trace = Vec::new();

        loop {
            strategy.initialize_sub_slacks();
            let mut current = strategy.slack();
            let mut best_phase = (strategy.structure(), current);

            while let Some(candidate) = strategy.best_transformation() {
                strategy.apply_transformation(candidate.transformation);
                current += candidate.delta;
                if current < best_phase.1 {
                    best_phase = (strategy.structure(), current);
                }
                strategy.update_sub_slacks(candidate.transformation);
            }

            let previous = best_previous.as_ref().map_or(f64::INFINITY, |b| b.1);
            if best_phase.1 >= previous - eps {
                break;
            }
            trace.push(best_phase.1);
            strategy.restore(best_phase.0.clone());
            best_previous = Some(best_phase);
        }
        report.phase_slacks.push(trace);

        let Some((structure, slack)) = best_previous else {
            continue;
        };
        if slack >= -eps {
            continue;
        }
        let inequality = strategy.to_inequality(&structure);
        debug_assert!(
            (inequality.slack(values) - slack).abs() < 1e-6,
            "incremental slack drifted from {}",
            inequality.slack(values)
        );
        if inequality.slack(values) < -eps && seen.insert(inequality.canonical()) {
            report.cuts.push(inequality);
            if settings.stop_on_first_cut {
                break;
            }
        }
    }
    report
}
