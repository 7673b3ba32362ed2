use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::heuristic::FeasibleSolution;
use crate::inequality::{CanonicalKey, Inequality, ValidInequality};
use crate::oracle::ModelHandle;
use crate::snapshot::ValueProvider;

use super::family::{FamilyId, LiveId};
use super::result::relative_gap;
use super::settings::GAP_IMPROVEMENT_THRESHOLD;

/// Gap milestones in percent, largest first.
pub const GAP_MILESTONES: [u32; 5] = [40, 30, 20, 10, 5];

/// An inequality currently held by the relaxation model.
#[derive(Debug, Clone)]
pub(crate) struct LiveInequality {
    pub inequality: Inequality,
    pub family: FamilyId,
    pub handle: ModelHandle,
}

/// Milestone slot of a gap rounded to two decimals.
fn milestone_slot(gap: f64) -> Option<usize> {
    let g = (gap * 100.0).round() / 100.0;
    if g > 0.3 && g <= 0.4 {
        Some(0)
    } else if g > 0.2 && g <= 0.3 {
        Some(1)
    } else if (0.1..=0.2).contains(&g) {
        Some(2)
    } else if g > 0.05 && g < 0.1 {
        Some(3)
    } else if g > 0.01 && g <= 0.05 {
        Some(4)
    } else {
        None
    }
}

/// Mutable state of one root cutting-plane run.
///
/// Owns the live inequality arena: every live entry corresponds to exactly
/// one row of the relaxation, and no two live entries are the same inequality.
#[derive(Debug)]
pub(crate) struct CuttingPlaneSession {
    iteration: usize,
    first_relaxation: Option<f64>,
    relaxation: Option<f64>,
    last_improved_relaxation: Option<f64>,
    last_improvement: Instant,
    last_removal: Instant,
    incumbent: Option<FeasibleSolution>,
    live: Vec<Option<LiveInequality>>,
    live_keys: HashSet<CanonicalKey>,
    pending_removals: Vec<LiveId>,
    milestones_hit: [bool; GAP_MILESTONES.len()],
}

impl CuttingPlaneSession {
    pub fn new(start: Instant) -> Self {
        Self {
            iteration: 0,
            first_relaxation: None,
            relaxation: None,
            last_improved_relaxation: None,
            last_improvement: start,
            last_removal: start,
            incumbent: None,
            live: Vec::new(),
            live_keys: HashSet::new(),
            pending_removals: Vec::new(),
            milestones_hit: [false; GAP_MILESTONES.len()],
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn advance(&mut self) {
        self.iteration += 1;
    }

    pub fn first_relaxation(&self) -> Option<f64> {
        self.first_relaxation
    }

    pub fn relaxation(&self) -> Option<f64> {
        self.relaxation
    }

    /// Records a relaxation objective and reports whether it has stalled:
    /// no relative improvement above the threshold for longer than `max_wait`.
    pub fn record_relaxation(&mut self, objective: f64, now: Instant, max_wait: Duration) -> bool {
        self.first_relaxation.get_or_insert(objective);
        self.relaxation = Some(objective);
        let improved = self
            .last_improved_relaxation
            .map_or(true, |last| relative_gap(last, objective) > GAP_IMPROVEMENT_THRESHOLD);
        if improved {
            self.last_improved_relaxation = Some(objective);
            self.last_improvement = now;
            false
        } else {
            now.duration_since(self.last_improvement) > max_wait
        }
    }

    /// Relative gap between the last relaxation and the incumbent.
    pub fn gap(&self) -> f64 {
        match (self.relaxation, &self.incumbent) {
            (Some(bound), Some(incumbent)) => relative_gap(bound, incumbent.objective()),
            _ => f64::INFINITY,
        }
    }

    /// The milestone `gap` falls into, if it has not fired before.
    pub fn cross_milestone(&mut self, gap: f64) -> Option<u32> {
        let slot = milestone_slot(gap)?;
        if self.milestones_hit[slot] {
            return None;
        }
        self.milestones_hit[slot] = true;
        Some(GAP_MILESTONES[slot])
    }

    pub fn incumbent(&self) -> Option<&FeasibleSolution> {
        self.incumbent.as_ref()
    }

    pub fn take_incumbent(&mut self) -> Option<FeasibleSolution> {
        self.incumbent.take()
    }

    /// Keeps `candidate` if it strictly improves the incumbent.
    pub fn offer_incumbent(&mut self, candidate: FeasibleSolution) -> bool {
        let better = self
            .incumbent
            .as_ref()
            .map_or(true, |current| candidate.is_better_than(current));
        if better {
            self.incumbent = Some(candidate);
        }
        better
    }

    pub fn is_live(&self, inequality: &Inequality) -> bool {
        self.live_keys.contains(&inequality.canonical())
    }

    /// Registers a row of the relaxation. Duplicates of live entries are refused.
    pub fn insert(
        &mut self,
        inequality: Inequality,
        family: FamilyId,
        handle: ModelHandle,
    ) -> Option<LiveId> {
        if !self.live_keys.insert(inequality.canonical()) {
            return None;
        }
        self.live.push(Some(LiveInequality {
            inequality,
            family,
            handle,
        }));
        Some(self.live.len() - 1)
    }

    pub fn remove(&mut self, id: LiveId) -> Option<LiveInequality> {
        let entry = self.live.get_mut(id)?.take()?;
        self.live_keys.remove(&entry.inequality.canonical());
        Some(entry)
    }

    pub fn live(&self) -> impl Iterator<Item = (LiveId, &LiveInequality)> {
        self.live
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| entry.as_ref().map(|e| (id, e)))
    }

    pub fn live_count(&self) -> usize {
        self.live_keys.len()
    }

    /// True when the dwell time since the last removal has passed and
    /// nothing is queued yet.
    pub fn removal_due(&self, now: Instant, dwell: Option<Duration>) -> bool {
        self.pending_removals.is_empty()
            && dwell.is_some_and(|d| now.duration_since(self.last_removal) >= d)
    }

    /// Queues every live inequality that is not tight at `values`.
    pub fn queue_untight(&mut self, values: &dyn ValueProvider, eps: f64) -> usize {
        let untight: Vec<LiveId> = self
            .live()
            .filter(|(_, entry)| !entry.inequality.is_tight(values, eps))
            .map(|(id, _)| id)
            .collect();
        self.pending_removals.extend(untight);
        self.pending_removals.len()
    }

    pub fn take_pending_removals(&mut self, now: Instant) -> Vec<LiveId> {
        self.last_removal = now;
        std::mem::take(&mut self.pending_removals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SignedGraph;
    use crate::inequality::TriangleInequality;
    use crate::separation::test_support::{complete, values};

    fn solution(objective_weight: f64) -> FeasibleSolution {
        let g = SignedGraph::new(2, vec![(0, 1, objective_weight)]).unwrap();
        FeasibleSolution::from_membership(&g, &[0, 1]).unwrap()
    }

    #[test]
    fn test_stall_detection() {
        let start = Instant::now();
        let wait = Duration::from_secs(10);
        let mut session = CuttingPlaneSession::new(start);
        assert!(!session.record_relaxation(1.0, start, wait));
        // Under one percent: the timer keeps running.
        assert!(!session.record_relaxation(1.005, start + Duration::from_secs(5), wait));
        assert!(session.record_relaxation(1.009, start + Duration::from_secs(11), wait));
        // A real improvement resets it.
        assert!(!session.record_relaxation(2.0, start + Duration::from_secs(12), wait));
        assert_eq!(session.first_relaxation(), Some(1.0));
        assert_eq!(session.relaxation(), Some(2.0));
    }

    #[test]
    fn test_gap_and_incumbent() {
        let mut session = CuttingPlaneSession::new(Instant::now());
        assert!(session.gap().is_infinite());
        assert!(session.offer_incumbent(solution(3.0)));
        assert!(!session.offer_incumbent(solution(3.0)));
        assert!(session.offer_incumbent(solution(2.0)));
        session.record_relaxation(1.6, Instant::now(), Duration::from_secs(1));
        assert!((session.gap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_each_milestone_fires_once() {
        let mut session = CuttingPlaneSession::new(Instant::now());
        assert_eq!(session.cross_milestone(0.9), None);
        assert_eq!(session.cross_milestone(0.35), Some(40));
        assert_eq!(session.cross_milestone(0.33), None);
        assert_eq!(session.cross_milestone(0.1), Some(20));
        assert_eq!(session.cross_milestone(0.07), Some(10));
        assert_eq!(session.cross_milestone(0.004), None);
        assert_eq!(session.cross_milestone(0.02), Some(5));
    }

    #[test]
    fn test_live_arena_refuses_duplicates() {
        let mut session = CuttingPlaneSession::new(Instant::now());
        let t = TriangleInequality::new(0, 1, 2);
        let a = session.insert(t.into(), 0, ModelHandle(7)).unwrap();
        assert!(session.insert(TriangleInequality::new(0, 2, 1).into(), 1, ModelHandle(8)).is_none());
        assert!(session.is_live(&t.into()));
        let removed = session.remove(a).unwrap();
        assert_eq!(removed.handle, ModelHandle(7));
        assert!(session.remove(a).is_none());
        assert_eq!(session.live_count(), 0);
        assert!(session.insert(t.into(), 0, ModelHandle(9)).is_some());
    }

    #[test]
    fn test_removal_queue() {
        let start = Instant::now();
        let f = complete(3);
        let mut session = CuttingPlaneSession::new(start);
        let tight = session
            .insert(TriangleInequality::new(0, 1, 2).into(), 0, ModelHandle(0))
            .unwrap();
        let loose = session
            .insert(TriangleInequality::new(2, 0, 1).into(), 0, ModelHandle(1))
            .unwrap();
        // Only x01 = 1: centre 0 is tight, centre 2 has slack 2.
        let x = values(f.index(), &[(0, 1, 1.0)]);

        let dwell = Some(Duration::from_secs(1));
        assert!(!session.removal_due(start, dwell));
        let later = start + Duration::from_secs(2);
        assert!(session.removal_due(later, dwell));
        assert_eq!(session.queue_untight(&x, 1e-6), 1);
        assert!(!session.removal_due(later, dwell));
        assert_eq!(session.take_pending_removals(later), vec![loose]);
        assert!(!session.removal_due(later, dwell));
        assert!(!session.removal_due(later, None));
        assert!(session.live().any(|(id, _)| id == tight));
    }
}
