use std::time::Duration;

use crate::error::{Error, Result};
use crate::separation::KlSettings;

/// Relaxation improvement below which the stall timer keeps running.
pub const GAP_IMPROVEMENT_THRESHOLD: f64 = 1e-2;

/// Remaining time under which the primal heuristic runs every iteration.
pub const MIN_REMAINING_TIME: Duration = Duration::from_secs(200);

/// Share of the total time limit given to the cutting-plane phase.
pub const CUTTING_PLANE_TIME_SHARE: f64 = 0.9;

/// How triangle inequalities enter the complete formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transitivity {
    /// All triangles are rows of both the relaxation and the integer model.
    InModel,
    /// Triangles are separated at the root; all of them are rows of the integer model.
    #[default]
    Separated,
    /// Triangles are separated at the root and enforced by a lazy callback in branch and bound.
    Lazy,
}

/// Which separation families the default setup installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyToggles {
    pub grotschell: bool,
    pub labbe: bool,
    pub triangle: bool,
    pub two_partition_kl: bool,
    pub odd_cycle_kl: bool,
    pub cycle_dijkstra: bool,
    pub cycle_bfs: bool,
}

impl Default for FamilyToggles {
    fn default() -> Self {
        Self {
            grotschell: true,
            labbe: true,
            triangle: true,
            two_partition_kl: true,
            odd_cycle_kl: true,
            cycle_dijkstra: true,
            cycle_bfs: true,
        }
    }
}

/// Parameters of one cutting-plane run and of the branch-and-bound handoff.
#[derive(Debug, Clone)]
pub struct CuttingPlaneSettings {
    /// Total budget; the cutting-plane phase gets 90 % of it.
    pub time_limit: Option<Duration>,
    /// Stop the root phase when the relaxation has not improved for this long.
    pub max_time_for_relaxation_improvement: Duration,
    /// Minimum time between two removals of untight cuts. `None` never removes.
    pub removal_dwell_time: Option<Duration>,
    /// Run the primal heuristic every this many iterations.
    pub heuristic_frequency: usize,
    /// Cap on the cuts a single family returns per round.
    pub max_cuts_per_round: usize,
    pub families: FamilyToggles,
    /// Skip triangles whose centre repels both other vertices.
    pub reduced_triangles: bool,
    pub transitivity: Transitivity,
    /// Worker threads of the branch-and-bound oracle.
    pub threads: usize,
    /// Integrality and tightness tolerance.
    pub eps: f64,
    /// Violation tolerance of separators.
    pub separation_eps: f64,
    /// Base seed of the randomized separators; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Attach a user-cut callback in branch and bound.
    pub user_cuts_in_branch_and_bound: bool,
    /// Skip user-cut separation at nodes deeper than this.
    pub user_cut_max_depth: Option<usize>,
    /// User cuts found deeper than this only tighten the node's subtree.
    pub local_cut_depth: Option<usize>,
    /// Stop after the root phase.
    pub only_fractional_solution: bool,
    /// Stop the root phase once the rounded gap drops to this value.
    pub gap_stop_threshold: Option<f64>,
    /// Known clustering used as the incumbent; disables the primal heuristic.
    pub initial_membership: Option<Vec<usize>>,
    pub two_partition_kl: KlSettings,
    pub odd_cycle_kl: KlSettings,
    /// Odd cycle sizes searched by the odd-cycle local search; all when `None`.
    pub odd_cycle_sizes: Option<Vec<usize>>,
    pub node_limit: Option<usize>,
}

impl Default for CuttingPlaneSettings {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_time_for_relaxation_improvement: Duration::from_secs(600),
            removal_dwell_time: Some(Duration::from_secs(1)),
            heuristic_frequency: 5,
            max_cuts_per_round: 500,
            families: FamilyToggles::default(),
            reduced_triangles: false,
            transitivity: Transitivity::default(),
            threads: 1,
            eps: 1e-6,
            separation_eps: 1e-4,
            seed: None,
            user_cuts_in_branch_and_bound: false,
            user_cut_max_depth: None,
            local_cut_depth: None,
            only_fractional_solution: false,
            gap_stop_threshold: None,
            initial_membership: None,
            two_partition_kl: KlSettings::default(),
            odd_cycle_kl: KlSettings::default().with_iterations(2),
            odd_cycle_sizes: None,
            node_limit: None,
        }
    }
}

impl CuttingPlaneSettings {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_max_time_for_relaxation_improvement(mut self, limit: Duration) -> Self {
        self.max_time_for_relaxation_improvement = limit;
        self
    }

    pub fn with_removal_dwell_time(mut self, dwell: Option<Duration>) -> Self {
        self.removal_dwell_time = dwell;
        self
    }

    pub fn with_heuristic_frequency(mut self, frequency: usize) -> Self {
        self.heuristic_frequency = frequency;
        self
    }

    pub fn with_max_cuts_per_round(mut self, max_cuts: usize) -> Self {
        self.max_cuts_per_round = max_cuts;
        self
    }

    pub fn with_families(mut self, families: FamilyToggles) -> Self {
        self.families = families;
        self
    }

    pub fn with_reduced_triangles(mut self, reduced: bool) -> Self {
        self.reduced_triangles = reduced;
        self
    }

    pub fn with_transitivity(mut self, transitivity: Transitivity) -> Self {
        self.transitivity = transitivity;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_user_cuts(mut self, enabled: bool) -> Self {
        self.user_cuts_in_branch_and_bound = enabled;
        self
    }

    pub fn with_user_cut_max_depth(mut self, depth: usize) -> Self {
        self.user_cut_max_depth = Some(depth);
        self
    }

    pub fn with_local_cut_depth(mut self, depth: usize) -> Self {
        self.local_cut_depth = Some(depth);
        self
    }

    pub fn with_only_fractional_solution(mut self, only: bool) -> Self {
        self.only_fractional_solution = only;
        self
    }

    pub fn with_gap_stop_threshold(mut self, threshold: f64) -> Self {
        self.gap_stop_threshold = Some(threshold);
        self
    }

    pub fn with_initial_membership(mut self, membership: Vec<usize>) -> Self {
        self.initial_membership = Some(membership);
        self
    }

    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = Some(limit);
        self
    }

    /// Time available to the cutting-plane phase.
    pub fn cutting_plane_time_limit(&self) -> Option<Duration> {
        self.time_limit
            .map(|limit| limit.mul_f64(CUTTING_PLANE_TIME_SHARE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.heuristic_frequency == 0 {
            return Err(Error::InvalidSettings(
                "heuristic frequency must be positive".to_string(),
            ));
        }
        if self.max_cuts_per_round == 0 {
            return Err(Error::InvalidSettings(
                "at least one cut per round is required".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(Error::InvalidSettings("thread count must be positive".to_string()));
        }
        if !(self.eps > 0.0 && self.separation_eps > 0.0) {
            return Err(Error::InvalidSettings("tolerances must be positive".to_string()));
        }
        if let Some(sizes) = &self.odd_cycle_sizes {
            if let Some(bad) = sizes.iter().find(|&&k| k < 5 || k % 2 == 0) {
                return Err(Error::InvalidSettings(format!(
                    "odd cycle size {bad} is not an odd number of at least 5"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = CuttingPlaneSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_cuts_per_round, 500);
        assert_eq!(settings.odd_cycle_kl.iterations, 2);
        assert!(settings.cutting_plane_time_limit().is_none());
    }

    #[test]
    fn test_cutting_plane_share() {
        let settings = CuttingPlaneSettings::default().with_time_limit(Duration::from_secs(100));
        assert_eq!(settings.cutting_plane_time_limit(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_settings() {
        let zero = CuttingPlaneSettings::default().with_heuristic_frequency(0);
        assert!(matches!(zero.validate(), Err(Error::InvalidSettings(_))));

        let mut sizes = CuttingPlaneSettings::default();
        sizes.odd_cycle_sizes = Some(vec![5, 6]);
        assert!(sizes.validate().is_err());
    }
}
