use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::formulation::Formulation;
use crate::heuristic::FeasibleSolution;
use crate::oracle::SolveStatus;
use crate::snapshot::ValueSnapshot;

/// Why the root cutting-plane phase stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The relaxation optimum is an integral clustering.
    ConvergedInteger,
    /// No family finds a violated inequality at a fractional point.
    ConvergedFractional,
    TimeExpired,
    /// The relaxation stopped improving for longer than allowed.
    Stalled,
    GapThresholdReached,
    /// An oracle failed; the best incumbent is reported.
    OracleFailure,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Termination::ConvergedInteger => "converged to an integral point",
            Termination::ConvergedFractional => "converged to a fractional point",
            Termination::TimeExpired => "time limit reached",
            Termination::Stalled => "relaxation stalled",
            Termination::GapThresholdReached => "gap threshold reached",
            Termination::OracleFailure => "oracle failure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyStats {
    pub name: String,
    /// Inequalities ever added to the relaxation.
    pub added: usize,
    /// Inequalities still in the relaxation at the end of the root phase.
    pub live: usize,
    pub removed: usize,
    pub separation_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchAndBoundSummary {
    pub status: SolveStatus,
    pub nodes: usize,
    pub best_bound: f64,
    /// Root inequalities carried into the integer model.
    pub carried_inequalities: usize,
    pub time: Duration,
}

#[derive(Debug, Clone)]
pub struct CuttingPlaneResult {
    pub termination: Termination,
    /// The reported solution is optimal.
    pub proven_optimal: bool,
    pub solution: Option<FeasibleSolution>,
    /// Objective of the first relaxation.
    pub first_relaxation: Option<f64>,
    /// Objective of the last relaxation, a lower bound on the optimum.
    pub root_bound: Option<f64>,
    pub relaxation: Option<ValueSnapshot>,
    pub iterations: usize,
    pub families: Vec<FamilyStats>,
    pub cutting_plane_time: Duration,
    pub branch_and_bound: Option<BranchAndBoundSummary>,
}

impl CuttingPlaneResult {
    pub fn objective(&self) -> Option<f64> {
        self.solution.as_ref().map(FeasibleSolution::objective)
    }

    /// Relative gap between the root bound and the reported solution.
    pub fn gap(&self) -> Option<f64> {
        match (self.root_bound, self.objective()) {
            (Some(bound), Some(objective)) => Some(relative_gap(bound, objective)),
            _ => None,
        }
    }
}

/// `|better - reference| / (|reference| + 1e-10)`.
pub(crate) fn relative_gap(reference: f64, better: f64) -> f64 {
    (better - reference).abs() / (reference.abs() + 1e-10)
}

/// Receives the fractional relaxation when the gap crosses a milestone.
pub trait SnapshotSink {
    fn write(&mut self, gap: f64, formulation: &Formulation, values: &ValueSnapshot) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_relative_gap() {
        assert_abs_diff_eq!(relative_gap(10.0, 12.0), 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(relative_gap(-4.0, -3.0), 0.25, epsilon = 1e-9);
        assert!(relative_gap(0.0, 1.0) > 1e9);
        assert_eq!(relative_gap(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_result_gap_needs_both_sides() {
        let result = CuttingPlaneResult {
            termination: Termination::Stalled,
            proven_optimal: false,
            solution: None,
            first_relaxation: None,
            root_bound: Some(1.0),
            relaxation: None,
            iterations: 0,
            families: Vec::new(),
            cutting_plane_time: Duration::ZERO,
            branch_and_bound: None,
        };
        assert_eq!(result.gap(), None);
        assert_eq!(result.termination.to_string(), "relaxation stalled");
    }
}
