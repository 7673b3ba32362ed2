//! Feasible clusterings derived from relaxation values.

pub mod rounding;
pub mod solution;

use crate::formulation::Formulation;
use crate::snapshot::ValueProvider;

pub use rounding::GreedyRounding;
pub use solution::FeasibleSolution;

/// Turns relaxation values into a feasible clustering.
///
/// Implementations must return a valid partition for any input values.
pub trait PrimalHeuristic: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, formulation: &Formulation, values: &dyn ValueProvider) -> FeasibleSolution;
}
