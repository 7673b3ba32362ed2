//! Root cutting-plane loop and the handoff to branch and bound.

pub mod engine;
pub mod family;
pub mod result;
pub mod session;
pub mod settings;

pub use engine::CuttingPlaneEngine;
pub use family::{default_families, FamilyId, FamilyRole, LiveId, SeparationFamily};
pub use result::{BranchAndBoundSummary, CuttingPlaneResult, FamilyStats, SnapshotSink, Termination};
pub use session::GAP_MILESTONES;
pub use settings::{
    CuttingPlaneSettings, FamilyToggles, Transitivity, CUTTING_PLANE_TIME_SHARE,
    GAP_IMPROVEMENT_THRESHOLD, MIN_REMAINING_TIME,
};
