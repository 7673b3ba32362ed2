use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::formulation::{Formulation, VariableSpace};
use crate::separation::{
    CycleBfsSeparator, CycleDijkstraSeparator, GrotschellSeparator, LabbeSeparator,
    OddCycleKlSeparator, Separator, TriangleSeparator, TwoPartitionKlSeparator,
};

use super::settings::{CuttingPlaneSettings, Transitivity};

/// Index of a family in the engine's family list.
pub type FamilyId = usize;

/// Index of a live inequality in the session arena.
pub type LiveId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyRole {
    /// Produces cuts in the regular separation round.
    Cut,
    /// Only checks whether an integral relaxation is a valid clustering.
    Validity,
}

/// A separator together with its scheduling flags and bookkeeping.
pub struct SeparationFamily {
    name: String,
    separator: Arc<dyn Separator>,
    role: FamilyRole,
    is_quick: bool,
    add_in_branch_and_cut: bool,
    pub(crate) added: Vec<LiveId>,
    pub(crate) total_added: usize,
    pub(crate) removed_count: usize,
    pub(crate) used_this_iteration: bool,
    pub(crate) separation_time: Duration,
}

impl fmt::Debug for SeparationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeparationFamily")
            .field("name", &self.name())
            .field("role", &self.role)
            .field("is_quick", &self.is_quick)
            .field("add_in_branch_and_cut", &self.add_in_branch_and_cut)
            .field("added", &self.added.len())
            .field("removed", &self.removed_count)
            .finish()
    }
}

impl SeparationFamily {
    /// A quick family always runs; a slow one only while no cut has been
    /// found in the current round.
    pub fn new(separator: Arc<dyn Separator>, is_quick: bool, add_in_branch_and_cut: bool) -> Self {
        Self {
            name: separator.name().to_string(),
            separator,
            role: FamilyRole::Cut,
            is_quick,
            add_in_branch_and_cut,
            added: Vec::new(),
            total_added: 0,
            removed_count: 0,
            used_this_iteration: false,
            separation_time: Duration::ZERO,
        }
    }

    /// Reported as `<separator>-validity`.
    pub fn validity(separator: Arc<dyn Separator>) -> Self {
        Self {
            name: format!("{}-validity", separator.name()),
            role: FamilyRole::Validity,
            ..Self::new(separator, false, true)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn separator(&self) -> &Arc<dyn Separator> {
        &self.separator
    }

    pub fn role(&self) -> FamilyRole {
        self.role
    }

    pub fn is_quick(&self) -> bool {
        self.is_quick
    }

    pub fn add_in_branch_and_cut(&self) -> bool {
        self.add_in_branch_and_cut
    }

    /// Live inequalities owned by this family.
    pub fn added(&self) -> &[LiveId] {
        &self.added
    }

    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn removed_count(&self) -> usize {
        self.removed_count
    }

    pub fn used_this_iteration(&self) -> bool {
        self.used_this_iteration
    }

    pub(crate) fn reset(&mut self) {
        self.added.clear();
        self.total_added = 0;
        self.removed_count = 0;
        self.used_this_iteration = false;
        self.separation_time = Duration::ZERO;
    }

    pub(crate) fn record_added(&mut self, id: LiveId) {
        self.added.push(id);
        self.total_added += 1;
    }

    pub(crate) fn record_removed(&mut self, id: LiveId) {
        if let Some(pos) = self.added.iter().position(|&a| a == id) {
            self.added.swap_remove(pos);
            self.removed_count += 1;
        }
    }
}

/// Offsets the base seed so that families draw independent streams.
fn family_seed(seed: Option<u64>, slot: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add(slot << 32))
}

/// The standard family setup of a formulation.
///
/// Complete space: Grötschel and Labbé stars (quick), triangles unless they
/// are all in the model (quick, root only), 2-partition and odd-cycle local
/// search (slow). Sparse space: Dijkstra cycles (quick) and BFS cycles (slow).
pub fn default_families(
    formulation: &Formulation,
    settings: &CuttingPlaneSettings,
) -> Vec<SeparationFamily> {
    let toggles = &settings.families;
    let max_cuts = settings.max_cuts_per_round;
    let mut families = Vec::new();

    match formulation.space() {
        VariableSpace::Complete => {
            if toggles.grotschell {
                let separator = GrotschellSeparator::new(family_seed(settings.seed, 1))
                    .with_max_cuts(max_cuts);
                families.push(SeparationFamily::new(Arc::new(separator), true, true));
            }
            if toggles.labbe {
                let separator = LabbeSeparator::new(family_seed(settings.seed, 2));
                families.push(SeparationFamily::new(Arc::new(separator), true, true));
            }
            if toggles.triangle && settings.transitivity != Transitivity::InModel {
                let separator = TriangleSeparator::new()
                    .reduced(settings.reduced_triangles)
                    .with_max_cuts(max_cuts);
                families.push(SeparationFamily::new(Arc::new(separator), true, false));
            }
            if toggles.two_partition_kl {
                let separator = TwoPartitionKlSeparator::new(
                    settings.two_partition_kl.clone(),
                    family_seed(settings.seed, 3),
                );
                families.push(SeparationFamily::new(Arc::new(separator), false, true));
            }
            if toggles.odd_cycle_kl {
                let separator = OddCycleKlSeparator::new(
                    settings.odd_cycle_kl.clone(),
                    settings.odd_cycle_sizes.clone(),
                    family_seed(settings.seed, 4),
                );
                families.push(SeparationFamily::new(Arc::new(separator), false, true));
            }
        }
        VariableSpace::Sparse => {
            if toggles.cycle_dijkstra {
                let separator = CycleDijkstraSeparator::new().with_max_cuts(max_cuts);
                families.push(SeparationFamily::new(Arc::new(separator), true, true));
            }
            if toggles.cycle_bfs {
                let separator = CycleBfsSeparator::new().with_max_cuts(max_cuts);
                families.push(SeparationFamily::new(Arc::new(separator), false, true));
            }
        }
    }
    families
}

/// Separator that decides whether an integral point is a clustering.
pub fn validity_separator(space: VariableSpace) -> Arc<dyn Separator> {
    match space {
        VariableSpace::Complete => Arc::new(TriangleSeparator::new()),
        VariableSpace::Sparse => Arc::new(CycleBfsSeparator::new()),
    }
}
