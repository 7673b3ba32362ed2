use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, trace, warn};

use crate::error::{OracleError, Result};
use crate::formulation::{Formulation, VariableSpace};
use crate::heuristic::{FeasibleSolution, GreedyRounding, PrimalHeuristic};
use crate::inequality::{all_triangles, CanonicalKey, Inequality, LinearRange, ValidInequality};
use crate::oracle::{
    Callback, CallbackMode, IntegerOracle, ModelHandle, OracleFactory, OracleParameter,
    RelaxationOracle, SeparationCallback, SolveStatus,
};
use crate::separation::{most_violated, SeparationContext};
use crate::snapshot::ValueSnapshot;

use super::family::{default_families, validity_separator, FamilyId, FamilyRole, SeparationFamily};
use super::result::{BranchAndBoundSummary, CuttingPlaneResult, FamilyStats, SnapshotSink, Termination};
use super::session::CuttingPlaneSession;
use super::settings::{CuttingPlaneSettings, Transitivity, MIN_REMAINING_TIME};

/// Adds every triangle inequality of `n` vertices through `add`.
fn add_all_triangles(
    n: usize,
    mut add: impl FnMut(&LinearRange) -> std::result::Result<ModelHandle, OracleError>,
) -> std::result::Result<usize, OracleError> {
    let mut count = 0;
    for triangle in all_triangles(n) {
        add(&triangle.linear_range())?;
        count += 1;
    }
    Ok(count)
}

/// Runs one family and keeps its violated, not yet live, cuts.
fn run_family(
    family: &mut SeparationFamily,
    ctx: &SeparationContext<'_>,
    session: &CuttingPlaneSession,
    seen: &mut HashSet<CanonicalKey>,
    max_cuts: usize,
) -> Vec<Inequality> {
    family.used_this_iteration = true;
    let timer = Instant::now();
    let found = family.separator().separate(ctx);
    family.separation_time += timer.elapsed();

    let fresh: Vec<Inequality> = found
        .into_iter()
        .filter(|cut| ctx.is_violated(cut) && !session.is_live(cut))
        .collect();
    let mut fresh = most_violated(fresh, ctx, Some(max_cuts));
    fresh.retain(|cut| seen.insert(cut.canonical()));
    trace!("{}: {} violated inequalities", family.name(), fresh.len());
    fresh
}

/// Root cutting-plane loop followed by branch and bound.
///
/// The root phase solves the relaxation, separates violated inequalities
/// family by family and adds them until the relaxation is an integral
/// clustering, no family finds anything, the relaxation stalls or time runs
/// out. Unless the run is fractional only, the tight root inequalities, the
/// incumbent and the validity callbacks are then handed to the integer oracle.
pub struct CuttingPlaneEngine<F: OracleFactory> {
    formulation: Arc<Formulation>,
    factory: F,
    settings: CuttingPlaneSettings,
    families: Vec<SeparationFamily>,
    heuristic: Box<dyn PrimalHeuristic>,
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
}

impl<F: OracleFactory> fmt::Debug for CuttingPlaneEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuttingPlaneEngine")
            .field("n", &self.formulation.n())
            .field("space", &self.formulation.space())
            .field("settings", &self.settings)
            .field("families", &self.families)
            .field("heuristic", &self.heuristic.name())
            .finish()
    }
}

impl<F: OracleFactory> CuttingPlaneEngine<F> {
    pub fn new(formulation: Formulation, factory: F, settings: CuttingPlaneSettings) -> Result<Self> {
        settings.validate()?;
        let families = default_families(&formulation, &settings);
        Ok(Self {
            formulation: Arc::new(formulation),
            factory,
            settings,
            families,
            heuristic: Box::new(GreedyRounding::new()),
            snapshot_sink: None,
        })
    }

    /// Replaces the default families.
    pub fn with_families(mut self, families: Vec<SeparationFamily>) -> Self {
        self.families = families;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Box<dyn PrimalHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    pub fn add_family(&mut self, family: SeparationFamily) -> FamilyId {
        self.families.push(family);
        self.families.len() - 1
    }

    pub fn families(&self) -> &[SeparationFamily] {
        &self.families
    }

    pub fn formulation(&self) -> &Formulation {
        &self.formulation
    }

    pub fn settings(&self) -> &CuttingPlaneSettings {
        &self.settings
    }

    pub fn run(&mut self) -> Result<CuttingPlaneResult> {
        let start = Instant::now();
        let mut session = CuttingPlaneSession::new(start);
        if let Some(membership) = &self.settings.initial_membership {
            let initial = FeasibleSolution::from_membership(self.formulation.graph(), membership)?;
            info!(
                "initial membership: {} clusters, objective {}",
                initial.cluster_count(),
                initial.objective()
            );
            session.offer_incumbent(initial);
        }
        self.families.iter_mut().for_each(SeparationFamily::reset);
        let validity = self.validity_family();

        info!(
            "cutting plane on {} vertices, {} variables, {} families",
            self.formulation.n(),
            self.formulation.variable_count(),
            self.families.len()
        );
        let (mut termination, relaxation) = self.root_phase(&mut session, start, validity);
        let cutting_plane_time = start.elapsed();
        info!(
            "root phase stopped after {} iterations in {:.2?}: {termination}",
            session.iteration(),
            cutting_plane_time
        );

        let mut proven_optimal = termination == Termination::ConvergedInteger;
        let mut branch_and_bound = None;
        let hand_off = !self.settings.only_fractional_solution
            && !matches!(
                termination,
                Termination::ConvergedInteger | Termination::OracleFailure
            );
        if hand_off {
            match self.branch_and_bound(&mut session, relaxation.as_ref(), start) {
                Ok(summary) => {
                    proven_optimal = summary.status == SolveStatus::Optimal;
                    branch_and_bound = Some(summary);
                }
                Err(e) => {
                    error!("branch and bound failed: {e}");
                    termination = Termination::OracleFailure;
                }
            }
        }

        let families = self
            .families
            .iter()
            .map(|family| FamilyStats {
                name: family.name().to_string(),
                added: family.total_added,
                live: family.added_count(),
                removed: family.removed_count(),
                separation_time: family.separation_time,
            })
            .collect();
        let solution = session.take_incumbent();
        if let Some(solution) = &solution {
            info!(
                "best clustering: {} clusters, objective {}{}",
                solution.cluster_count(),
                solution.objective(),
                if proven_optimal { " (optimal)" } else { "" }
            );
        }
        Ok(CuttingPlaneResult {
            termination,
            proven_optimal,
            solution,
            first_relaxation: session.first_relaxation(),
            root_bound: session.relaxation(),
            relaxation,
            iterations: session.iteration(),
            families,
            cutting_plane_time,
            branch_and_bound,
        })
    }

    /// Index of the family checking integral points, installing one if missing.
    fn validity_family(&mut self) -> FamilyId {
        match self
            .families
            .iter()
            .position(|f| f.role() == FamilyRole::Validity)
        {
            Some(id) => id,
            None => {
                let separator = validity_separator(self.formulation.space());
                self.add_family(SeparationFamily::validity(separator))
            }
        }
    }

    fn root_phase(
        &mut self,
        session: &mut CuttingPlaneSession,
        start: Instant,
        validity: FamilyId,
    ) -> (Termination, Option<ValueSnapshot>) {
        let mut relaxation = match self.factory.relaxation(&self.formulation) {
            Ok(relaxation) => relaxation,
            Err(e) => {
                error!("cannot build the relaxation: {e}");
                return (Termination::OracleFailure, None);
            }
        };
        if self.formulation.space() == VariableSpace::Complete
            && self.settings.transitivity == Transitivity::InModel
        {
            match add_all_triangles(self.formulation.n(), |row| relaxation.add_range(row)) {
                Ok(count) => debug!("{count} triangle inequalities in the relaxation"),
                Err(e) => {
                    error!("cannot add triangle inequalities: {e}");
                    return (Termination::OracleFailure, None);
                }
            }
        }

        let limit = self.settings.cutting_plane_time_limit();
        let mut last = None;
        let termination = loop {
            if limit.is_some_and(|limit| start.elapsed() >= limit) {
                break Termination::TimeExpired;
            }
            match self.iterate(&mut relaxation, session, start, validity, &mut last) {
                Ok(None) => {}
                Ok(Some(termination)) => break termination,
                Err(e) => {
                    error!("relaxation oracle failed: {e}");
                    break Termination::OracleFailure;
                }
            }
        };
        (termination, last)
    }

    /// One root iteration. `Some` ends the root phase.
    fn iterate<R: RelaxationOracle>(
        &mut self,
        relaxation: &mut R,
        session: &mut CuttingPlaneSession,
        start: Instant,
        validity: FamilyId,
        last: &mut Option<ValueSnapshot>,
    ) -> std::result::Result<Option<Termination>, OracleError> {
        self.families
            .iter_mut()
            .for_each(|f| f.used_this_iteration = false);

        let outcome = relaxation.solve()?;
        if outcome.status != SolveStatus::Optimal {
            return Err(OracleError::Fatal(format!(
                "relaxation ended {:?}",
                outcome.status
            )));
        }
        let values = relaxation.snapshot();
        *last = Some(values.clone());

        let now = Instant::now();
        let removal_queued = session.removal_due(now, self.settings.removal_dwell_time);
        if removal_queued {
            let queued = session.queue_untight(&values, self.settings.eps);
            debug!("{queued} untight inequalities queued for removal");
        }
        let stalled = session.record_relaxation(
            outcome.objective,
            now,
            self.settings.max_time_for_relaxation_improvement,
        );

        let integral = values.is_integral(self.settings.eps);
        let mut cuts = Vec::new();
        if integral {
            let ctx = SeparationContext::new(&self.formulation, &values)
                .with_eps(self.settings.separation_eps);
            let mut seen = HashSet::new();
            let found = run_family(
                &mut self.families[validity],
                &ctx,
                session,
                &mut seen,
                self.settings.max_cuts_per_round,
            );
            if found.is_empty() {
                let solution = FeasibleSolution::from_values(&self.formulation, &values);
                debug!(
                    "integral relaxation is a clustering with objective {}",
                    solution.objective()
                );
                session.offer_incumbent(solution);
                return Ok(Some(Termination::ConvergedInteger));
            }
            cuts.extend(found.into_iter().map(|cut| (validity, cut)));
        }

        if self.settings.initial_membership.is_none() && self.heuristic_due(session, start) {
            let candidate = self.heuristic.generate(&self.formulation, &values);
            let objective = candidate.objective();
            if session.offer_incumbent(candidate) {
                debug!("{} found incumbent {objective}", self.heuristic.name());
            }
        }

        let gap = session.gap();
        info!(
            "iteration {}: relaxation {:.6}, incumbent {}, gap {:.2}%, {} live inequalities",
            session.iteration(),
            outcome.objective,
            session
                .incumbent()
                .map_or_else(|| "none".to_string(), |s| s.objective().to_string()),
            gap * 100.0,
            session.live_count()
        );
        if let Some(milestone) = session.cross_milestone(gap) {
            self.write_snapshot(milestone, &values);
        }
        if let Some(threshold) = self.settings.gap_stop_threshold {
            if (gap * 100.0).round() / 100.0 <= threshold {
                return Ok(Some(Termination::GapThresholdReached));
            }
        }
        if stalled {
            return Ok(Some(Termination::Stalled));
        }

        if !integral {
            cuts = self.generate_cuts(&values, session, start);
        }
        if cuts.is_empty() {
            return Ok(Some(Termination::ConvergedFractional));
        }

        let added = cuts.len();
        for (family, cut) in cuts {
            let handle = relaxation.add_range(&cut.linear_range())?;
            match session.insert(cut, family, handle) {
                Some(id) => self.families[family].record_added(id),
                None => relaxation.remove_range(handle)?,
            }
        }
        let mut removed = 0;
        if removal_queued {
            for id in session.take_pending_removals(Instant::now()) {
                if let Some(entry) = session.remove(id) {
                    relaxation.remove_range(entry.handle)?;
                    self.families[entry.family].record_removed(id);
                    removed += 1;
                }
            }
        }
        debug!("added {added} inequalities, removed {removed}");
        session.advance();
        Ok(None)
    }

    fn heuristic_due(&self, session: &CuttingPlaneSession, start: Instant) -> bool {
        let low_on_time = self
            .settings
            .cutting_plane_time_limit()
            .is_some_and(|limit| limit.saturating_sub(start.elapsed()) < MIN_REMAINING_TIME);
        low_on_time || session.iteration() % self.settings.heuristic_frequency == 0
    }

    /// Runs the cut families in order. A slow family is skipped once an
    /// earlier family of this round has found something.
    fn generate_cuts(
        &mut self,
        values: &ValueSnapshot,
        session: &CuttingPlaneSession,
        start: Instant,
    ) -> Vec<(FamilyId, Inequality)> {
        let ctx = SeparationContext::new(&self.formulation, values)
            .with_eps(self.settings.separation_eps);
        let limit = self.settings.cutting_plane_time_limit();
        let max_cuts = self.settings.max_cuts_per_round;
        let mut seen = HashSet::new();
        let mut cuts = Vec::new();
        for (id, family) in self.families.iter_mut().enumerate() {
            if family.role() == FamilyRole::Validity || family.used_this_iteration {
                continue;
            }
            if !cuts.is_empty() && !family.is_quick() {
                continue;
            }
            if limit.is_some_and(|limit| start.elapsed() >= limit) {
                break;
            }
            let found = run_family(family, &ctx, session, &mut seen, max_cuts);
            cuts.extend(found.into_iter().map(|cut| (id, cut)));
        }
        cuts
    }

    fn write_snapshot(&mut self, milestone: u32, values: &ValueSnapshot) {
        let gap = f64::from(milestone) / 100.0;
        info!("gap crossed {milestone}%");
        if let Some(sink) = self.snapshot_sink.as_mut() {
            if let Err(e) = sink.write(gap, &self.formulation, values) {
                warn!("cannot write fractional snapshot at {milestone}%: {e}");
            }
        }
    }

    fn branch_and_bound(
        &mut self,
        session: &mut CuttingPlaneSession,
        values: Option<&ValueSnapshot>,
        start: Instant,
    ) -> std::result::Result<BranchAndBoundSummary, OracleError> {
        let timer = Instant::now();
        let space = self.formulation.space();
        let mut integer = self.factory.integer(&self.formulation)?;

        let mut carried = 0;
        if let Some(values) = values {
            for (_, entry) in session.live() {
                if self.families[entry.family].add_in_branch_and_cut()
                    && entry.inequality.is_tight(values, self.settings.eps)
                {
                    integer.add_range(&entry.inequality.linear_range())?;
                    carried += 1;
                }
            }
        }
        let lazy_transitivity =
            space == VariableSpace::Sparse || self.settings.transitivity == Transitivity::Lazy;
        if !lazy_transitivity {
            let count = add_all_triangles(self.formulation.n(), |row| integer.add_range(row))?;
            debug!("{count} triangle inequalities in the integer model");
        }
        if let Some(incumbent) = session.incumbent() {
            integer.add_mip_start(&incumbent.assignment(&self.formulation))?;
        }
        if lazy_transitivity {
            let callback = SeparationCallback::new(self.formulation.clone(), CallbackMode::Lazy)
                .with_separator(validity_separator(space))
                .with_eps(self.settings.separation_eps);
            integer.use_callback(Callback::Lazy(Arc::new(callback)));
        }
        if self.settings.user_cuts_in_branch_and_bound {
            let mut callback = self
                .families
                .iter()
                .filter(|f| f.role() == FamilyRole::Cut)
                .fold(
                    SeparationCallback::new(self.formulation.clone(), CallbackMode::UserCut)
                        .with_eps(self.settings.separation_eps)
                        .with_max_cuts(self.settings.max_cuts_per_round),
                    |callback, family| callback.with_separator(family.separator().clone()),
                );
            if let Some(depth) = self.settings.user_cut_max_depth {
                callback = callback.with_max_depth(depth);
            }
            if let Some(depth) = self.settings.local_cut_depth {
                callback = callback.with_local_depth(depth);
            }
            integer.use_callback(Callback::UserCut(Arc::new(callback)));
        }

        integer.set_parameter(OracleParameter::Threads(self.settings.threads));
        if let Some(total) = self.settings.time_limit {
            integer.set_parameter(OracleParameter::TimeLimit(
                total.saturating_sub(start.elapsed()),
            ));
        }
        if let Some(nodes) = self.settings.node_limit {
            integer.set_parameter(OracleParameter::NodeLimit(nodes));
        }

        info!("branch and bound with {carried} root inequalities");
        let outcome = integer.solve()?;
        if let Some(snapshot) = &outcome.solution {
            let solution = FeasibleSolution::from_values(&self.formulation, snapshot);
            session.offer_incumbent(solution);
        }
        info!(
            "branch and bound ended {:?} after {} nodes, bound {}",
            outcome.status, outcome.nodes, outcome.best_bound
        );
        Ok(BranchAndBoundSummary {
            status: outcome.status,
            nodes: outcome.nodes,
            best_bound: outcome.best_bound,
            carried_inequalities: carried,
            time: timer.elapsed(),
        })
    }
}
