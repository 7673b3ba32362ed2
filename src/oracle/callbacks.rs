//! Adapters running separators inside branch-and-bound callbacks.

use std::fmt;
use std::sync::Arc;

use log::trace;

use crate::error::OracleError;
use crate::formulation::Formulation;
use crate::inequality::ValidInequality;
use crate::separation::{most_violated, SeparationContext, Separator, SEPARATION_EPS};

use super::{NodeCallback, NodeContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Validity check on integral candidates; separators run until one finds a cut.
    Lazy,
    /// Tightening on fractional nodes; every separator runs.
    UserCut,
}

/// Runs a list of separators on the values of one node.
///
/// Every invocation reads a private copy of the node values and keeps no
/// state between calls, so one adapter can serve all worker threads.
pub struct SeparationCallback {
    separators: Vec<Arc<dyn Separator>>,
    formulation: Arc<Formulation>,
    mode: CallbackMode,
    eps: f64,
    max_cuts: Option<usize>,
    max_depth: Option<usize>,
    local_depth: Option<usize>,
}

impl fmt::Debug for SeparationCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.separators.iter().map(|s| s.name()).collect();
        f.debug_struct("SeparationCallback")
            .field("separators", &names)
            .field("mode", &self.mode)
            .field("eps", &self.eps)
            .field("max_cuts", &self.max_cuts)
            .field("max_depth", &self.max_depth)
            .field("local_depth", &self.local_depth)
            .finish()
    }
}

impl SeparationCallback {
    pub fn new(formulation: Arc<Formulation>, mode: CallbackMode) -> Self {
        Self {
            separators: Vec::new(),
            formulation,
            mode,
            eps: SEPARATION_EPS,
            max_cuts: None,
            max_depth: None,
            local_depth: None,
        }
    }

    pub fn with_separator(mut self, separator: Arc<dyn Separator>) -> Self {
        self.separators.push(separator);
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.max_cuts = Some(max_cuts);
        self
    }

    /// Skip nodes deeper than `depth`.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// User cuts found deeper than `depth` are added to the node's subtree only.
    pub fn with_local_depth(mut self, depth: usize) -> Self {
        self.local_depth = Some(depth);
        self
    }

    pub fn mode(&self) -> CallbackMode {
        self.mode
    }
}

impl NodeCallback for SeparationCallback {
    fn invoke(&self, node: &mut dyn NodeContext) -> Result<(), OracleError> {
        if self.max_depth.is_some_and(|d| node.depth() > d) {
            return Ok(());
        }
        if self.mode == CallbackMode::UserCut && node.is_integral() {
            return Ok(());
        }

        let values = node.values().clone();
        let ctx = SeparationContext::new(&self.formulation, &values).with_eps(self.eps);
        let mut cuts = Vec::new();
        for separator in &self.separators {
            cuts.extend(separator.separate(&ctx));
            if self.mode == CallbackMode::Lazy && !cuts.is_empty() {
                break;
            }
        }
        let cuts = most_violated(cuts, &ctx, self.max_cuts);
        trace!(
            "{:?} callback at depth {}: {} cuts",
            self.mode,
            node.depth(),
            cuts.len()
        );

        let local = self.local_depth.is_some_and(|d| node.depth() > d);
        for cut in cuts {
            let range = cut.linear_range();
            match self.mode {
                CallbackMode::Lazy => node.add_lazy(range),
                CallbackMode::UserCut if local => node.add_local(range),
                CallbackMode::UserCut => node.add_user_cut(range),
            }
        }
        Ok(())
    }
}
