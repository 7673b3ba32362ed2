//! Contracts between the cutting-plane engine and an LP/MIP backend.
//!
//! The engine only ever sees these traits. [`lp_oracle::SimplexOracle`] and
//! [`branch_and_bound::BranchAndBoundOracle`] are the bundled implementations,
//! built by [`lp_oracle::SimplexFactory`].

pub mod branch_and_bound;
pub mod callbacks;
pub mod lp_oracle;
pub mod model;
pub mod simplex;

use std::sync::Arc;
use std::time::Duration;

use crate::error::OracleError;
use crate::formulation::Formulation;
use crate::graph::EdgeKey;
use crate::inequality::LinearRange;
use crate::snapshot::ValueSnapshot;

pub use branch_and_bound::BranchAndBoundOracle;
pub use callbacks::{CallbackMode, SeparationCallback};
pub use lp_oracle::{SimplexFactory, SimplexOracle};

/// Opaque id of a row owned by an oracle model. Valid until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Solved to optimality.
    Optimal,
    /// A feasible point is known but a limit stopped the search.
    Feasible,
    Infeasible,
    /// A limit stopped the search before any feasible point was found.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Objective including the formulation constant.
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OracleParameter {
    Threads(usize),
    TimeLimit(Duration),
    NodeLimit(usize),
    IterationLimit(usize),
}

/// The LP relaxation solved in the root cutting-plane loop.
pub trait RelaxationOracle {
    fn solve(&mut self) -> Result<SolveOutcome, OracleError>;

    /// Value of `key` in the last solution.
    fn value(&self, key: EdgeKey) -> Result<f64, OracleError>;

    /// Copy of all values of the last solution; zeros before the first solve.
    fn snapshot(&self) -> ValueSnapshot;

    /// Objective of the last solution including the constant.
    fn best_objective(&self) -> f64;

    fn add_range(&mut self, range: &LinearRange) -> Result<ModelHandle, OracleError>;

    fn remove_range(&mut self, handle: ModelHandle) -> Result<(), OracleError>;

    fn set_parameter(&mut self, parameter: OracleParameter);
}

/// One branch-and-bound node as seen from a callback.
///
/// A context is created for a single invocation and owns a fresh copy of the
/// node's values, so concurrent callbacks never share mutable state.
pub trait NodeContext {
    fn values(&self) -> &ValueSnapshot;

    fn is_integral(&self) -> bool;

    fn depth(&self) -> usize;

    /// Globally valid constraint rejecting the current integral point.
    fn add_lazy(&mut self, range: LinearRange);

    /// Globally valid cut tightening the relaxation.
    fn add_user_cut(&mut self, range: LinearRange);

    /// Cut valid only in the subtree of this node.
    fn add_local(&mut self, range: LinearRange);
}

/// Code run by the integer oracle at its nodes. May be called concurrently.
pub trait NodeCallback: Send + Sync {
    fn invoke(&self, node: &mut dyn NodeContext) -> Result<(), OracleError>;
}

#[derive(Clone)]
pub enum Callback {
    /// Runs on every integral node candidate before it is accepted.
    Lazy(Arc<dyn NodeCallback>),
    /// Runs on fractional nodes.
    UserCut(Arc<dyn NodeCallback>),
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callback::Lazy(_) => f.write_str("Callback::Lazy"),
            Callback::UserCut(_) => f.write_str("Callback::UserCut"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegerOutcome {
    pub status: SolveStatus,
    /// Incumbent objective including the constant.
    pub objective: Option<f64>,
    pub solution: Option<ValueSnapshot>,
    pub nodes: usize,
    /// Lower bound on the optimum when the search stopped.
    pub best_bound: f64,
}

/// The integer model solved after the root phase.
pub trait IntegerOracle {
    fn add_range(&mut self, range: &LinearRange) -> Result<ModelHandle, OracleError>;

    /// Start point given as `(key, value)`; keys not listed are `0.0`.
    fn add_mip_start(&mut self, assignment: &[(EdgeKey, f64)]) -> Result<(), OracleError>;

    fn use_callback(&mut self, callback: Callback);

    fn set_parameter(&mut self, parameter: OracleParameter);

    fn solve(&mut self) -> Result<IntegerOutcome, OracleError>;
}

/// Builds the relaxation and integer models of a formulation.
pub trait OracleFactory {
    type Relaxation: RelaxationOracle;
    type Integer: IntegerOracle;

    fn relaxation(&self, formulation: &Formulation) -> Result<Self::Relaxation, OracleError>;

    fn integer(&self, formulation: &Formulation) -> Result<Self::Integer, OracleError>;
}
