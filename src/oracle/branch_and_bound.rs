//! Depth-first branch and bound over the simplex relaxation.
//!
//! Open nodes are taken from the top of a stack in waves of up to `threads`
//! nodes and evaluated in parallel on a dedicated rayon pool. A node only
//! reads the model rows as they were when its wave started; cuts produced by
//! callbacks are installed into the shared model after the wave completes.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::OracleError;
use crate::formulation::{Formulation, VarId, VariableIndex};
use crate::graph::EdgeKey;
use crate::inequality::LinearRange;
use crate::snapshot::ValueSnapshot;

use super::model::{to_row, LinearRow, RowArena};
use super::simplex::{minimize, LinearProgram, LpStatus, SimplexConfig};
use super::{
    Callback, IntegerOracle, IntegerOutcome, ModelHandle, NodeCallback, NodeContext,
    OracleParameter, SolveStatus,
};

const INTEGRALITY_EPS: f64 = 1e-6;
const PRUNE_EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Node {
    fixings: Vec<(VarId, f64)>,
    local_rows: Vec<LinearRow>,
    bound: f64,
    depth: usize,
}

impl Node {
    fn root() -> Self {
        Self {
            fixings: Vec::new(),
            local_rows: Vec::new(),
            bound: f64::NEG_INFINITY,
            depth: 0,
        }
    }

    fn child(&self, var: VarId, value: f64, local_rows: &[LinearRow], bound: f64) -> Self {
        let mut fixings = self.fixings.clone();
        fixings.push((var, value));
        Self {
            fixings,
            local_rows: local_rows.to_vec(),
            bound,
            depth: self.depth + 1,
        }
    }
}

enum NodeResult {
    Pruned,
    Infeasible,
    Integral { objective: f64, point: Vec<f64> },
    Branched { near: Node, far: Node },
}

struct Evaluated {
    result: NodeResult,
    global_rows: Vec<LinearRow>,
}

/// Per-invocation callback context.
struct Context {
    values: ValueSnapshot,
    integral: bool,
    depth: usize,
    global: Vec<LinearRange>,
    local: Vec<LinearRange>,
}

impl Context {
    fn new(values: ValueSnapshot, integral: bool, depth: usize) -> Self {
        Self {
            values,
            integral,
            depth,
            global: Vec::new(),
            local: Vec::new(),
        }
    }

    /// Drains the collected ranges as `(global, local)` rows.
    fn take_rows(
        &mut self,
        index: &VariableIndex,
    ) -> Result<(Vec<LinearRow>, Vec<LinearRow>), OracleError> {
        let global = self
            .global
            .drain(..)
            .map(|range| to_row(index, &range))
            .collect::<Result<Vec<_>, _>>()?;
        let local = self
            .local
            .drain(..)
            .map(|range| to_row(index, &range))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((global, local))
    }
}

impl NodeContext for Context {
    fn values(&self) -> &ValueSnapshot {
        &self.values
    }

    fn is_integral(&self) -> bool {
        self.integral
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn add_lazy(&mut self, range: LinearRange) {
        self.global.push(range);
    }

    fn add_user_cut(&mut self, range: LinearRange) {
        self.global.push(range);
    }

    fn add_local(&mut self, range: LinearRange) {
        self.local.push(range);
    }
}

fn is_integral(point: &[f64]) -> bool {
    point
        .iter()
        .all(|&v| v < INTEGRALITY_EPS || v > 1.0 - INTEGRALITY_EPS)
}

fn cuts_off(rows: &[LinearRow], point: &[f64]) -> bool {
    rows.iter().any(|row| !row.is_satisfied(point, INTEGRALITY_EPS))
}

/// Integer model over binary edge variables.
pub struct BranchAndBoundOracle {
    index: Arc<VariableIndex>,
    costs: Vec<f64>,
    constant: f64,
    rows: RowArena,
    mip_start: Option<Vec<f64>>,
    lazy: Vec<Arc<dyn NodeCallback>>,
    user_cuts: Vec<Arc<dyn NodeCallback>>,
    threads: usize,
    time_limit: Option<Duration>,
    node_limit: Option<usize>,
    cut_rounds: usize,
    config: SimplexConfig,
}

impl fmt::Debug for BranchAndBoundOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchAndBoundOracle")
            .field("variables", &self.costs.len())
            .field("rows", &self.rows.len())
            .field("lazy_callbacks", &self.lazy.len())
            .field("user_cut_callbacks", &self.user_cuts.len())
            .field("threads", &self.threads)
            .field("time_limit", &self.time_limit)
            .field("node_limit", &self.node_limit)
            .finish_non_exhaustive()
    }
}

impl BranchAndBoundOracle {
    pub fn new(formulation: &Formulation) -> Self {
        Self {
            index: formulation.index().clone(),
            costs: formulation.objective_coefficients().to_vec(),
            constant: formulation.objective_constant(),
            rows: RowArena::new(),
            mip_start: None,
            lazy: Vec::new(),
            user_cuts: Vec::new(),
            threads: 1,
            time_limit: None,
            node_limit: None,
            cut_rounds: 5,
            config: SimplexConfig::default(),
        }
    }

    pub fn with_simplex_config(mut self, config: SimplexConfig) -> Self {
        self.config = config;
        self
    }

    /// Maximum user-cut rounds at one node before it is branched on.
    pub fn with_cut_rounds(mut self, rounds: usize) -> Self {
        self.cut_rounds = rounds;
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn objective_of(&self, point: &[f64]) -> f64 {
        self.costs.iter().zip(point).map(|(c, x)| c * x).sum::<f64>() + self.constant
    }

    /// Accepts the stored start point if it is integral, satisfies every row
    /// and draws no lazy constraint.
    fn check_start(&mut self, point: Vec<f64>) -> Result<Option<(f64, Vec<f64>)>, OracleError> {
        if !is_integral(&point) {
            warn!("discarding fractional MIP start");
            return Ok(None);
        }
        if self.rows.rows().any(|row| !row.is_satisfied(&point, INTEGRALITY_EPS)) {
            warn!("discarding MIP start violating a model row");
            return Ok(None);
        }
        let values = ValueSnapshot::new(self.index.clone(), point.clone());
        let mut context = Context::new(values, true, 0);
        for callback in &self.lazy {
            callback.invoke(&mut context)?;
        }
        let (global, _) = context.take_rows(&self.index)?;
        let rejected = cuts_off(&global, &point);
        for row in global {
            self.rows.add(row);
        }
        if rejected {
            warn!("discarding MIP start rejected by a lazy constraint");
            return Ok(None);
        }
        let objective = self.objective_of(&point);
        info!("MIP start accepted with objective {objective}");
        Ok(Some((objective, point)))
    }

    fn evaluate(&self, node: Node, rows: &[LinearRow], cutoff: f64) -> Result<Evaluated, OracleError> {
        let mut global_rows = Vec::new();
        if node.bound >= cutoff - PRUNE_EPS {
            return Ok(Evaluated {
                result: NodeResult::Pruned,
                global_rows,
            });
        }
        let mut local = node.local_rows.clone();
        let mut rounds = 0;

        loop {
            let mut lp = LinearProgram::unit_box(self.costs.clone());
            lp.rows = rows.iter().chain(&global_rows).chain(&local).cloned().collect();
            for &(var, value) in &node.fixings {
                lp.fix(var, value);
            }
            let solution = minimize(&lp, &self.config);
            match solution.status {
                LpStatus::Optimal => {}
                LpStatus::Infeasible => {
                    return Ok(Evaluated {
                        result: NodeResult::Infeasible,
                        global_rows,
                    })
                }
                status => {
                    return Err(OracleError::Fatal(format!(
                        "node relaxation stopped with {status:?}"
                    )))
                }
            }
            let objective = solution.objective + self.constant;
            if objective >= cutoff - PRUNE_EPS {
                return Ok(Evaluated {
                    result: NodeResult::Pruned,
                    global_rows,
                });
            }

            let point = solution.point;
            let integral = is_integral(&point);
            let values = ValueSnapshot::new(self.index.clone(), point.clone());
            let mut context = Context::new(values, integral, node.depth);

            if integral {
                for callback in &self.lazy {
                    callback.invoke(&mut context)?;
                }
                let (global, new_local) = context.take_rows(&self.index)?;
                let rejected = cuts_off(&global, &point) || cuts_off(&new_local, &point);
                global_rows.extend(global);
                local.extend(new_local);
                if rejected {
                    continue;
                }
                let point = point.iter().map(|v| v.round()).collect();
                return Ok(Evaluated {
                    result: NodeResult::Integral { objective, point },
                    global_rows,
                });
            }

            if rounds < self.cut_rounds && !self.user_cuts.is_empty() {
                for callback in &self.user_cuts {
                    callback.invoke(&mut context)?;
                }
                let (global, new_local) = context.take_rows(&self.index)?;
                let progress = cuts_off(&global, &point) || cuts_off(&new_local, &point);
                global_rows.extend(global);
                local.extend(new_local);
                if progress {
                    rounds += 1;
                    continue;
                }
            }

            // Most fractional variable, lowest id on ties.
            let mut var = 0;
            let mut distance = -1.0;
            for (j, &v) in point.iter().enumerate() {
                let d = v.min(1.0 - v);
                if d > distance + PRUNE_EPS {
                    var = j;
                    distance = d;
                }
            }
            let up = node.child(var, 1.0, &local, objective);
            let down = node.child(var, 0.0, &local, objective);
            let (near, far) = if point[var] >= 0.5 { (up, down) } else { (down, up) };
            return Ok(Evaluated {
                result: NodeResult::Branched { near, far },
                global_rows,
            });
        }
    }
}

impl IntegerOracle for BranchAndBoundOracle {
    fn add_range(&mut self, range: &LinearRange) -> Result<ModelHandle, OracleError> {
        Ok(self.rows.add(to_row(&self.index, range)?))
    }

    fn add_mip_start(&mut self, assignment: &[(EdgeKey, f64)]) -> Result<(), OracleError> {
        let mut point = vec![0.0; self.index.len()];
        for &(key, value) in assignment {
            let var = self
                .index
                .variable(key)
                .ok_or_else(|| OracleError::Fatal(format!("MIP start names unknown edge {key}")))?;
            point[var] = value;
        }
        self.mip_start = Some(point);
        Ok(())
    }

    fn use_callback(&mut self, callback: Callback) {
        match callback {
            Callback::Lazy(cb) => self.lazy.push(cb),
            Callback::UserCut(cb) => self.user_cuts.push(cb),
        }
    }

    fn set_parameter(&mut self, parameter: OracleParameter) {
        match parameter {
            OracleParameter::Threads(threads) => self.threads = threads.max(1),
            OracleParameter::TimeLimit(limit) => self.time_limit = Some(limit),
            OracleParameter::NodeLimit(limit) => self.node_limit = Some(limit),
            OracleParameter::IterationLimit(limit) => self.config.max_iterations = limit,
        }
    }

    fn solve(&mut self) -> Result<IntegerOutcome, OracleError> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| OracleError::Fatal(e.to_string()))?;

        let mut incumbent = match self.mip_start.take() {
            Some(point) => self.check_start(point)?,
            None => None,
        };
        let mut stack = vec![Node::root()];
        let mut nodes = 0;
        let mut stopped = false;

        while !stack.is_empty() {
            if self.time_limit.is_some_and(|limit| start.elapsed() >= limit)
                || self.node_limit.is_some_and(|limit| nodes >= limit)
            {
                stopped = true;
                break;
            }
            let cutoff = incumbent.as_ref().map_or(f64::INFINITY, |(v, _)| *v);
            let take = self.threads.min(stack.len());
            let wave = stack.split_off(stack.len() - take);
            let rows: Vec<LinearRow> = self.rows.rows().cloned().collect();

            let this = &*self;
            let results: Vec<Result<Evaluated, OracleError>> = pool.install(|| {
                wave.into_par_iter()
                    .map(|node| this.evaluate(node, &rows, cutoff))
                    .collect()
            });
            nodes += results.len();

            for evaluated in results {
                let Evaluated {
                    result,
                    global_rows,
                } = evaluated?;
                for row in global_rows {
                    self.rows.add(row);
                }
                match result {
                    NodeResult::Integral { objective, point } => {
                        let best = incumbent.as_ref().map_or(f64::INFINITY, |(v, _)| *v);
                        if objective < best - PRUNE_EPS {
                            info!("new incumbent {objective} after {nodes} nodes");
                            incumbent = Some((objective, point));
                        }
                    }
                    NodeResult::Branched { near, far } => {
                        stack.push(far);
                        stack.push(near);
                    }
                    NodeResult::Pruned | NodeResult::Infeasible => {}
                }
            }
            debug!(
                "wave done: {nodes} nodes, {} open, {} rows",
                stack.len(),
                self.rows.len()
            );
        }

        let open_bound = stack
            .iter()
            .map(|node| node.bound)
            .fold(f64::INFINITY, f64::min);
        let (status, best_bound) = match (&incumbent, stopped) {
            (Some((v, _)), false) => (SolveStatus::Optimal, *v),
            (None, false) => (SolveStatus::Infeasible, f64::INFINITY),
            (Some((v, _)), true) => (SolveStatus::Feasible, open_bound.min(*v)),
            (None, true) => (SolveStatus::Unknown, open_bound),
        };
        info!(
            "branch and bound finished: {status:?} after {nodes} nodes in {:.2?}",
            start.elapsed()
        );

        let (objective, solution) = match incumbent {
            Some((v, point)) => (Some(v), Some(ValueSnapshot::new(self.index.clone(), point))),
            None => (None, None),
        };
        Ok(IntegerOutcome {
            status,
            objective,
            solution,
            nodes,
            best_bound,
        })
    }
}
