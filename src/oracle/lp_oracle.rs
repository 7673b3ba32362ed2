use std::sync::Arc;

use log::debug;

use crate::error::OracleError;
use crate::formulation::{Formulation, VariableIndex};
use crate::graph::EdgeKey;
use crate::inequality::LinearRange;
use crate::snapshot::ValueSnapshot;

use super::branch_and_bound::BranchAndBoundOracle;
use super::model::{to_row, RowArena};
use super::simplex::{minimize, LinearProgram, LpStatus, SimplexConfig};
use super::{ModelHandle, OracleFactory, OracleParameter, RelaxationOracle, SolveOutcome, SolveStatus};

/// LP relaxation over `[0, 1]` edge variables solved by [`minimize`].
#[derive(Debug, Clone)]
pub struct SimplexOracle {
    index: Arc<VariableIndex>,
    costs: Vec<f64>,
    constant: f64,
    rows: RowArena,
    config: SimplexConfig,
    solution: Option<(Vec<f64>, f64)>,
}

impl SimplexOracle {
    pub fn new(formulation: &Formulation) -> Self {
        Self {
            index: formulation.index().clone(),
            costs: formulation.objective_coefficients().to_vec(),
            constant: formulation.objective_constant(),
            rows: RowArena::new(),
            config: SimplexConfig::default(),
            solution: None,
        }
    }

    /// Number of rows currently in the model.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl RelaxationOracle for SimplexOracle {
    fn solve(&mut self) -> Result<SolveOutcome, OracleError> {
        let mut lp = LinearProgram::unit_box(self.costs.clone());
        lp.rows = self.rows.rows().cloned().collect();
        let solution = minimize(&lp, &self.config);
        debug!(
            "relaxation with {} rows: {:?} after {} pivots",
            lp.rows.len(),
            solution.status,
            solution.iterations
        );
        match solution.status {
            LpStatus::Optimal => {
                let objective = solution.objective + self.constant;
                self.solution = Some((solution.point, objective));
                Ok(SolveOutcome {
                    status: SolveStatus::Optimal,
                    objective,
                })
            }
            LpStatus::Infeasible => {
                self.solution = None;
                Ok(SolveOutcome {
                    status: SolveStatus::Infeasible,
                    objective: f64::INFINITY,
                })
            }
            status => {
                self.solution = None;
                Err(OracleError::Fatal(format!("simplex stopped with {status:?}")))
            }
        }
    }

    fn value(&self, key: EdgeKey) -> Result<f64, OracleError> {
        let unavailable = || OracleError::ValueUnavailable(key.lo(), key.hi());
        let (point, _) = self.solution.as_ref().ok_or_else(unavailable)?;
        let var = self.index.variable(key).ok_or_else(unavailable)?;
        Ok(point[var])
    }

    fn snapshot(&self) -> ValueSnapshot {
        match &self.solution {
            Some((point, _)) => ValueSnapshot::new(self.index.clone(), point.clone()),
            None => ValueSnapshot::zeros(self.index.clone()),
        }
    }

    fn best_objective(&self) -> f64 {
        self.solution.as_ref().map_or(f64::NAN, |s| s.1)
    }

    fn add_range(&mut self, range: &LinearRange) -> Result<ModelHandle, OracleError> {
        Ok(self.rows.add(to_row(&self.index, range)?))
    }

    fn remove_range(&mut self, handle: ModelHandle) -> Result<(), OracleError> {
        self.rows.remove(handle).map(|_| ())
    }

    fn set_parameter(&mut self, parameter: OracleParameter) {
        if let OracleParameter::IterationLimit(limit) = parameter {
            self.config.max_iterations = limit;
        }
    }
}

/// Builds [`SimplexOracle`] relaxations and [`BranchAndBoundOracle`] integer models.
#[derive(Debug, Clone, Default)]
pub struct SimplexFactory {
    config: SimplexConfig,
}

impl SimplexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SimplexConfig) -> Self {
        self.config = config;
        self
    }
}

impl OracleFactory for SimplexFactory {
    type Relaxation = SimplexOracle;
    type Integer = BranchAndBoundOracle;

    fn relaxation(&self, formulation: &Formulation) -> Result<SimplexOracle, OracleError> {
        let mut oracle = SimplexOracle::new(formulation);
        oracle.config = self.config.clone();
        Ok(oracle)
    }

    fn integer(&self, formulation: &Formulation) -> Result<BranchAndBoundOracle, OracleError> {
        Ok(BranchAndBoundOracle::new(formulation).with_simplex_config(self.config.clone()))
    }
}
