//! Row storage shared by the bundled oracles.

use std::collections::BTreeMap;

use crate::error::OracleError;
use crate::formulation::{VarId, VariableIndex};
use crate::inequality::LinearRange;

use super::ModelHandle;

/// `lower <= Σ c_j x_j <= upper` over variable ids.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    pub coefficients: Vec<(VarId, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearRow {
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefficients.iter().map(|&(j, c)| c * x[j]).sum()
    }

    pub fn is_satisfied(&self, x: &[f64], eps: f64) -> bool {
        let activity = self.activity(x);
        activity >= self.lower - eps && activity <= self.upper + eps
    }
}

/// Maps an edge-keyed range to variable ids, merging repeated keys.
///
/// A key without a variable in `index` cannot be expressed in the model and
/// is reported as [`OracleError::Fatal`].
pub fn to_row(index: &VariableIndex, range: &LinearRange) -> Result<LinearRow, OracleError> {
    let mut merged: BTreeMap<VarId, f64> = BTreeMap::new();
    for &(key, c) in &range.terms {
        let var = index
            .variable(key)
            .ok_or_else(|| OracleError::Fatal(format!("edge {key} has no variable")))?;
        *merged.entry(var).or_insert(0.0) += c;
    }
    Ok(LinearRow {
        coefficients: merged.into_iter().filter(|&(_, c)| c != 0.0).collect(),
        lower: range.lower,
        upper: range.upper,
    })
}

/// Slot storage for rows; a handle is the slot index and is never reused.
#[derive(Debug, Clone, Default)]
pub struct RowArena {
    slots: Vec<Option<LinearRow>>,
    active: usize,
}

impl RowArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: LinearRow) -> ModelHandle {
        self.slots.push(Some(row));
        self.active += 1;
        ModelHandle(self.slots.len() - 1)
    }

    pub fn remove(&mut self, handle: ModelHandle) -> Result<LinearRow, OracleError> {
        let row = self
            .slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(OracleError::UnknownHandle(handle.0))?;
        self.active -= 1;
        Ok(row)
    }

    pub fn get(&self, handle: ModelHandle) -> Option<&LinearRow> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    /// Number of rows currently in the model.
    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = &LinearRow> + '_ {
        self.slots.iter().flatten()
    }
}
