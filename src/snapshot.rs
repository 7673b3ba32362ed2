//! Read-only views of relaxation values.
//!
//! Separators never talk to an oracle. They read values through
//! [`ValueProvider`], usually a [`ValueSnapshot`] taken right after a solve or
//! handed to a branch-and-bound callback for a single node.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1};

use crate::formulation::{VarId, VariableIndex};
use crate::graph::EdgeKey;

/// Read access to the value of each edge variable.
pub trait ValueProvider {
    /// Value of the variable of `key`. Pairs without a variable read as `0.0`.
    fn value(&self, key: EdgeKey) -> f64;

    /// Value of `{i, j}`, `0.0` when `i == j`.
    fn value_of(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.value(EdgeKey::new(i, j))
        }
    }
}

/// Immutable copy of every variable's value at one point in time.
#[derive(Debug, Clone)]
pub struct ValueSnapshot {
    index: Arc<VariableIndex>,
    values: Vec<f64>,
}

impl ValueSnapshot {
    pub fn new(index: Arc<VariableIndex>, values: Vec<f64>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self { index, values }
    }

    pub fn zeros(index: Arc<VariableIndex>) -> Self {
        let values = vec![0.0; index.len()];
        Self { index, values }
    }

    /// Builds a snapshot from `(key, value)` pairs; keys without a variable are ignored.
    pub fn from_assignment(index: Arc<VariableIndex>, assignment: &[(EdgeKey, f64)]) -> Self {
        let mut values = vec![0.0; index.len()];
        for &(key, value) in assignment {
            if let Some(var) = index.variable(key) {
                values[var] = value;
            }
        }
        Self { index, values }
    }

    pub fn index(&self) -> &Arc<VariableIndex> {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, var: VarId) -> f64 {
        self.values[var]
    }

    pub fn iter(&self) -> impl Iterator<Item = (EdgeKey, f64)> + '_ {
        self.index.keys().iter().copied().zip(self.values.iter().copied())
    }

    /// True if every value lies within `eps` of 0 or 1.
    pub fn is_integral(&self, eps: f64) -> bool {
        self.values.iter().all(|&v| v < eps || v > 1.0 - eps)
    }

    /// Dense `n x n` copy for separators that read many pairs.
    pub fn to_matrix(&self) -> ValueMatrix {
        ValueMatrix::from_snapshot(self)
    }
}

impl ValueProvider for ValueSnapshot {
    fn value(&self, key: EdgeKey) -> f64 {
        self.index.variable(key).map_or(0.0, |var| self.values[var])
    }
}

/// Symmetric dense matrix of pair values with a zero diagonal.
#[derive(Debug, Clone)]
pub struct ValueMatrix {
    data: Array2<f64>,
}

impl ValueMatrix {
    pub fn from_snapshot(snapshot: &ValueSnapshot) -> Self {
        let n = snapshot.index().n();
        let mut data = Array2::zeros((n, n));
        for (key, value) in snapshot.iter() {
            let (i, j) = key.endpoints();
            data[[i, j]] = value;
            data[[j, i]] = value;
        }
        Self { data }
    }

    pub fn n(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j]]
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }
}

impl ValueProvider for ValueMatrix {
    fn value(&self, key: EdgeKey) -> f64 {
        self.get(key.lo(), key.hi())
    }

    fn value_of(&self, i: usize, j: usize) -> f64 {
        self.get(i, j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SignedGraph;

    #[test]
    fn test_missing_variable_reads_zero() {
        let g = SignedGraph::new(3, vec![(0, 1, 1.0)]).unwrap();
        let index = Arc::new(VariableIndex::sparse(&g));
        let snapshot = ValueSnapshot::new(index, vec![0.75]);
        assert_eq!(snapshot.value_of(1, 0), 0.75);
        assert_eq!(snapshot.value_of(1, 2), 0.0);
        assert_eq!(snapshot.value_of(2, 2), 0.0);
    }

    #[test]
    fn test_integrality() {
        let index = Arc::new(VariableIndex::complete(3));
        let snapshot = ValueSnapshot::new(index.clone(), vec![1.0, 0.0, 1.0 - 1e-9]);
        assert!(snapshot.is_integral(1e-6));
        let snapshot = ValueSnapshot::new(index, vec![1.0, 0.5, 0.0]);
        assert!(!snapshot.is_integral(1e-6));
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let index = Arc::new(VariableIndex::complete(3));
        let snapshot = ValueSnapshot::from_assignment(
            index,
            &[(EdgeKey::new(0, 2), 0.25), (EdgeKey::new(1, 2), 0.5)],
        );
        let m = snapshot.to_matrix();
        assert_eq!(m.get(2, 0), 0.25);
        assert_eq!(m.get(0, 2), 0.25);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(m.row(2).to_vec(), vec![0.25, 0.5, 0.0]);
    }
}
