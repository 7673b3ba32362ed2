use std::fmt;

use crate::error::{Error, Result};

/// Canonical unordered vertex pair `(min(i, j), max(i, j))`.
///
/// Identifies decision variables, edge weights and cut coefficients. The
/// derived ordering sorts keys lexicographically, which is the iteration order
/// every separator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    lo: usize,
    hi: usize,
}

impl EdgeKey {
    /// Builds the key of `{i, j}`. The endpoints must differ.
    pub fn new(i: usize, j: usize) -> Self {
        debug_assert!(i != j, "self loop on vertex {i}");
        if i < j {
            Self { lo: i, hi: j }
        } else {
            Self { lo: j, hi: i }
        }
    }

    /// Fallible variant of [`EdgeKey::new`] for untrusted input.
    pub fn try_new(i: usize, j: usize) -> Result<Self> {
        if i == j {
            return Err(Error::SelfLoop(i));
        }
        Ok(Self::new(i, j))
    }

    pub fn lo(&self) -> usize {
        self.lo
    }

    pub fn hi(&self) -> usize {
        self.hi
    }

    pub fn endpoints(&self) -> (usize, usize) {
        (self.lo, self.hi)
    }

    /// The endpoint opposite to `v`.
    pub fn other(&self, v: usize) -> usize {
        debug_assert!(v == self.lo || v == self.hi);
        if v == self.lo {
            self.hi
        } else {
            self.lo
        }
    }

    pub fn contains(&self, v: usize) -> bool {
        self.lo == v || self.hi == v
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

/// A weighted edge. Positive weight attracts, negative weight repels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub key: EdgeKey,
    pub weight: f64,
}

impl Edge {
    pub fn new(i: usize, j: usize, weight: f64) -> Self {
        Self {
            key: EdgeKey::new(i, j),
            weight,
        }
    }
}
