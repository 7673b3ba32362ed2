use crate::graph::EdgeKey;
use crate::snapshot::ValueProvider;

use super::{InequalityKind, ValidInequality};

/// Two-chorded odd cycle inequality
/// `Σ x(c_i, c_{i+1}) - Σ x(c_i, c_{i+2}) <= (|C| - 1) / 2`
/// over a cyclic sequence `C` of odd length at least 5 (indices mod `|C|`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddCycleInequality {
    cycle: Vec<usize>,
}

impl OddCycleInequality {
    pub fn new(cycle: Vec<usize>) -> Self {
        debug_assert!(cycle.len() >= 5 && cycle.len() % 2 == 1);
        Self { cycle }
    }

    pub fn cycle(&self) -> &[usize] {
        &self.cycle
    }

    fn at(&self, pos: usize) -> usize {
        self.cycle[pos % self.cycle.len()]
    }

    /// Rotation starting at the smallest vertex, read in the direction whose
    /// second vertex is smaller.
    pub(crate) fn canonical_vertices(&self) -> Vec<usize> {
        let k = self.cycle.len();
        let start = (0..k).min_by_key(|&p| self.cycle[p]).unwrap_or(0);
        let forward = self.cycle[(start + 1) % k];
        let backward = self.cycle[(start + k - 1) % k];
        if forward <= backward {
            (0..k).map(|d| self.cycle[(start + d) % k]).collect()
        } else {
            (0..k).map(|d| self.cycle[(start + k - d) % k]).collect()
        }
    }
}

impl ValidInequality for OddCycleInequality {
    fn kind(&self) -> InequalityKind {
        InequalityKind::OddCycle
    }

    fn bound(&self) -> f64 {
        ((self.cycle.len() - 1) / 2) as f64
    }

    fn evaluate(&self, values: &dyn ValueProvider) -> f64 {
        (0..self.cycle.len())
            .map(|i| {
                values.value_of(self.at(i), self.at(i + 1))
                    - values.value_of(self.at(i), self.at(i + 2))
            })
            .sum()
    }

    fn terms(&self) -> Vec<(EdgeKey, f64)> {
        let k = self.cycle.len();
        let mut terms = Vec::with_capacity(2 * k);
        for i in 0..k {
            terms.push((EdgeKey::new(self.at(i), self.at(i + 1)), 1.0));
        }
        for i in 0..k {
            terms.push((EdgeKey::new(self.at(i), self.at(i + 2)), -1.0));
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound() {
        assert_eq!(OddCycleInequality::new(vec![0, 1, 2, 3, 4]).bound(), 2.0);
        assert_eq!(OddCycleInequality::new(vec![0, 1, 2, 3, 4, 5, 6]).bound(), 3.0);
    }

    #[test]
    fn test_canonical_rotation_and_direction() {
        let a = OddCycleInequality::new(vec![3, 4, 0, 2, 1]);
        let b = OddCycleInequality::new(vec![0, 4, 3, 1, 2]);
        assert_eq!(a.canonical_vertices(), vec![0, 2, 1, 3, 4]);
        assert_eq!(b.canonical_vertices(), vec![0, 2, 1, 3, 4]);
    }

    #[test]
    fn test_terms_cover_edges_and_chords() {
        let terms = OddCycleInequality::new(vec![0, 1, 2, 3, 4]).terms();
        assert_eq!(terms.len(), 10);
        assert!(terms.contains(&(EdgeKey::new(0, 4), 1.0)));
        assert!(terms.contains(&(EdgeKey::new(0, 3), -1.0)));
    }
}
