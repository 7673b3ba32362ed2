use crate::graph::EdgeKey;
use crate::snapshot::ValueProvider;

use super::{InequalityKind, ValidInequality};

/// 2-partition inequality `x(S, T) - x(S) - x(T) <= |S|` for disjoint vertex
/// sets with `1 <= |S| < |T|`.
///
/// `x(S, T)` sums the pairs across the sets; `x(S)` and `x(T)` sum the pairs
/// inside each set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoPartitionInequality {
    s: Vec<usize>,
    t: Vec<usize>,
}

impl TwoPartitionInequality {
    pub fn new(s: Vec<usize>, t: Vec<usize>) -> Self {
        debug_assert!(!s.is_empty() && s.len() < t.len());
        debug_assert!(s.iter().all(|v| !t.contains(v)));
        Self { s, t }
    }

    pub fn s(&self) -> &[usize] {
        &self.s
    }

    pub fn t(&self) -> &[usize] {
        &self.t
    }

    pub(crate) fn canonical_vertices(&self) -> Vec<usize> {
        let mut s = self.s.clone();
        let mut t = self.t.clone();
        s.sort_unstable();
        t.sort_unstable();
        s.push(usize::MAX);
        s.extend(t);
        s
    }
}

fn inner_sum(set: &[usize], values: &dyn ValueProvider) -> f64 {
    let mut total = 0.0;
    for (a, &u) in set.iter().enumerate() {
        for &v in &set[a + 1..] {
            total += values.value_of(u, v);
        }
    }
    total
}

impl ValidInequality for TwoPartitionInequality {
    fn kind(&self) -> InequalityKind {
        InequalityKind::TwoPartition
    }

    fn bound(&self) -> f64 {
        self.s.len() as f64
    }

    fn evaluate(&self, values: &dyn ValueProvider) -> f64 {
        let mut across = 0.0;
        for &u in &self.s {
            for &v in &self.t {
                across += values.value_of(u, v);
            }
        }
        across - inner_sum(&self.s, values) - inner_sum(&self.t, values)
    }

    fn terms(&self) -> Vec<(EdgeKey, f64)> {
        let mut terms = Vec::new();
        for &u in &self.s {
            for &v in &self.t {
                terms.push((EdgeKey::new(u, v), 1.0));
            }
        }
        for set in [&self.s, &self.t] {
            for (a, &u) in set.iter().enumerate() {
                for &v in &set[a + 1..] {
                    terms.push((EdgeKey::new(u, v), -1.0));
                }
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::VariableIndex;
    use crate::snapshot::ValueSnapshot;
    use std::sync::Arc;

    #[test]
    fn test_star_inequality() {
        // S = {0}, T = {1, 2, 3}: center fully attached, leaves apart.
        let values = ValueSnapshot::from_assignment(
            Arc::new(VariableIndex::complete(4)),
            &[
                (EdgeKey::new(0, 1), 1.0),
                (EdgeKey::new(0, 2), 1.0),
                (EdgeKey::new(0, 3), 1.0),
            ],
        );
        let ineq = TwoPartitionInequality::new(vec![0], vec![1, 2, 3]);
        assert!((ineq.slack(&values) + 2.0).abs() < 1e-12);
        assert_eq!(ineq.terms().len(), 6);
    }

    #[test]
    fn test_canonical_sorts_sets() {
        let a = TwoPartitionInequality::new(vec![0], vec![3, 1]);
        let b = TwoPartitionInequality::new(vec![0], vec![1, 3]);
        assert_eq!(a.canonical_vertices(), b.canonical_vertices());
    }
}
