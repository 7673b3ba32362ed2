use crate::graph::EdgeKey;
use crate::snapshot::ValueProvider;

use super::{InequalityKind, ValidInequality};

/// `x_{s,t1} + x_{s,t2} - x_{t1,t2} <= 1`: if `s` shares a cluster with both
/// `t1` and `t2`, so do `t1` and `t2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriangleInequality {
    pub s: usize,
    pub t1: usize,
    pub t2: usize,
}

impl TriangleInequality {
    pub fn new(s: usize, t1: usize, t2: usize) -> Self {
        debug_assert!(s != t1 && s != t2 && t1 != t2);
        Self { s, t1, t2 }
    }

    pub(crate) fn canonical_vertices(&self) -> Vec<usize> {
        vec![self.s, self.t1.min(self.t2), self.t1.max(self.t2)]
    }
}

impl ValidInequality for TriangleInequality {
    fn kind(&self) -> InequalityKind {
        InequalityKind::Triangle
    }

    fn bound(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, values: &dyn ValueProvider) -> f64 {
        values.value_of(self.s, self.t1) + values.value_of(self.s, self.t2)
            - values.value_of(self.t1, self.t2)
    }

    fn terms(&self) -> Vec<(EdgeKey, f64)> {
        vec![
            (EdgeKey::new(self.s, self.t1), 1.0),
            (EdgeKey::new(self.s, self.t2), 1.0),
            (EdgeKey::new(self.t1, self.t2), -1.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::VariableIndex;
    use crate::snapshot::ValueSnapshot;
    use std::sync::Arc;

    #[test]
    fn test_triangle_slack() {
        let values = ValueSnapshot::from_assignment(
            Arc::new(VariableIndex::complete(3)),
            &[(EdgeKey::new(0, 2), 1.0), (EdgeKey::new(1, 2), 1.0)],
        );
        assert!((TriangleInequality::new(2, 0, 1).slack(&values) + 1.0).abs() < 1e-12);
        assert!((TriangleInequality::new(0, 1, 2).slack(&values) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_canonical_ignores_target_order() {
        assert_eq!(
            TriangleInequality::new(1, 4, 2).canonical_vertices(),
            TriangleInequality::new(1, 2, 4).canonical_vertices()
        );
    }
}
