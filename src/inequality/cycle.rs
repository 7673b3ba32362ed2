use crate::graph::EdgeKey;
use crate::snapshot::ValueProvider;

use super::{InequalityKind, ValidInequality};

/// `Σ_{consecutive pairs of P} x - x_chord <= |P| - 2` for a path `P` whose
/// endpoints are joined by the chord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInequality {
    path: Vec<usize>,
}

impl CycleInequality {
    /// `path` lists at least three distinct vertices from one chord endpoint to the other.
    pub fn new(path: Vec<usize>) -> Self {
        debug_assert!(path.len() >= 3, "cycle path needs at least three vertices");
        Self { path }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn chord(&self) -> EdgeKey {
        EdgeKey::new(self.path[0], self.path[self.path.len() - 1])
    }

    pub fn path_edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.path.windows(2).map(|w| EdgeKey::new(w[0], w[1]))
    }

    pub(crate) fn canonical_vertices(&self) -> Vec<usize> {
        let mut vertices = self.path.clone();
        if vertices[0] > vertices[vertices.len() - 1] {
            vertices.reverse();
        }
        vertices
    }
}

impl ValidInequality for CycleInequality {
    fn kind(&self) -> InequalityKind {
        InequalityKind::Cycle
    }

    fn bound(&self) -> f64 {
        (self.path.len() - 2) as f64
    }

    fn evaluate(&self, values: &dyn ValueProvider) -> f64 {
        self.path_edges().map(|key| values.value(key)).sum::<f64>() - values.value(self.chord())
    }

    fn terms(&self) -> Vec<(EdgeKey, f64)> {
        let mut terms: Vec<_> = self.path_edges().map(|key| (key, 1.0)).collect();
        terms.push((self.chord(), -1.0));
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::VariableIndex;
    use crate::snapshot::ValueSnapshot;
    use std::sync::Arc;

    fn four_path(chord: f64) -> ValueSnapshot {
        ValueSnapshot::from_assignment(
            Arc::new(VariableIndex::complete(4)),
            &[
                (EdgeKey::new(0, 1), 1.0),
                (EdgeKey::new(1, 2), 1.0),
                (EdgeKey::new(2, 3), 1.0),
                (EdgeKey::new(0, 3), chord),
            ],
        )
    }

    #[test]
    fn test_four_vertex_path() {
        let cycle = CycleInequality::new(vec![0, 1, 2, 3]);
        assert_eq!(cycle.bound(), 2.0);
        // Σ path = 3 = L - 1 with a chord at 1: tight.
        assert!(cycle.slack(&four_path(1.0)).abs() < 1e-12);
        // Chord at 0: violated by one unit.
        assert!((cycle.slack(&four_path(0.0)) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_path_sum_of_l_minus_two_is_slack_one() {
        // Σ path = 2 over a 4-vertex path with chord at 1.
        let values = ValueSnapshot::from_assignment(
            Arc::new(VariableIndex::complete(4)),
            &[
                (EdgeKey::new(0, 1), 1.0),
                (EdgeKey::new(1, 2), 1.0),
                (EdgeKey::new(0, 3), 1.0),
            ],
        );
        let cycle = CycleInequality::new(vec![0, 1, 2, 3]);
        assert!((cycle.slack(&values) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_terms_and_canonical_orientation() {
        let cycle = CycleInequality::new(vec![3, 1, 0]);
        assert_eq!(cycle.chord(), EdgeKey::new(0, 3));
        assert_eq!(
            cycle.terms(),
            vec![
                (EdgeKey::new(1, 3), 1.0),
                (EdgeKey::new(0, 1), 1.0),
                (EdgeKey::new(0, 3), -1.0)
            ]
        );
        assert_eq!(cycle.canonical_vertices(), vec![0, 1, 3]);
    }
}
