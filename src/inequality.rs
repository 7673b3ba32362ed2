//! Valid inequalities of the clique-partitioning polytope.
//!
//! Every inequality reads `Σ c_e x_e <= bound` and reports its slack as
//! `bound - Σ c_e x_e`. Negative slack means violated.

pub mod cycle;
pub mod odd_cycle;
pub mod triangle;
pub mod two_partition;

use std::fmt;

use crate::graph::EdgeKey;
use crate::snapshot::ValueProvider;

pub use cycle::CycleInequality;
pub use odd_cycle::OddCycleInequality;
pub use triangle::TriangleInequality;
pub use two_partition::TwoPartitionInequality;

/// Default tolerance for tightness checks.
pub const DEFAULT_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InequalityKind {
    Cycle,
    Triangle,
    TwoPartition,
    OddCycle,
}

impl fmt::Display for InequalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InequalityKind::Cycle => "cycle",
            InequalityKind::Triangle => "triangle",
            InequalityKind::TwoPartition => "2-partition",
            InequalityKind::OddCycle => "odd-cycle",
        };
        f.write_str(name)
    }
}

/// `lower <= Σ coefficient * x_key <= upper` over edge variables.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRange {
    pub terms: Vec<(EdgeKey, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearRange {
    /// `Σ terms <= upper` with no lower bound.
    pub fn at_most(terms: Vec<(EdgeKey, f64)>, upper: f64) -> Self {
        Self {
            terms,
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    pub fn activity(&self, values: &dyn ValueProvider) -> f64 {
        self.terms
            .iter()
            .map(|&(key, c)| c * values.value(key))
            .sum()
    }

    /// True if the activity lies within `[lower - eps, upper + eps]`.
    pub fn is_satisfied(&self, values: &dyn ValueProvider, eps: f64) -> bool {
        let activity = self.activity(values);
        activity >= self.lower - eps && activity <= self.upper + eps
    }
}

/// Behaviour shared by every inequality kind.
pub trait ValidInequality {
    fn kind(&self) -> InequalityKind;

    /// Right-hand side of `lhs <= bound`.
    fn bound(&self) -> f64;

    /// Left-hand side value under `values`.
    fn evaluate(&self, values: &dyn ValueProvider) -> f64;

    /// Coefficients of the left-hand side.
    fn terms(&self) -> Vec<(EdgeKey, f64)>;

    fn linear_range(&self) -> LinearRange {
        LinearRange::at_most(self.terms(), self.bound())
    }

    fn slack(&self, values: &dyn ValueProvider) -> f64 {
        self.bound() - self.evaluate(values)
    }

    fn is_violated(&self, values: &dyn ValueProvider, eps: f64) -> bool {
        self.slack(values) < -eps
    }

    fn is_tight(&self, values: &dyn ValueProvider, eps: f64) -> bool {
        self.slack(values).abs() < eps
    }
}

/// Order-independent identity of an inequality, used to drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    kind: InequalityKind,
    vertices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inequality {
    Cycle(CycleInequality),
    Triangle(TriangleInequality),
    TwoPartition(TwoPartitionInequality),
    OddCycle(OddCycleInequality),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Inequality::Cycle($inner) => $body,
            Inequality::Triangle($inner) => $body,
            Inequality::TwoPartition($inner) => $body,
            Inequality::OddCycle($inner) => $body,
        }
    };
}

impl ValidInequality for Inequality {
    fn kind(&self) -> InequalityKind {
        dispatch!(self, inner => inner.kind())
    }

    fn bound(&self) -> f64 {
        dispatch!(self, inner => inner.bound())
    }

    fn evaluate(&self, values: &dyn ValueProvider) -> f64 {
        dispatch!(self, inner => inner.evaluate(values))
    }

    fn terms(&self) -> Vec<(EdgeKey, f64)> {
        dispatch!(self, inner => inner.terms())
    }
}

impl Inequality {
    pub fn canonical(&self) -> CanonicalKey {
        let vertices = dispatch!(self, inner => inner.canonical_vertices());
        CanonicalKey {
            kind: self.kind(),
            vertices,
        }
    }
}

impl fmt::Display for Inequality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inequality::Cycle(c) => write!(f, "cycle {:?}", c.path()),
            Inequality::Triangle(t) => write!(f, "triangle s={} t=({}, {})", t.s, t.t1, t.t2),
            Inequality::TwoPartition(p) => write!(f, "2-partition S={:?} T={:?}", p.s(), p.t()),
            Inequality::OddCycle(c) => write!(f, "odd-cycle {:?}", c.cycle()),
        }
    }
}

impl From<CycleInequality> for Inequality {
    fn from(value: CycleInequality) -> Self {
        Inequality::Cycle(value)
    }
}

impl From<TriangleInequality> for Inequality {
    fn from(value: TriangleInequality) -> Self {
        Inequality::Triangle(value)
    }
}

impl From<TwoPartitionInequality> for Inequality {
    fn from(value: TwoPartitionInequality) -> Self {
        Inequality::TwoPartition(value)
    }
}

impl From<OddCycleInequality> for Inequality {
    fn from(value: OddCycleInequality) -> Self {
        Inequality::OddCycle(value)
    }
}

/// Every triangle inequality on `n` vertices, three per triple.
pub fn all_triangles(n: usize) -> impl Iterator<Item = TriangleInequality> {
    (0..n).flat_map(move |i| {
        (i + 1..n).flat_map(move |j| {
            (j + 1..n).flat_map(move |k| {
                [
                    TriangleInequality::new(i, j, k),
                    TriangleInequality::new(j, i, k),
                    TriangleInequality::new(k, i, j),
                ]
            })
        })
    })
}
