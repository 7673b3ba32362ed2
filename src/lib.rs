pub mod cutting_plane;
pub mod error;
pub mod formulation;
pub mod graph;
pub mod heuristic;
pub mod inequality;
pub mod io;
pub mod oracle;
pub mod separation;
pub mod snapshot;

pub use cutting_plane::{CuttingPlaneEngine, CuttingPlaneResult, CuttingPlaneSettings, Termination};
pub use error::{Error, Result};
pub use formulation::{Formulation, VariableSpace};
pub use graph::SignedGraph;
pub use heuristic::FeasibleSolution;
pub use oracle::SimplexFactory;
