//! Weighted signed graphs and the searches the separators run on them.

pub mod components;
pub mod edge;
pub mod paths;
pub mod signed_graph;

pub use components::UnionFind;
pub use edge::{Edge, EdgeKey};
pub use signed_graph::SignedGraph;
