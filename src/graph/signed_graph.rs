use crate::error::{Error, Result};

use super::components::label_components;
use super::{Edge, EdgeKey};

/// Immutable undirected graph with signed edge weights.
///
/// Adjacency lists are sorted by neighbour id, which fixes the discovery order
/// of every search run on the graph. Component labels are computed once at
/// construction; derived views ([`SignedGraph::filtered`],
/// [`SignedGraph::without_edge`]) are new graphs with their own labels.
#[derive(Debug, Clone)]
pub struct SignedGraph {
    n: usize,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<(usize, f64)>>,
    component: Vec<usize>,
    component_count: usize,
}

impl SignedGraph {
    /// Builds a graph from `(i, j, weight)` triples.
    ///
    /// Zero weights mean "no edge" and are skipped.
    ///
    /// # Errors
    /// * `Error::SelfLoop` if `i == j`
    /// * `Error::InvalidGraph` for out-of-range endpoints, non-finite weights
    ///   or a pair listed twice
    pub fn new<I>(n: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut list = Vec::new();
        for (i, j, weight) in edges {
            if i >= n || j >= n {
                return Err(Error::InvalidGraph(format!(
                    "edge ({i}, {j}) out of range for {n} vertices"
                )));
            }
            let key = EdgeKey::try_new(i, j)?;
            if !weight.is_finite() {
                return Err(Error::InvalidGraph(format!(
                    "non-finite weight on edge {key}"
                )));
            }
            if weight != 0.0 {
                list.push(Edge { key, weight });
            }
        }
        list.sort_by_key(|e| e.key);
        if let Some(pair) = list.windows(2).find(|pair| pair[0].key == pair[1].key) {
            return Err(Error::InvalidGraph(format!(
                "edge {} listed twice",
                pair[0].key
            )));
        }
        Ok(Self::assemble(n, list))
    }

    /// Builds a graph from already validated, distinct edges. Zero weights are kept.
    pub fn from_edges(n: usize, mut edges: Vec<Edge>) -> Self {
        edges.sort_by_key(|e| e.key);
        debug_assert!(edges.windows(2).all(|p| p[0].key != p[1].key));
        debug_assert!(edges.iter().all(|e| e.key.hi() < n));
        Self::assemble(n, edges)
    }

    fn assemble(n: usize, edges: Vec<Edge>) -> Self {
        let mut adjacency = vec![Vec::new(); n];
        for edge in &edges {
            let (i, j) = edge.key.endpoints();
            adjacency[i].push((j, edge.weight));
            adjacency[j].push((i, edge.weight));
        }
        for list in &mut adjacency {
            list.sort_by_key(|&(v, _)| v);
        }
        let (component, component_count) = label_components(n, &edges);
        Self {
            n,
            edges,
            adjacency,
            component,
            component_count,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges in ascending key order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[v].iter().map(|&(u, _)| u)
    }

    pub fn weighted_neighbors(&self, v: usize) -> &[(usize, f64)] {
        &self.adjacency[v]
    }

    pub fn degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }

    /// Weight of edge `{i, j}`, or `None` when the graph has no such edge.
    pub fn weight(&self, i: usize, j: usize) -> Option<f64> {
        let list = &self.adjacency[i];
        list.binary_search_by_key(&j, |&(v, _)| v)
            .ok()
            .map(|pos| list[pos].1)
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.weight(i, j).is_some()
    }

    pub fn component(&self, v: usize) -> usize {
        self.component[v]
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn same_component(&self, i: usize, j: usize) -> bool {
        self.component[i] == self.component[j]
    }

    /// The same graph minus edge `key`.
    pub fn without_edge(&self, key: EdgeKey) -> Self {
        self.filtered(|e| e.key != key)
    }

    /// The subgraph keeping the edges for which `keep` holds.
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Edge) -> bool,
    {
        let edges = self.edges.iter().copied().filter(|e| keep(e)).collect();
        Self::assemble(self.n, edges)
    }

    /// Sum of positive weights, the cost of putting every vertex in its own cluster.
    pub fn positive_weight_sum(&self) -> f64 {
        self.edges
            .iter()
            .map(|e| e.weight)
            .filter(|&w| w > 0.0)
            .fold(0.0, |acc, w| acc + w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> SignedGraph {
        SignedGraph::new(
            5,
            vec![(0, 1, 1.0), (1, 2, -2.0), (2, 3, 0.5), (3, 0, 1.5)],
        )
        .unwrap()
    }

    #[test]
    fn test_adjacency_is_sorted() {
        let g = square();
        assert_eq!(g.neighbors(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(g.weight(2, 1), Some(-2.0));
        assert_eq!(g.weight(0, 2), None);
        assert_eq!(g.degree(4), 0);
    }

    #[test]
    fn test_components() {
        let g = square();
        assert_eq!(g.component_count(), 2);
        assert!(g.same_component(0, 2));
        assert!(!g.same_component(0, 4));
    }

    #[test]
    fn test_zero_weight_is_absent() {
        let g = SignedGraph::new(3, vec![(0, 1, 0.0), (1, 2, 1.0)]).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert!(!g.has_edge(0, 1));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            SignedGraph::new(2, vec![(1, 1, 1.0)]),
            Err(Error::SelfLoop(1))
        ));
        assert!(SignedGraph::new(2, vec![(0, 2, 1.0)]).is_err());
        assert!(SignedGraph::new(3, vec![(0, 1, 1.0), (1, 0, 2.0)]).is_err());
        assert!(SignedGraph::new(3, vec![(0, 1, f64::NAN)]).is_err());
    }

    #[test]
    fn test_derived_views_recompute_components() {
        let g = square();
        let cut = g.without_edge(EdgeKey::new(0, 1)).without_edge(EdgeKey::new(2, 3));
        assert_eq!(g.edge_count(), 4);
        assert_eq!(cut.edge_count(), 2);
        assert!(!cut.same_component(0, 1));
        assert!(cut.same_component(0, 3));

        let positive = g.filtered(|e| e.weight > 0.0);
        assert_eq!(positive.edge_count(), 3);
        assert!(!positive.has_edge(1, 2));
        assert!(positive.same_component(1, 2));
    }

    #[test]
    fn test_positive_weight_sum() {
        assert!((square().positive_weight_sum() - 3.0).abs() < 1e-12);
        let empty = SignedGraph::new(2, Vec::new()).unwrap();
        assert!(empty.positive_weight_sum().is_sign_positive());
    }
}
