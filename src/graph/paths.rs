//! Path searches on [`SignedGraph`].
//!
//! All searches return the path as a vertex sequence starting at the source and
//! ending at the target. An empty vector means no path exists.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use bitvec::prelude::*;

use super::{EdgeKey, SignedGraph};

const NO_PARENT: usize = usize::MAX;

impl SignedGraph {
    /// Unweighted shortest path from `i` to `j` by breadth-first search.
    ///
    /// Ties are broken by discovery order over ascending adjacency lists.
    ///
    /// # Complexity
    /// * Time: O(V + E)
    /// * Space: O(V)
    pub fn shortest_path(&self, i: usize, j: usize) -> Vec<usize> {
        self.breadth_first(i, j, usize::MAX, false)
    }

    /// Breadth-first search limited to paths of at most `max_len` edges.
    ///
    /// With `only_positive` set, edges of negative weight are not traversed.
    pub fn shortest_path_bounded(
        &self,
        i: usize,
        j: usize,
        max_len: usize,
        only_positive: bool,
    ) -> Vec<usize> {
        self.breadth_first(i, j, max_len, only_positive)
    }

    fn breadth_first(&self, i: usize, j: usize, max_len: usize, only_positive: bool) -> Vec<usize> {
        if i == j {
            return vec![i];
        }
        let n = self.n();
        let mut visited = bitvec![0; n];
        let mut parent = vec![NO_PARENT; n];
        let mut distance = vec![0usize; n];
        let mut queue = VecDeque::new();

        visited.set(i, true);
        queue.push_back(i);
        while let Some(u) = queue.pop_front() {
            if distance[u] >= max_len {
                continue;
            }
            for &(v, weight) in self.weighted_neighbors(u) {
                if visited[v] || (only_positive && weight < 0.0) {
                    continue;
                }
                visited.set(v, true);
                parent[v] = u;
                distance[v] = distance[u] + 1;
                if v == j {
                    return trace(&parent, i, j);
                }
                queue.push_back(v);
            }
        }
        Vec::new()
    }

    /// Dijkstra shortest path from `i` to `j`.
    ///
    /// `cost` maps an edge key and its weight to a non-negative traversal cost,
    /// or `None` to exclude the edge from the search.
    ///
    /// # Complexity
    /// * Time: O((V + E) log V)
    /// * Space: O(V)
    pub fn shortest_weighted_path<F>(&self, i: usize, j: usize, mut cost: F) -> Vec<usize>
    where
        F: FnMut(EdgeKey, f64) -> Option<f64>,
    {
        if i == j {
            return vec![i];
        }
        let n = self.n();
        let mut distance = vec![f64::INFINITY; n];
        let mut parent = vec![NO_PARENT; n];
        let mut settled = bitvec![0; n];
        let mut heap = BinaryHeap::new();

        distance[i] = 0.0;
        heap.push(State {
            distance: 0.0,
            vertex: i,
        });
        while let Some(State { distance: d, vertex: u }) = heap.pop() {
            if settled[u] {
                continue;
            }
            settled.set(u, true);
            if u == j {
                return trace(&parent, i, j);
            }
            for &(v, weight) in self.weighted_neighbors(u) {
                if settled[v] {
                    continue;
                }
                let Some(step) = cost(EdgeKey::new(u, v), weight) else {
                    continue;
                };
                debug_assert!(step >= 0.0, "negative traversal cost on ({u}, {v})");
                let candidate = d + step.max(0.0);
                if candidate < distance[v] {
                    distance[v] = candidate;
                    parent[v] = u;
                    heap.push(State {
                        distance: candidate,
                        vertex: v,
                    });
                }
            }
        }
        Vec::new()
    }
}

fn trace(parent: &[usize], i: usize, j: usize) -> Vec<usize> {
    let mut path = vec![j];
    let mut current = j;
    while current != i {
        current = parent[current];
        path.push(current);
    }
    path.reverse();
    path
}

#[derive(Debug, Clone, Copy)]
struct State {
    distance: f64,
    vertex: usize,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    // Reversed so the max-heap pops the closest vertex, lowest id first on ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> SignedGraph {
        // 0 - 1 - 2 - 3 with a negative shortcut 0 - 3 and a detour 1 - 4 - 3
        SignedGraph::new(
            5,
            vec![
                (0, 1, 1.0),
                (1, 2, 1.0),
                (2, 3, 1.0),
                (0, 3, -1.0),
                (1, 4, 2.0),
                (4, 3, 2.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_bfs_shortest_path() {
        let g = ladder();
        assert_eq!(g.shortest_path(0, 3), vec![0, 3]);
        assert_eq!(g.shortest_path(2, 2), vec![2]);
    }

    #[test]
    fn test_bfs_tie_break_by_discovery_order() {
        let g = ladder().without_edge(EdgeKey::new(0, 3));
        // 1-2-3 and 1-4-3 have the same length; 2 is discovered first.
        assert_eq!(g.shortest_path(0, 3), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_bounded_bfs() {
        let g = ladder();
        assert_eq!(g.shortest_path_bounded(0, 3, 3, true), vec![0, 1, 2, 3]);
        assert!(g.shortest_path_bounded(0, 3, 2, true).is_empty());
        assert_eq!(g.shortest_path_bounded(0, 3, 1, false), vec![0, 3]);
    }

    #[test]
    fn test_missing_path_is_empty() {
        let g = SignedGraph::new(4, vec![(0, 1, 1.0), (2, 3, 1.0)]).unwrap();
        assert!(g.shortest_path(0, 3).is_empty());
        assert!(g.shortest_weighted_path(0, 3, |_, _| Some(1.0)).is_empty());
    }

    #[test]
    fn test_dijkstra_uses_costs() {
        let g = ladder();
        let path = g.shortest_weighted_path(0, 3, |_, w| Some(w.abs()));
        assert_eq!(path, vec![0, 3]);

        let path = g.shortest_weighted_path(0, 3, |key, w| {
            if key == EdgeKey::new(0, 3) {
                None
            } else {
                Some(w)
            }
        });
        assert_eq!(path, vec![0, 1, 2, 3]);
    }
}
