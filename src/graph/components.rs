use super::Edge;

/// Disjoint-set forest with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merges the sets of `x` and `y`. Returns `false` if they were already joined.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let x_root = self.find(x);
        let y_root = self.find(y);
        if x_root == y_root {
            return false;
        }
        match self.rank[x_root].cmp(&self.rank[y_root]) {
            std::cmp::Ordering::Less => self.parent[x_root] = y_root,
            std::cmp::Ordering::Greater => self.parent[y_root] = x_root,
            std::cmp::Ordering::Equal => {
                self.parent[y_root] = x_root;
                self.rank[x_root] += 1;
            }
        }
        true
    }

    /// Relabels every vertex with a dense set id in `[0, k)`, numbered in
    /// order of first appearance. Returns the labels and `k`.
    pub fn labels(&mut self) -> (Vec<usize>, usize) {
        let n = self.parent.len();
        let mut by_root = vec![usize::MAX; n];
        let mut labels = Vec::with_capacity(n);
        let mut count = 0;
        for v in 0..n {
            let root = self.find(v);
            if by_root[root] == usize::MAX {
                by_root[root] = count;
                count += 1;
            }
            labels.push(by_root[root]);
        }
        (labels, count)
    }
}

/// Labels the connected components of the graph on `n` vertices spanned by `edges`.
pub fn label_components(n: usize, edges: &[Edge]) -> (Vec<usize>, usize) {
    let mut uf = UnionFind::new(n);
    for edge in edges {
        uf.union(edge.key.lo(), edge.key.hi());
    }
    uf.labels()
}
