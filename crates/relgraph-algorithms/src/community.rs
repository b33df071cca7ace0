//! Community detection algorithms

use super::common::{GraphView, NodeId};
use std::collections::HashMap;

/// Result of WCC algorithm
#[derive(Debug, Clone)]
pub struct WccResult {
    /// Map of Component ID -> List of NodeIds, in dense-index order
    pub components: HashMap<usize, Vec<NodeId>>,
    /// Map of NodeId -> Component ID
    pub node_component: HashMap<NodeId, usize>,
}

impl WccResult {
    /// Component sizes, largest first
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.components.values().map(Vec::len).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

/// Union-Find data structure
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);
        if root_i == root_j {
            return;
        }
        match self.rank[root_i].cmp(&self.rank[root_j]) {
            std::cmp::Ordering::Less => self.parent[root_i] = root_j,
            std::cmp::Ordering::Greater => self.parent[root_j] = root_i,
            std::cmp::Ordering::Equal => {
                self.parent[root_j] = root_i;
                self.rank[root_i] += 1;
            }
        }
    }
}

/// Weakly Connected Components (WCC)
///
/// Ignores edge direction. Component ids are assigned in order of each
/// component's first node index, so the same view always yields the same ids.
pub fn weakly_connected_components(view: &GraphView) -> WccResult {
    let n = view.node_count;
    let mut uf = UnionFind::new(n);

    for u in 0..n {
        for &v in view.successors(u) {
            uf.union(u, v);
        }
    }

    let mut root_to_component: HashMap<usize, usize> = HashMap::new();
    let mut components: HashMap<usize, Vec<NodeId>> = HashMap::new();
    let mut node_component = HashMap::with_capacity(n);

    for i in 0..n {
        let root = uf.find(i);
        let next_id = root_to_component.len();
        let component = *root_to_component.entry(root).or_insert(next_id);
        let node_id = view.index_to_node[i];

        components.entry(component).or_default().push(node_id);
        node_component.insert(node_id, component);
    }

    WccResult {
        components,
        node_component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wcc() {
        // Edges: 1->2, 3->4->5, 6 (isolated)
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4, 5, 6],
            &[(0, 1), (2, 3), (3, 4)],
            true,
        );

        let result = weakly_connected_components(&view);

        assert_eq!(result.components.len(), 3);
        assert_eq!(result.sizes(), vec![3, 2, 1]);
        assert_eq!(result.node_component[&1], 0);
        assert_eq!(result.node_component[&2], 0);
        assert_eq!(result.node_component[&3], 1);
        assert_eq!(result.node_component[&5], 1);
        assert_eq!(result.node_component[&6], 2);
    }

    #[test]
    fn test_wcc_ignores_direction() {
        // 1 -> 2 <- 3 is one weak component
        let view = GraphView::from_edges(vec![1, 2, 3], &[(0, 1), (2, 1)], true);
        let result = weakly_connected_components(&view);
        assert_eq!(result.components.len(), 1);
    }
}
