//! Shared utilities for graph algorithms
//!
//! Provides a read-only, optimized view of the graph topology for algorithm execution.

use std::collections::HashMap;

/// Node Identifier type (u64)
pub type NodeId = u64;

/// A dense, integer-indexed view of the graph topology using Compressed Sparse Row (CSR) format.
///
/// Undirected views store every edge in both directions, so `successors`
/// and `predecessors` return the same neighbourhood.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,
    /// Whether edges were loaded with their direction preserved
    pub directed: bool,

    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Contiguous array of target node indices
    pub out_targets: Vec<usize>,

    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Contiguous array of source node indices
    pub in_sources: Vec<usize>,
}

impl GraphView {
    /// Build a view from node ids and `(source_index, target_index)` pairs.
    ///
    /// Edge endpoints are dense indexes into `nodes`. Pairs pointing outside
    /// the node list are skipped. Self loops are kept; parallel edges are
    /// kept as well, matching a multigraph export.
    pub fn from_edges(nodes: Vec<NodeId>, edges: &[(usize, usize)], directed: bool) -> Self {
        let node_count = nodes.len();
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); node_count];

        for &(u, v) in edges {
            if u >= node_count || v >= node_count {
                continue;
            }
            outgoing[u].push(v);
            incoming[v].push(u);
            if !directed && u != v {
                outgoing[v].push(u);
                incoming[u].push(v);
            }
        }

        let node_to_index = nodes
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();

        Self::from_adjacency_list(nodes, node_to_index, outgoing, incoming, directed)
    }

    /// Flatten adjacency lists into CSR arrays
    pub fn from_adjacency_list(
        index_to_node: Vec<NodeId>,
        node_to_index: HashMap<NodeId, usize>,
        outgoing: Vec<Vec<usize>>,
        incoming: Vec<Vec<usize>>,
        directed: bool,
    ) -> Self {
        let node_count = index_to_node.len();
        let (out_offsets, out_targets) = flatten(outgoing);
        let (in_offsets, in_sources) = flatten(incoming);

        GraphView {
            node_count,
            index_to_node,
            node_to_index,
            directed,
            out_offsets,
            out_targets,
            in_offsets,
            in_sources,
        }
    }

    /// Number of stored edges (undirected edges count twice)
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Get the out-degree of a node (by index)
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get the in-degree of a node (by index)
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Get outgoing neighbors (successors) of a node
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.out_targets[self.out_offsets[idx]..self.out_offsets[idx + 1]]
    }

    /// Get incoming neighbors (predecessors) of a node
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.in_sources[self.in_offsets[idx]..self.in_offsets[idx + 1]]
    }

    /// Pair every dense-index score with its NodeId
    pub(crate) fn label_scores(&self, scores: Vec<f64>) -> HashMap<NodeId, f64> {
        scores
            .into_iter()
            .enumerate()
            .map(|(idx, score)| (self.index_to_node[idx], score))
            .collect()
    }
}

fn flatten(lists: Vec<Vec<usize>>) -> (Vec<usize>, Vec<usize>) {
    let mut offsets = Vec::with_capacity(lists.len() + 1);
    let mut flat = Vec::with_capacity(lists.iter().map(Vec::len).sum());
    offsets.push(0);
    for list in lists {
        flat.extend(list);
        offsets.push(flat.len());
    }
    (offsets, flat)
}
