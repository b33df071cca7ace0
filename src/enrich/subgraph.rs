//! Subgraph extraction for algorithm input

use crate::error::PipelineResult;
use crate::query::{Params, QueryResult};
use crate::store::{GraphStore, NodeKey};
use indexmap::IndexSet;
use relgraph_algorithms::{GraphView, NodeId};
use tracing::debug;

/// Nodes and edges matched by a pattern query.
///
/// Nodes are numbered densely in first-seen order; that position is the
/// [`NodeId`] handed to algorithms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubgraphView {
    pub nodes: Vec<NodeKey>,
    /// Edges as positions into `nodes`
    pub edges: Vec<(usize, usize)>,
}

impl SubgraphView {
    pub fn from_result(result: &QueryResult) -> Self {
        let mut nodes: IndexSet<NodeKey> = result.nodes.iter().cloned().collect();
        let mut edges = Vec::with_capacity(result.edges.len());
        for edge in &result.edges {
            // intermediate nodes of variable-length walks are not bound
            let (from, _) = nodes.insert_full(edge.from.clone());
            let (to, _) = nodes.insert_full(edge.to.clone());
            edges.push((from, to));
        }
        Self {
            nodes: nodes.into_iter().collect(),
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// CSR snapshot for an algorithm run
    pub fn to_graph_view(&self, directed: bool) -> GraphView {
        let ids = (0..self.nodes.len() as NodeId).collect();
        GraphView::from_edges(ids, &self.edges, directed)
    }

    pub fn node_key(&self, id: NodeId) -> Option<&NodeKey> {
        usize::try_from(id).ok().and_then(|idx| self.nodes.get(idx))
    }
}

/// Run a read-only pattern query and keep the nodes and edges it matched
pub async fn extract_subgraph(store: &dyn GraphStore, pattern: &str, params: &Params) -> PipelineResult<SubgraphView> {
    let result = store.query(pattern, params).await?;
    let view = SubgraphView::from_result(&result);
    debug!(
        "Extracted subgraph with {} nodes and {} edges",
        view.node_count(),
        view.edge_count()
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EdgeKey;

    #[test]
    fn test_from_result_numbers_nodes() {
        let a = NodeKey::new("Account", 1i64);
        let b = NodeKey::new("Account", 2i64);
        let c = NodeKey::new("Account", 3i64);
        let result = QueryResult {
            nodes: vec![a.clone(), b.clone()],
            edges: vec![
                EdgeKey {
                    table: "Transfer".to_string(),
                    from: a.clone(),
                    to: b.clone(),
                },
                EdgeKey {
                    table: "Transfer".to_string(),
                    from: b.clone(),
                    to: c.clone(),
                },
            ],
            ..Default::default()
        };
        let view = SubgraphView::from_result(&result);
        assert_eq!(view.nodes, vec![a, b, c.clone()]);
        assert_eq!(view.edges, vec![(0, 1), (1, 2)]);
        assert_eq!(view.node_key(2), Some(&c));
        assert_eq!(view.node_key(3), None);

        let graph = view.to_graph_view(true);
        assert_eq!(graph.edge_count(), 2);
    }
}
