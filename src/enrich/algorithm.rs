//! Adapter between the enrichment stage and the graph-algorithm crate
//!
//! The pipeline only sees [`GraphAlgorithm`]: a named routine that consumes
//! a [`GraphView`] and returns one score per node id. [`Algorithm`] is the
//! configurable set backed by `relgraph-algorithms`.

use crate::error::{PipelineError, PipelineResult};
use relgraph_algorithms::{
    betweenness_centrality, closeness_centrality, degree_centrality, page_rank, weakly_connected_components,
    GraphView, NodeId, PageRankConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// An external routine computing a per-node scalar
pub trait GraphAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the subgraph is handed over with edge direction preserved
    fn directed(&self) -> bool;

    fn compute(&self, view: &GraphView) -> HashMap<NodeId, f64>;
}

/// Run `algorithm` on a blocking thread so the runtime keeps serving reads
pub async fn compute(algorithm: Arc<dyn GraphAlgorithm>, view: GraphView) -> PipelineResult<HashMap<NodeId, f64>> {
    let name = algorithm.name().to_string();
    tokio::task::spawn_blocking(move || algorithm.compute(&view))
        .await
        .map_err(|e| PipelineError::collaborator(name, e))
}

fn yes() -> bool {
    true
}

fn default_damping() -> f64 {
    PageRankConfig::default().damping_factor
}

fn default_iterations() -> usize {
    PageRankConfig::default().iterations
}

fn default_tolerance() -> f64 {
    PageRankConfig::default().tolerance
}

/// Algorithms offered by `relgraph-algorithms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Algorithm {
    #[serde(rename = "pagerank")]
    PageRank {
        #[serde(default = "default_damping")]
        damping_factor: f64,
        #[serde(default = "default_iterations")]
        iterations: usize,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// Weakly connected components; the score is the component id
    Wcc,
    Degree {
        #[serde(default)]
        directed: bool,
    },
    Closeness {
        #[serde(default = "yes")]
        directed: bool,
    },
    Betweenness {
        #[serde(default)]
        directed: bool,
    },
}

impl Algorithm {
    pub fn page_rank() -> Self {
        let config = PageRankConfig::default();
        Algorithm::PageRank {
            damping_factor: config.damping_factor,
            iterations: config.iterations,
            tolerance: config.tolerance,
        }
    }
}

impl GraphAlgorithm for Algorithm {
    fn name(&self) -> &str {
        match self {
            Algorithm::PageRank { .. } => "pagerank",
            Algorithm::Wcc => "wcc",
            Algorithm::Degree { .. } => "degree",
            Algorithm::Closeness { .. } => "closeness",
            Algorithm::Betweenness { .. } => "betweenness",
        }
    }

    fn directed(&self) -> bool {
        match self {
            Algorithm::PageRank { .. } => true,
            // direction is ignored anyway
            Algorithm::Wcc => false,
            Algorithm::Degree { directed } | Algorithm::Closeness { directed } | Algorithm::Betweenness { directed } => {
                *directed
            }
        }
    }

    fn compute(&self, view: &GraphView) -> HashMap<NodeId, f64> {
        match self {
            Algorithm::PageRank {
                damping_factor,
                iterations,
                tolerance,
            } => page_rank(
                view,
                &PageRankConfig {
                    damping_factor: *damping_factor,
                    iterations: *iterations,
                    tolerance: *tolerance,
                },
            ),
            Algorithm::Wcc => weakly_connected_components(view)
                .node_component
                .into_iter()
                .map(|(node, component)| (node, component as f64))
                .collect(),
            Algorithm::Degree { .. } => degree_centrality(view),
            Algorithm::Closeness { .. } => closeness_centrality(view),
            Algorithm::Betweenness { .. } => betweenness_centrality(view),
        }
    }
}
