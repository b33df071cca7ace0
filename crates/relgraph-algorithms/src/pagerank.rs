//! PageRank algorithm implementation

use super::common::{GraphView, NodeId};
use std::collections::HashMap;

/// PageRank configuration
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    /// Damping factor (usually 0.85)
    pub damping_factor: f64,
    /// Maximum number of iterations
    pub iterations: usize,
    /// Stop once the L1 change between iterations drops below this
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            iterations: 20,
            tolerance: 0.0001,
        }
    }
}

/// Calculate PageRank for the graph view
///
/// Scores start at 1.0 and use the unnormalized `(1 - d) + d * sum` update,
/// so a graph with no edges yields `1 - d` for every node.
pub fn page_rank(view: &GraphView, config: &PageRankConfig) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n == 0 {
        return HashMap::new();
    }

    let mut scores = vec![1.0; n];
    let mut next_scores = vec![0.0; n];
    let d = config.damping_factor;
    let base_score = 1.0 - d;

    for _ in 0..config.iterations {
        let mut total_diff = 0.0;

        for i in 0..n {
            let sum_incoming: f64 = view
                .predecessors(i)
                .iter()
                .map(|&source| {
                    let out_degree = view.out_degree(source);
                    if out_degree > 0 {
                        scores[source] / out_degree as f64
                    } else {
                        0.0
                    }
                })
                .sum();

            next_scores[i] = base_score + d * sum_incoming;
            total_diff += (next_scores[i] - scores[i]).abs();
        }

        std::mem::swap(&mut scores, &mut next_scores);

        if total_diff < config.tolerance {
            break;
        }
    }

    view.label_scores(scores)
}
