//! Graph algorithms consumed by the relgraph enrichment stage.
//!
//! Every algorithm reads a [`GraphView`] (a dense CSR snapshot of a
//! subgraph) and returns one score per node keyed by the caller's
//! [`NodeId`]s. The view is immutable, so algorithms can run on a blocking
//! thread while the graph store keeps serving reads.

pub mod centrality;
pub mod common;
pub mod community;
pub mod pagerank;

pub use centrality::{betweenness_centrality, closeness_centrality, degree_centrality};
pub use common::{GraphView, NodeId};
pub use community::{weakly_connected_components, WccResult};
pub use pagerank::{page_rank, PageRankConfig};
