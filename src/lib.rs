//! Relgraph
//!
//! A relational-to-graph ingestion and enrichment pipeline: typed node and
//! edge schemas, tabular sources (delimited text, Parquet, relational scans),
//! declarative edge projections, idempotent schema creation with atomic bulk
//! loads, Cypher-subset pattern queries, and graph-algorithm scores written
//! back into the graph store and relational mirrors.
//!
//! # Stages
//!
//! A run moves strictly forward:
//!
//! - `Unschematized`: tables declared in a [`SchemaRegistry`]
//! - `SchemaEnsured`: tables created in the [`GraphStore`]
//! - `NodesLoaded` / `EdgesLoaded`: batches bulk-loaded, node tables first
//! - `Queryable`: read-only pattern queries
//! - `Enriched`: algorithm scores written back
//!
//! ## Example Usage
//!
//! ```rust
//! use relgraph::{MemoryGraph, NodeTableSpec, EdgeTableSpec, Pipeline, RecordBatch, ScalarType, SchemaRegistry, Value};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let mut registry = SchemaRegistry::new();
//! registry.declare_node_table(NodeTableSpec::new("City").column("city_id", ScalarType::Int64)).unwrap();
//! registry.declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::Int64)).unwrap();
//! registry.declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City")).unwrap();
//!
//! let mut pipeline = Pipeline::new(Arc::new(MemoryGraph::new()), registry);
//! pipeline.ensure_schema().await.unwrap();
//!
//! let cities = RecordBatch::from_rows("City", pipeline.registry().batch_columns("City").unwrap(), vec![vec![1i64]]).unwrap();
//! pipeline.load_batch("City", &cities).await.unwrap();
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod mirror;
pub mod pipeline;
pub mod projection;
pub mod query;
pub mod schema;
pub mod source;
pub mod store;
pub mod value;

// Re-export main types for convenience
pub use batch::RecordBatch;

pub use config::PipelineConfig;

pub use enrich::{
    extract_subgraph, write_back, write_back_all, Algorithm, EnrichmentJob, EnrichmentResult,
    GraphAlgorithm, MirrorTarget, SubgraphView, TargetOutcome, WriteBackReport,
};

pub use error::{PipelineError, PipelineResult};

pub use loader::{ensure_schema, load_batch, load_source, SchemaReport};

pub use mirror::{scan_source, MemoryMirror, RelationalMirror};

pub use pipeline::{LoadMode, Pipeline, RunReport, Stage, StageError, StageResult};

pub use projection::{project, ProjectionRule};

pub use query::{parse_query, Params, Query, QueryResult};

pub use schema::{EdgeTableSpec, NodeTableSpec, SchemaRegistry, TableSpec, TypedColumn};

pub use source::{read_batches, RowSet, SourceOptions, TabularSource};

pub use store::{EdgeKey, GraphStore, MemoryGraph, NodeKey};

pub use value::{Key, ScalarType, Value};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
