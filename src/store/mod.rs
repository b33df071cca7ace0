//! Graph store collaborator interface
//!
//! The pipeline talks to a graph store only through [`GraphStore`]. The
//! in-memory [`MemoryGraph`] implements it for tests, demos and the CLI.

pub mod memory;

use crate::batch::RecordBatch;
use crate::error::PipelineResult;
use crate::query::{Params, QueryResult};
use crate::schema::{EdgeTableSpec, NodeTableSpec, TableSpec, TypedColumn};
use crate::value::{Key, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::MemoryGraph;

/// A node identified by table and primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub table: String,
    pub key: Key,
}

impl NodeKey {
    pub fn new(table: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.key)
    }
}

/// A matched edge with its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub table: String,
    pub from: NodeKey,
    pub to: NodeKey,
}

/// Outcome of a keyed property write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyWriteReport {
    pub written: usize,
    /// Keys with no matching node or edge; nothing was written for them
    pub missing: Vec<Key>,
}

/// Storage and query surface of a graph database.
///
/// Implementations must apply each `insert_*` call atomically: a failing
/// batch leaves the table unchanged.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short name used in logs and collaborator errors
    fn name(&self) -> &str;

    /// Drop every table and row
    async fn reset(&self) -> PipelineResult<()>;

    /// Create the table if absent. Returns `false` when an identical table
    /// already exists; a differing one is a `SchemaConflict`.
    async fn create_node_table(&self, spec: &NodeTableSpec) -> PipelineResult<bool>;

    /// Create the table if absent; both endpoint tables must exist.
    async fn create_edge_table(&self, spec: &EdgeTableSpec) -> PipelineResult<bool>;

    /// Current schema, in creation order
    async fn tables(&self) -> PipelineResult<Vec<TableSpec>>;

    /// Bulk insert into a node table; duplicate keys fail with `DuplicateKey`
    async fn insert_nodes(&self, batch: &RecordBatch) -> PipelineResult<usize>;

    /// Bulk insert into an edge table; unknown endpoints fail with
    /// `DanglingEdgeEndpoint`
    async fn insert_edges(&self, batch: &RecordBatch) -> PipelineResult<usize>;

    /// Number of rows in a node or edge table
    async fn count(&self, table: &str) -> PipelineResult<usize>;

    /// Run a read-only pattern query
    async fn query(&self, text: &str, params: &Params) -> PipelineResult<QueryResult>;

    /// Add a column to a node table if absent, filling existing nodes with
    /// the column default
    async fn add_node_column(&self, table: &str, column: &TypedColumn) -> PipelineResult<bool>;

    /// Overwrite one property for the keyed nodes that exist
    async fn set_node_property(
        &self,
        table: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport>;

    /// Overwrite one property on the edges whose `key_property` matches a
    /// given key. Every matching edge is updated; keys matching no edge are
    /// reported as missing.
    async fn set_edge_property(
        &self,
        table: &str,
        key_property: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport>;
}
