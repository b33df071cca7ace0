//! Enrichment round-trip
//!
//! A pattern query selects a subgraph, an external algorithm scores its
//! nodes, and the scores are written back as a node column in the graph
//! store and, optionally, in relational mirrors. Writes to independent
//! targets run concurrently; each target reports its own outcome.

pub mod algorithm;
pub mod subgraph;

use crate::error::PipelineResult;
use crate::mirror::RelationalMirror;
use crate::query::Params;
use crate::schema::{SchemaRegistry, TableSpec, TypedColumn};
use crate::store::{GraphStore, NodeKey};
use crate::value::{Key, ScalarType, Value};
use futures::future::join_all;
use indexmap::IndexMap;
use relgraph_algorithms::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub use algorithm::{Algorithm, GraphAlgorithm};
pub use subgraph::{extract_subgraph, SubgraphView};

/// Per-node scores produced by one algorithm run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResult {
    pub algorithm: String,
    pub scores: IndexMap<NodeKey, f64>,
}

impl EnrichmentResult {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            scores: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, node: NodeKey, score: f64) {
        self.scores.insert(node, score);
    }

    /// Keep only the scores of nodes in `table`
    pub fn retain_table(&mut self, table: &str) {
        self.scores.retain(|node, _| node.table == table);
    }

    pub fn get(&self, node: &NodeKey) -> Option<f64> {
        self.scores.get(node).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Scores grouped by node table, as `(key, value)` write pairs
    fn by_table(&self) -> IndexMap<&str, Vec<(Key, Value)>> {
        let mut grouped: IndexMap<&str, Vec<(Key, Value)>> = IndexMap::new();
        for (node, score) in &self.scores {
            grouped
                .entry(node.table.as_str())
                .or_default()
                .push((node.key.clone(), Value::Float64(*score)));
        }
        grouped
    }
}

/// Score every node of `subgraph`, in subgraph order
pub async fn run_algorithm(
    algorithm: Arc<dyn GraphAlgorithm>,
    subgraph: &SubgraphView,
) -> PipelineResult<EnrichmentResult> {
    let view = subgraph.to_graph_view(algorithm.directed());
    let mut result = EnrichmentResult::new(algorithm.name());
    let scores = algorithm::compute(algorithm, view).await?;

    for (idx, node) in subgraph.nodes.iter().enumerate() {
        if let Some(score) = scores.get(&(idx as NodeId)) {
            result.insert(node.clone(), *score);
        }
    }
    info!(
        "{} scored {} of {} nodes",
        result.algorithm,
        result.len(),
        subgraph.node_count()
    );
    Ok(result)
}

/// Outcome of writing one result into one target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteBackReport {
    pub written: usize,
    pub orphaned: usize,
    /// Orphaned nodes, when the target can name them
    pub orphans: Vec<NodeKey>,
}

impl WriteBackReport {
    fn orphan_all(&mut self, table: &str, values: &[(Key, Value)]) {
        self.orphaned += values.len();
        self.orphans
            .extend(values.iter().map(|(key, _)| NodeKey::new(table, key.clone())));
    }
}

/// Column definition used for score write-back
pub fn score_column(name: &str) -> TypedColumn {
    TypedColumn::new(name, ScalarType::Float64).with_default(0.0)
}

/// Write every score into `column` of its node table, adding the column
/// first when absent.
///
/// Scores for nodes (or whole tables) the store does not hold are counted
/// as orphans and skipped. Re-running with the same result overwrites the
/// same values and reports the same counts.
pub async fn write_back(
    store: &dyn GraphStore,
    result: &EnrichmentResult,
    column: &str,
) -> PipelineResult<WriteBackReport> {
    let node_tables: Vec<String> = store
        .tables()
        .await?
        .into_iter()
        .filter(TableSpec::is_node)
        .map(|t| t.name().to_string())
        .collect();
    let definition = score_column(column);
    let mut report = WriteBackReport::default();

    for (table, values) in result.by_table() {
        if !node_tables.iter().any(|t| t == table) {
            report.orphan_all(table, &values);
            continue;
        }
        store.add_node_column(table, &definition).await?;
        let written = store.set_node_property(table, column, &values).await?;
        report.written += written.written;
        report.orphaned += written.missing.len();
        report
            .orphans
            .extend(written.missing.into_iter().map(|key| NodeKey::new(table, key)));
    }

    if report.orphaned > 0 {
        warn!(
            "{}: {} {} scores had no matching node",
            store.name(),
            report.orphaned,
            result.algorithm
        );
    }
    info!(
        "{}: wrote {} {} scores into column {}",
        store.name(),
        report.written,
        result.algorithm,
        column
    );
    Ok(report)
}

/// A relational mirror receiving enrichment scores
#[derive(Clone)]
pub struct MirrorTarget {
    pub mirror: Arc<dyn RelationalMirror>,
    /// Node table to relation name; unmapped tables use their own name
    pub relations: IndexMap<String, String>,
}

impl MirrorTarget {
    pub fn new(mirror: Arc<dyn RelationalMirror>) -> Self {
        Self {
            mirror,
            relations: IndexMap::new(),
        }
    }

    pub fn relation(mut self, node_table: impl Into<String>, relation: impl Into<String>) -> Self {
        self.relations.insert(node_table.into(), relation.into());
        self
    }

    pub fn relation_for<'a>(&'a self, node_table: &'a str) -> &'a str {
        self.relations.get(node_table).map(String::as_str).unwrap_or(node_table)
    }
}

/// Mirror the scores into `target`, keyed by each node table's primary key.
///
/// The mirror only reports how many rows it updated, so orphans are counted
/// but not named. Scores of tables the registry does not declare are orphans.
pub async fn mirror_write_back(
    target: &MirrorTarget,
    registry: &SchemaRegistry,
    result: &EnrichmentResult,
    column: &str,
) -> PipelineResult<WriteBackReport> {
    let mirror = target.mirror.as_ref();
    let definition = score_column(column);
    let mut report = WriteBackReport::default();

    for (table, values) in result.by_table() {
        let Ok(spec) = registry.node_table(table) else {
            report.orphan_all(table, &values);
            continue;
        };
        let relation = target.relation_for(table);
        mirror.add_column_if_absent(relation, &definition).await?;
        let updated = mirror
            .update_keyed(relation, &spec.primary_key, column, &values)
            .await?;
        report.written += updated;
        report.orphaned += values.len().saturating_sub(updated);
    }

    info!(
        "{}: mirrored {} {} scores into column {}",
        mirror.name(),
        report.written,
        result.algorithm,
        column
    );
    Ok(report)
}

/// Result of one write-back target
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub outcome: PipelineResult<WriteBackReport>,
}

impl TargetOutcome {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Write `result` into the graph store and every mirror concurrently.
///
/// Waits for all writes to finish. The graph store's outcome comes first,
/// followed by the mirrors in order; one target failing does not affect
/// the others.
pub async fn write_back_all(
    store: &dyn GraphStore,
    registry: &SchemaRegistry,
    mirrors: &[MirrorTarget],
    result: &EnrichmentResult,
    column: &str,
) -> Vec<TargetOutcome> {
    let graph_write = write_back(store, result, column);
    let mirror_writes = join_all(
        mirrors
            .iter()
            .map(|target| mirror_write_back(target, registry, result, column)),
    );
    let (graph, mirrored) = futures::join!(graph_write, mirror_writes);

    let mut outcomes = Vec::with_capacity(mirrors.len() + 1);
    outcomes.push(TargetOutcome {
        target: store.name().to_string(),
        outcome: graph,
    });
    for (target, outcome) in mirrors.iter().zip(mirrored) {
        outcomes.push(TargetOutcome {
            target: target.mirror.name().to_string(),
            outcome,
        });
    }
    for failed in outcomes.iter().filter(|o| !o.is_ok()) {
        if let Err(e) = &failed.outcome {
            warn!("Write-back to {} failed: {}", failed.target, e);
        }
    }
    outcomes
}

/// One configured enrichment pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub name: String,
    /// Pattern query selecting the subgraph
    pub pattern: String,
    pub algorithm: Algorithm,
    /// Node column receiving the score
    pub column: String,
    /// Only write back scores of this node table
    #[serde(default)]
    pub table: Option<String>,
    /// Also write into the configured relational mirrors
    #[serde(default)]
    pub mirror: bool,
}

/// Extract, score and filter; does not write anything
pub async fn enrich(store: &dyn GraphStore, job: &EnrichmentJob, params: &Params) -> PipelineResult<EnrichmentResult> {
    let subgraph = extract_subgraph(store, &job.pattern, params).await?;
    let mut result = run_algorithm(Arc::new(job.algorithm.clone()), &subgraph).await?;
    if let Some(table) = &job.table {
        result.retain_table(table);
    }
    Ok(result)
}
