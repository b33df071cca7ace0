//! Staged pipeline run
//!
//! A run moves strictly forward through
//! `Unschematized -> SchemaEnsured -> NodesLoaded -> EdgesLoaded ->
//! Queryable -> Enriched`. Each stage must finish before the next starts;
//! failures report the stage they happened in.

use crate::batch::RecordBatch;
use crate::config::{PipelineConfig, ProjectionConfig};
use crate::enrich::{self, EnrichmentJob, EnrichmentResult, MirrorTarget, TargetOutcome};
use crate::error::PipelineError;
use crate::loader::{self, SchemaReport};
use crate::projection::project;
use crate::query::{Params, QueryResult};
use crate::schema::{SchemaRegistry, TableSpec};
use crate::source::{columnar, delimited, read_batches, SourceOptions, TabularSource};
use crate::store::GraphStore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    Unschematized,
    SchemaEnsured,
    NodesLoaded,
    EdgesLoaded,
    Queryable,
    Enriched,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happens to existing store contents when a run starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Wipe the store, then create the schema
    #[default]
    Recreate,
    /// Keep existing tables and rows; create only what is missing
    Incremental,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{source} (stage {stage})")]
    Failed {
        stage: Stage,
        #[source]
        source: PipelineError,
    },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

impl StageError {
    /// Stage the pipeline was in when the error happened
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Failed { stage, .. } => *stage,
            StageError::InvalidTransition { from, .. } => *from,
        }
    }

    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            StageError::Failed { source, .. } => Some(source),
            StageError::InvalidTransition { .. } => None,
        }
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// Scores and per-target write outcomes of one enrichment job
#[derive(Debug)]
pub struct EnrichmentOutcome {
    pub result: EnrichmentResult,
    /// Graph store first, then mirrors
    pub targets: Vec<TargetOutcome>,
}

impl EnrichmentOutcome {
    /// Whether every target was written
    pub fn is_complete(&self) -> bool {
        self.targets.iter().all(TargetOutcome::is_ok)
    }
}

/// Everything a configured run produced
#[derive(Debug, Default)]
pub struct RunReport {
    pub schema: SchemaReport,
    /// Rows loaded per table, in load order
    pub loaded: IndexMap<String, usize>,
    pub queries: IndexMap<String, QueryResult>,
    pub enrichments: IndexMap<String, EnrichmentOutcome>,
}

/// One load run against a graph store
pub struct Pipeline {
    store: Arc<dyn GraphStore>,
    registry: SchemaRegistry,
    mirrors: Vec<MirrorTarget>,
    mode: LoadMode,
    stage: Stage,
    loaded: IndexMap<String, usize>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GraphStore>, registry: SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            mirrors: Vec::new(),
            mode: LoadMode::default(),
            stage: Stage::Unschematized,
            loaded: IndexMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mirror(mut self, mirror: MirrorTarget) -> Self {
        self.mirrors.push(mirror);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Shared store handle, for concurrent reads once the run is queryable
    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }

    /// Rows loaded so far per table
    pub fn loaded(&self) -> &IndexMap<String, usize> {
        &self.loaded
    }

    fn fail(&self, source: PipelineError) -> StageError {
        StageError::Failed {
            stage: self.stage,
            source,
        }
    }

    fn require(&self, to: Stage, allowed: impl Fn(Stage) -> bool) -> StageResult<()> {
        if allowed(self.stage) {
            Ok(())
        } else {
            Err(StageError::InvalidTransition { from: self.stage, to })
        }
    }

    fn advance(&mut self, to: Stage) {
        if to > self.stage {
            info!("Pipeline stage {} -> {}", self.stage, to);
            self.stage = to;
        }
    }

    /// Create the declared schema, wiping the store first in `Recreate` mode
    pub async fn ensure_schema(&mut self) -> StageResult<SchemaReport> {
        self.require(Stage::SchemaEnsured, |s| s == Stage::Unschematized)?;
        if self.mode == LoadMode::Recreate {
            debug!("Resetting {} before load", self.store.name());
            self.store.reset().await.map_err(|e| self.fail(e))?;
        }
        let report = loader::ensure_schema(self.store.as_ref(), &self.registry)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(Stage::SchemaEnsured);
        Ok(report)
    }

    /// Bulk-load one batch into a node or edge table
    pub async fn load_batch(&mut self, table: &str, batch: &RecordBatch) -> StageResult<usize> {
        let target = self.load_stage(table)?;
        let loaded = loader::load_batch(self.store.as_ref(), &self.registry, table, batch)
            .await
            .map_err(|e| self.fail(e))?;
        self.record_load(table, loaded, target);
        Ok(loaded)
    }

    /// Read `source` and load every batch into `table`
    pub async fn load_source(
        &mut self,
        table: &str,
        source: &TabularSource,
        options: &SourceOptions,
    ) -> StageResult<usize> {
        let target = self.load_stage(table)?;
        let loaded = loader::load_source(self.store.as_ref(), &self.registry, table, source, options)
            .await
            .map_err(|e| self.fail(e))?;
        self.record_load(table, loaded, target);
        Ok(loaded)
    }

    fn load_stage(&self, table: &str) -> StageResult<Stage> {
        let spec = self.registry.resolve(table).map_err(|e| self.fail(e))?;
        match spec {
            TableSpec::Node(_) => {
                self.require(Stage::NodesLoaded, |s| {
                    matches!(s, Stage::SchemaEnsured | Stage::NodesLoaded)
                })?;
                Ok(Stage::NodesLoaded)
            }
            TableSpec::Edge(_) => {
                self.require(Stage::EdgesLoaded, |s| {
                    (Stage::SchemaEnsured..=Stage::EdgesLoaded).contains(&s)
                })?;
                Ok(Stage::EdgesLoaded)
            }
        }
    }

    fn record_load(&mut self, table: &str, rows: usize, stage: Stage) {
        *self.loaded.entry(table.to_string()).or_default() += rows;
        self.advance(stage);
    }

    /// Close the load phase even if some tables received no rows
    pub fn finish_loading(&mut self) -> StageResult<()> {
        self.require(Stage::EdgesLoaded, |s| {
            (Stage::SchemaEnsured..=Stage::EdgesLoaded).contains(&s)
        })?;
        self.advance(Stage::EdgesLoaded);
        Ok(())
    }

    /// Run a read-only pattern query
    pub async fn query(&mut self, text: &str, params: &Params) -> StageResult<QueryResult> {
        self.require(Stage::Queryable, |s| s >= Stage::EdgesLoaded)?;
        self.advance(Stage::Queryable);
        self.store.query(text, params).await.map_err(|e| self.fail(e))
    }

    /// Score a subgraph and write the scores into the store and mirrors.
    ///
    /// Failing targets are reported in the outcome; only extraction or
    /// algorithm failures abort the stage.
    pub async fn enrich(&mut self, job: &EnrichmentJob, params: &Params) -> StageResult<EnrichmentOutcome> {
        self.require(Stage::Enriched, |s| s >= Stage::Queryable)?;
        let result = enrich::enrich(self.store.as_ref(), job, params)
            .await
            .map_err(|e| self.fail(e))?;

        let mirrors: &[MirrorTarget] = if job.mirror { &self.mirrors } else { &[] };
        let targets =
            enrich::write_back_all(self.store.as_ref(), &self.registry, mirrors, &result, &job.column).await;
        let outcome = EnrichmentOutcome { result, targets };
        if !outcome.is_complete() {
            warn!("Enrichment {} finished with failed targets", job.name);
        }
        self.advance(Stage::Enriched);
        Ok(outcome)
    }

    /// Execute a configured run from schema creation to enrichment.
    ///
    /// Node sources and node projections load before edge sources and edge
    /// projections; within each group document order is kept.
    pub async fn run(
        config: &PipelineConfig,
        store: Arc<dyn GraphStore>,
        mirrors: Vec<MirrorTarget>,
    ) -> StageResult<RunReport> {
        let registry = config.registry().map_err(|source| StageError::Failed {
            stage: Stage::Unschematized,
            source,
        })?;
        let mut pipeline = Pipeline::new(store, registry).with_mode(config.load_mode);
        for mirror in mirrors {
            pipeline = pipeline.with_mirror(mirror);
        }

        let mut report = RunReport {
            schema: pipeline.ensure_schema().await?,
            ..Default::default()
        };

        for nodes in [true, false] {
            for source in &config.sources {
                if pipeline.is_node_table(&source.table)? != nodes {
                    continue;
                }
                let options = config.options_for(&source.options);
                pipeline
                    .load_source(&source.table, &config.source(&source.path), options)
                    .await?;
            }
            for projection in &config.projections {
                if pipeline.is_node_table(&projection.target)? != nodes {
                    continue;
                }
                let batch = pipeline.project(config, projection)?;
                pipeline.load_batch(&projection.target, &batch).await?;
            }
        }
        pipeline.finish_loading()?;
        report.loaded = pipeline.loaded.clone();

        for query in &config.queries {
            let params = query.params().map_err(|e| pipeline.fail(e))?;
            let result = pipeline.query(&query.text, &params).await?;
            info!("Query {} returned {} rows", query.name, result.len());
            report.queries.insert(query.name.clone(), result);
        }

        if !config.enrichments.is_empty() {
            // enrichment reads the loaded graph
            pipeline.require(Stage::Queryable, |s| s >= Stage::EdgesLoaded)?;
            pipeline.advance(Stage::Queryable);
        }
        for job in &config.enrichments {
            let outcome = pipeline.enrich(job, &Params::new()).await?;
            report.enrichments.insert(job.name.clone(), outcome);
        }
        Ok(report)
    }

    fn is_node_table(&self, table: &str) -> StageResult<bool> {
        self.registry
            .resolve(table)
            .map(TableSpec::is_node)
            .map_err(|e| self.fail(e))
    }

    /// Read a projection's source, apply it and write the optional output file
    fn project(&self, config: &PipelineConfig, projection: &ProjectionConfig) -> StageResult<RecordBatch> {
        let run = || -> Result<RecordBatch, PipelineError> {
            let rule = projection.rule(&self.registry)?;
            let layout = projection.source_layout(&self.registry)?;
            let source = config.source(&projection.source);
            let options = config.options_for(&projection.options);
            let input = read_batches(&source, &layout, options)?.read_all()?;
            let batch = project(&rule, &input)?;

            if let Some(output) = &projection.output {
                let path = config.resolve_path(output);
                match TabularSource::from_path(&path) {
                    TabularSource::Parquet(_) => columnar::write_parquet(&path, &batch)?,
                    _ => delimited::write_csv(&path, &batch, options)?,
                };
                debug!("Projection {} written to {}", projection.name, path.display());
            }
            Ok(batch)
        };
        run().map_err(|e| self.fail(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EdgeTableSpec, NodeTableSpec};
    use crate::store::MemoryGraph;
    use crate::value::{ScalarType, Value};

    fn pipeline() -> Pipeline {
        let mut registry = SchemaRegistry::new();
        registry
            .declare_node_table(NodeTableSpec::new("City").column("city_id", ScalarType::Int64))
            .unwrap();
        registry
            .declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::Int64))
            .unwrap();
        registry
            .declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City"))
            .unwrap();
        Pipeline::new(Arc::new(MemoryGraph::new()), registry)
    }

    fn batch(p: &Pipeline, table: &str, rows: Vec<Vec<i64>>) -> RecordBatch {
        RecordBatch::from_rows(table, p.registry().batch_columns(table).unwrap(), rows).unwrap()
    }

    #[tokio::test]
    async fn test_stages_move_forward() {
        let mut p = pipeline();
        assert_eq!(p.stage(), Stage::Unschematized);

        let cities = batch(&p, "City", vec![vec![1]]);
        assert!(matches!(
            p.load_batch("City", &cities).await,
            Err(StageError::InvalidTransition {
                from: Stage::Unschematized,
                to: Stage::NodesLoaded
            })
        ));

        p.ensure_schema().await.unwrap();
        p.load_batch("City", &cities).await.unwrap();
        let merchants = batch(&p, "Merchant", vec![vec![10]]);
        p.load_batch("Merchant", &merchants).await.unwrap();
        assert_eq!(p.stage(), Stage::NodesLoaded);

        let edges = batch(&p, "LocatedIn", vec![vec![10, 1]]);
        p.load_batch("LocatedIn", &edges).await.unwrap();
        assert_eq!(p.stage(), Stage::EdgesLoaded);

        // no going back to node loads
        let late = batch(&p, "City", vec![vec![2]]);
        assert!(matches!(
            p.load_batch("City", &late).await,
            Err(StageError::InvalidTransition {
                from: Stage::EdgesLoaded,
                ..
            })
        ));

        let result = p.query("MATCH (m:Merchant) RETURN m.merchant_id", &Params::new()).await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int64(10)]]);
        assert_eq!(p.stage(), Stage::Queryable);
        assert!(p.load_batch("LocatedIn", &edges).await.is_err());
        assert!(p.ensure_schema().await.is_err());
    }

    #[tokio::test]
    async fn test_failures_carry_stage() {
        let mut p = pipeline();
        assert!(matches!(
            p.query("MATCH (n) RETURN n", &Params::new()).await,
            Err(StageError::InvalidTransition { to: Stage::Queryable, .. })
        ));

        p.ensure_schema().await.unwrap();
        let cities = batch(&p, "City", vec![vec![1], vec![1]]);
        let err = p.load_batch("City", &cities).await.unwrap_err();
        assert_eq!(err.stage(), Stage::SchemaEnsured);
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::DuplicateKey { .. })
        ));
        // a failed load does not advance
        assert_eq!(p.stage(), Stage::SchemaEnsured);
        assert!(err.to_string().contains("SchemaEnsured"));
    }

    #[tokio::test]
    async fn test_incremental_mode_keeps_rows() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryGraph::new());
        let mut first = pipeline();
        first.store = Arc::clone(&store);
        first.ensure_schema().await.unwrap();
        let cities = batch(&first, "City", vec![vec![1]]);
        first.load_batch("City", &cities).await.unwrap();

        let mut again = pipeline().with_mode(LoadMode::Incremental);
        again.store = Arc::clone(&store);
        let report = again.ensure_schema().await.unwrap();
        assert_eq!(report.existing.len(), 3);
        assert_eq!(store.count("City").await.unwrap(), 1);

        let mut fresh = pipeline();
        fresh.store = Arc::clone(&store);
        let report = fresh.ensure_schema().await.unwrap();
        assert_eq!(report.created.len(), 3);
        assert_eq!(store.count("City").await.unwrap(), 0);
    }
}
