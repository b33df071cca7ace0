use async_trait::async_trait;
use relgraph::{
    ensure_schema, load_batch, project, write_back, write_back_all, Algorithm, EdgeTableSpec, EnrichmentJob,
    EnrichmentResult, GraphStore, Key, LoadMode, MemoryGraph, MemoryMirror, MirrorTarget, NodeKey, NodeTableSpec, Params,
    Pipeline, PipelineError, PipelineResult, ProjectionRule, RecordBatch, RelationalMirror, RowSet, ScalarType,
    SchemaRegistry, Stage, StageError, TypedColumn, Value,
};
use std::sync::Arc;

fn merchant_city_schema() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .declare_node_table(
            NodeTableSpec::new("City")
                .column("city_id", ScalarType::Int64)
                .column("city", ScalarType::String),
        )
        .unwrap();
    registry
        .declare_node_table(
            NodeTableSpec::new("Merchant")
                .column("merchant_id", ScalarType::Int64)
                .column("city_id", ScalarType::Int64),
        )
        .unwrap();
    registry
        .declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City"))
        .unwrap();
    registry
}

fn cities(registry: &SchemaRegistry) -> RecordBatch {
    RecordBatch::from_rows(
        "City",
        registry.batch_columns("City").unwrap(),
        vec![
            vec![Value::from(1), Value::from("Boston")],
            vec![Value::from(2), Value::from("New York City")],
        ],
    )
    .unwrap()
}

fn merchants(registry: &SchemaRegistry) -> RecordBatch {
    RecordBatch::from_rows(
        "Merchant",
        registry.batch_columns("Merchant").unwrap(),
        vec![
            vec![Value::from(10), Value::from(1)],
            vec![Value::from(11), Value::from(2)],
            vec![Value::from(12), Value::from(1)],
        ],
    )
    .unwrap()
}

fn located_in(registry: &SchemaRegistry, merchants: &RecordBatch) -> RecordBatch {
    let rule = ProjectionRule::for_table("located_in", registry, "LocatedIn")
        .unwrap()
        .map("merchant_id", "from")
        .map("city_id", "to");
    project(&rule, merchants).unwrap()
}

/// Pipeline with both node tables and the projected edges loaded
async fn loaded_pipeline() -> Pipeline {
    let registry = merchant_city_schema();
    let mut pipeline = Pipeline::new(Arc::new(MemoryGraph::new()), registry.clone());
    pipeline.ensure_schema().await.unwrap();
    pipeline.load_batch("City", &cities(&registry)).await.unwrap();
    let merchants = merchants(&registry);
    pipeline.load_batch("Merchant", &merchants).await.unwrap();
    pipeline
        .load_batch("LocatedIn", &located_in(&registry, &merchants))
        .await
        .unwrap();
    pipeline
}

fn degree_job() -> EnrichmentJob {
    EnrichmentJob {
        name: "merchant_degree".to_string(),
        pattern: "MATCH (m:Merchant)-[:LocatedIn]->(c:City) RETURN *".to_string(),
        algorithm: Algorithm::Degree { directed: false },
        column: "degree".to_string(),
        table: Some("Merchant".to_string()),
        mirror: true,
    }
}

#[tokio::test]
async fn test_end_to_end_merchants_in_boston() {
    let mut pipeline = loaded_pipeline().await;
    assert_eq!(pipeline.stage(), Stage::EdgesLoaded);
    assert_eq!(pipeline.loaded().get("LocatedIn"), Some(&3));

    let result = pipeline
        .query(
            "MATCH (m:Merchant)-[:LocatedIn]->(c:City) WHERE c.city = 'Boston' RETURN m.merchant_id ORDER BY m.merchant_id",
            &Params::new(),
        )
        .await
        .unwrap();

    assert_eq!(pipeline.stage(), Stage::Queryable);
    assert_eq!(result.rows, vec![vec![Value::from(10)], vec![Value::from(12)]]);
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let registry = merchant_city_schema();
    let store = MemoryGraph::new();

    let first = ensure_schema(&store, &registry).await.unwrap();
    assert_eq!(first.created, vec!["City", "Merchant", "LocatedIn"]);
    assert!(first.existing.is_empty());

    load_batch(&store, &registry, "City", &cities(&registry)).await.unwrap();

    let second = ensure_schema(&store, &registry).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.existing.len(), 3);
    // Existing rows survive a second schema pass
    assert_eq!(store.count("City").await.unwrap(), 2);
}

#[test]
fn test_projection_drops_null_foreign_keys() {
    let mut registry = SchemaRegistry::new();
    registry
        .declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::String))
        .unwrap();
    registry
        .declare_node_table(NodeTableSpec::new("Company").column("company_id", ScalarType::String))
        .unwrap();
    registry
        .declare_edge_table(EdgeTableSpec::new("BelongsTo", "Merchant", "Company"))
        .unwrap();

    let wide = RecordBatch::from_rows(
        "merchants",
        vec![
            TypedColumn::new("merchant_id", ScalarType::String),
            TypedColumn::new("company_id", ScalarType::String),
            TypedColumn::new("city", ScalarType::String),
        ],
        vec![
            vec![Value::from("M1"), Value::from("C1"), Value::from("Boston")],
            vec![Value::from("M2"), Value::Null, Value::from("NYC")],
        ],
    )
    .unwrap();

    let rule = ProjectionRule::for_table("belongs_to", &registry, "BelongsTo")
        .unwrap()
        .map("merchant_id", "from")
        .map("company_id", "to");
    let edges = project(&rule, &wide).unwrap();

    assert_eq!(edges.table(), "BelongsTo");
    assert_eq!(edges.column_names(), vec!["from", "to"]);
    assert_eq!(edges.rows(), &[vec![Value::from("M1"), Value::from("C1")]]);
    // Source batch is untouched
    assert_eq!(wide.len(), 2);
}

#[tokio::test]
async fn test_dangling_edge_leaves_table_unchanged() {
    let registry = merchant_city_schema();
    let store = MemoryGraph::new();
    ensure_schema(&store, &registry).await.unwrap();
    load_batch(&store, &registry, "City", &cities(&registry)).await.unwrap();
    let merchants = merchants(&registry);
    load_batch(&store, &registry, "Merchant", &merchants).await.unwrap();
    load_batch(&store, &registry, "LocatedIn", &located_in(&registry, &merchants))
        .await
        .unwrap();

    let dangling = RecordBatch::from_rows(
        "LocatedIn",
        registry.batch_columns("LocatedIn").unwrap(),
        vec![
            vec![Value::from(11), Value::from(1)],
            vec![Value::from(99), Value::from(1)],
        ],
    )
    .unwrap();
    let err = load_batch(&store, &registry, "LocatedIn", &dangling)
        .await
        .unwrap_err();

    match err {
        PipelineError::DanglingEdgeEndpoint { table, row, side, .. } => {
            assert_eq!(table, "LocatedIn");
            assert_eq!(row, 1);
            assert_eq!(side, "from");
        }
        other => panic!("expected DanglingEdgeEndpoint, got {:?}", other),
    }
    assert_eq!(store.count("LocatedIn").await.unwrap(), 3);
}

#[tokio::test]
async fn test_duplicate_key_rejects_whole_batch() {
    let registry = merchant_city_schema();
    let mut pipeline = Pipeline::new(Arc::new(MemoryGraph::new()), registry.clone());
    pipeline.ensure_schema().await.unwrap();

    let batch = RecordBatch::from_rows(
        "City",
        registry.batch_columns("City").unwrap(),
        vec![
            vec![Value::from(1), Value::from("Boston")],
            vec![Value::from(1), Value::from("Cambridge")],
        ],
    )
    .unwrap();
    let err = pipeline.load_batch("City", &batch).await.unwrap_err();

    assert_eq!(err.stage(), Stage::SchemaEnsured);
    assert!(matches!(
        err.pipeline_error(),
        Some(PipelineError::DuplicateKey { row: 1, .. })
    ));
    assert_eq!(pipeline.store().count("City").await.unwrap(), 0);
}

#[tokio::test]
async fn test_round_trip_is_independent_of_node_load_order() {
    let registry = merchant_city_schema();
    let merchants_batch = merchants(&registry);
    let edges = located_in(&registry, &merchants_batch);
    let text = "MATCH (m:Merchant)-[:LocatedIn]->(c:City) RETURN m.merchant_id, m.city_id, c.city ORDER BY m.merchant_id";

    let mut results = Vec::new();
    for cities_first in [true, false] {
        let mut pipeline = Pipeline::new(Arc::new(MemoryGraph::new()), registry.clone());
        pipeline.ensure_schema().await.unwrap();
        if cities_first {
            pipeline.load_batch("City", &cities(&registry)).await.unwrap();
            pipeline.load_batch("Merchant", &merchants_batch).await.unwrap();
        } else {
            pipeline.load_batch("Merchant", &merchants_batch).await.unwrap();
            pipeline.load_batch("City", &cities(&registry)).await.unwrap();
        }
        pipeline.load_batch("LocatedIn", &edges).await.unwrap();
        results.push(pipeline.query(text, &Params::new()).await.unwrap());
    }

    assert_eq!(results[0].rows, results[1].rows);
    assert_eq!(
        results[0].rows[1],
        vec![Value::from(11), Value::from(2), Value::from("New York City")]
    );

    // Every loaded node reads back with the values it was loaded with
    let mut pipeline = loaded_pipeline().await;
    let nodes = pipeline
        .query(
            "MATCH (m:Merchant) RETURN m.merchant_id, m.city_id ORDER BY m.merchant_id",
            &Params::new(),
        )
        .await
        .unwrap();
    assert_eq!(nodes.rows, merchants_batch.rows());
}

#[tokio::test]
async fn test_write_back_is_idempotent() {
    let mut pipeline = loaded_pipeline().await;
    pipeline.query("MATCH (m:Merchant) RETURN m", &Params::new()).await.unwrap();

    let first = pipeline.enrich(&degree_job(), &Params::new()).await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Enriched);
    assert_eq!(first.result.len(), 3);
    assert_eq!(first.targets.len(), 1);
    assert_eq!(first.targets[0].outcome.as_ref().unwrap().written, 3);

    let text = "MATCH (m:Merchant) RETURN m.merchant_id, m.degree ORDER BY m.merchant_id";
    let before = pipeline.query(text, &Params::new()).await.unwrap();
    assert_eq!(before.value(0, "m.degree"), Some(&Value::from(0.25)));

    // A second write of the same result changes nothing
    let store = pipeline.store();
    let again = write_back(store.as_ref(), &first.result, "degree").await.unwrap();
    assert_eq!(again.written, 3);
    assert_eq!(again.orphaned, 0);

    let after = pipeline.query(text, &Params::new()).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(store.count("Merchant").await.unwrap(), 3);
}

#[tokio::test]
async fn test_stage_transitions() {
    let registry = merchant_city_schema();
    let mut pipeline = Pipeline::new(Arc::new(MemoryGraph::new()), registry.clone());

    // Nothing loads before the schema exists
    let err = pipeline.load_batch("City", &cities(&registry)).await.unwrap_err();
    assert!(matches!(
        err,
        StageError::InvalidTransition {
            from: Stage::Unschematized,
            to: Stage::NodesLoaded
        }
    ));

    pipeline.ensure_schema().await.unwrap();
    assert!(pipeline.ensure_schema().await.is_err());

    let err = pipeline.query("MATCH (c:City) RETURN c", &Params::new()).await.unwrap_err();
    assert!(matches!(err, StageError::InvalidTransition { from: Stage::SchemaEnsured, .. }));

    pipeline.load_batch("City", &cities(&registry)).await.unwrap();
    assert_eq!(pipeline.stage(), Stage::NodesLoaded);
    pipeline.finish_loading().unwrap();
    assert_eq!(pipeline.stage(), Stage::EdgesLoaded);

    // Node tables are closed once edges may load
    let err = pipeline.load_batch("Merchant", &merchants(&registry)).await.unwrap_err();
    assert!(matches!(
        err,
        StageError::InvalidTransition {
            from: Stage::EdgesLoaded,
            to: Stage::NodesLoaded
        }
    ));

    let err = pipeline.enrich(&degree_job(), &Params::new()).await.unwrap_err();
    assert!(matches!(err, StageError::InvalidTransition { to: Stage::Enriched, .. }));

    pipeline.query("MATCH (c:City) RETURN c", &Params::new()).await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Queryable);
}

#[tokio::test]
async fn test_incremental_mode_keeps_existing_rows() {
    let registry = merchant_city_schema();
    let store: Arc<dyn GraphStore> = Arc::new(MemoryGraph::new());

    let mut first = Pipeline::new(store.clone(), registry.clone());
    first.ensure_schema().await.unwrap();
    first.load_batch("City", &cities(&registry)).await.unwrap();

    let mut incremental = Pipeline::new(store.clone(), registry.clone()).with_mode(LoadMode::Incremental);
    let report = incremental.ensure_schema().await.unwrap();
    assert_eq!(report.existing.len(), 3);
    assert_eq!(store.count("City").await.unwrap(), 2);

    let mut recreate = Pipeline::new(store.clone(), registry);
    let report = recreate.ensure_schema().await.unwrap();
    assert_eq!(report.created.len(), 3);
    assert_eq!(store.count("City").await.unwrap(), 0);
}

/// Mirror whose writes always fail
struct FailingMirror;

#[async_trait]
impl RelationalMirror for FailingMirror {
    fn name(&self) -> &str {
        "replica"
    }

    async fn add_column_if_absent(&self, _table: &str, _column: &TypedColumn) -> PipelineResult<bool> {
        Ok(true)
    }

    async fn update_keyed(
        &self,
        _table: &str,
        _key_column: &str,
        _column: &str,
        _values: &[(Key, Value)],
    ) -> PipelineResult<usize> {
        Err(PipelineError::collaborator("replica", "connection reset"))
    }

    async fn scan(&self, table: &str) -> PipelineResult<RowSet> {
        Err(PipelineError::collaborator("replica", format!("no relation {}", table)))
    }
}

#[tokio::test]
async fn test_failing_mirror_does_not_block_other_targets() {
    let registry = merchant_city_schema();
    let store = MemoryGraph::new();
    ensure_schema(&store, &registry).await.unwrap();
    load_batch(&store, &registry, "Merchant", &merchants(&registry)).await.unwrap();

    let postgres = MemoryMirror::new("postgres");
    let mut rows = RowSet::new(vec!["merchant_id".to_string(), "city_id".to_string()]);
    rows.rows = merchants(&registry).into_rows();
    postgres.insert_table("merchant", rows).await;

    let mirrors = vec![
        MirrorTarget::new(Arc::new(postgres.clone())).relation("Merchant", "merchant"),
        MirrorTarget::new(Arc::new(FailingMirror)),
    ];

    let mut result = EnrichmentResult::new("pagerank");
    for (id, score) in [(10i64, 0.5), (11, 0.2), (12, 0.3)] {
        result.insert(NodeKey::new("Merchant", id), score);
    }

    let outcomes = write_back_all(&store, &registry, &mirrors, &result, "rank").await;
    let targets: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(targets, vec!["memory", "postgres", "replica"]);

    assert_eq!(outcomes[0].outcome.as_ref().unwrap().written, 3);
    assert_eq!(outcomes[1].outcome.as_ref().unwrap().written, 3);
    assert!(matches!(
        outcomes[2].outcome,
        Err(PipelineError::Collaborator { .. })
    ));

    let mirrored = postgres.scan("merchant").await.unwrap();
    assert_eq!(mirrored.columns.last().map(String::as_str), Some("rank"));
    assert_eq!(mirrored.rows[0].last(), Some(&Value::from(0.5)));

    let graph = store
        .query("MATCH (m:Merchant) WHERE m.rank > 0.25 RETURN m.merchant_id ORDER BY m.merchant_id", &Params::new())
        .await
        .unwrap();
    assert_eq!(graph.rows, vec![vec![Value::from(10)], vec![Value::from(12)]]);
}
