use relgraph::source::BatchLayout;
use relgraph::{
    read_batches, GraphStore, MemoryGraph, Params, Pipeline, PipelineConfig, RunReport, TabularSource, Value,
};
use std::path::PathBuf;
use std::sync::Arc;

fn demo_config() -> PipelineConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/transactions/pipeline.yaml");
    PipelineConfig::from_file(path).unwrap()
}

async fn run_demo() -> (Arc<MemoryGraph>, RunReport) {
    let store = Arc::new(MemoryGraph::new());
    let report = Pipeline::run(&demo_config(), store.clone(), Vec::new()).await.unwrap();
    (store, report)
}

fn ints(values: Option<Vec<&Value>>) -> Vec<i64> {
    values.unwrap().into_iter().filter_map(Value::as_int).collect()
}

#[tokio::test]
async fn test_demo_loads_every_table() {
    let (store, report) = run_demo().await;

    assert_eq!(report.schema.created.len(), 7);
    let loaded: Vec<(&str, usize)> = report.loaded.iter().map(|(t, n)| (t.as_str(), *n)).collect();
    assert_eq!(
        loaded,
        vec![
            ("Client", 6),
            ("City", 4),
            ("Company", 4),
            ("Merchant", 9),
            ("TransactedWith", 14),
            ("LocatedIn", 9),
            // merchant 16 has no company
            ("BelongsTo", 8),
        ]
    );
    assert_eq!(store.count("BelongsTo").await.unwrap(), 8);
}

#[tokio::test]
async fn test_demo_queries() {
    let (_, report) = run_demo().await;

    let starbucks = &report.queries["starbucks_clients"];
    assert_eq!(ints(starbucks.column("id")), vec![1, 2, 3, 4, 5]);
    assert_eq!(starbucks.value(0, "name"), Some(&Value::from("Ann")));

    let la = &report.queries["two_merchants_in_la"];
    assert_eq!(ints(la.column("id")), vec![3, 4, 5]);

    let three_cities = &report.queries["companies_in_three_cities"];
    assert_eq!(three_cities.rows, vec![vec![Value::from("Starbucks")]]);

    let common = &report.queries["common_connections"];
    assert_eq!(common.columns, vec!["connectionType", "count"]);
    assert_eq!(
        common.rows,
        vec![
            vec![Value::from("City"), Value::from(5)],
            vec![Value::from("Company"), Value::from(3)],
            vec![Value::from("Merchant"), Value::from(3)],
        ]
    );

    let disputed = &report.queries["disputed_spend"];
    assert_eq!(
        disputed.rows,
        vec![
            vec![Value::from("Eve"), Value::from(230.0)],
            vec![Value::from("Bob"), Value::from(120.0)],
        ]
    );
}

#[tokio::test]
async fn test_demo_enrichments() {
    let (store, report) = run_demo().await;

    let closeness = &report.enrichments["merchant_closeness"];
    assert!(closeness.is_complete());
    // merchant 13 never transacted, so it is outside the subgraph
    assert_eq!(closeness.result.len(), 8);
    let written = closeness.targets[0].outcome.as_ref().unwrap();
    assert_eq!((written.written, written.orphaned), (8, 0));

    let unscored = store
        .query(
            "MATCH (m:Merchant) WHERE m.merchant_id = 13 RETURN m.closeness_centrality AS score",
            &Params::new(),
        )
        .await
        .unwrap();
    assert_eq!(unscored.value(0, "score"), Some(&Value::from(0.0)));

    let components = &report.enrichments["merchant_components"];
    assert_eq!(components.targets[0].outcome.as_ref().unwrap().written, 14);

    let result = store
        .query(
            "MATCH (c:Client) RETURN c.client_id AS id, c.component AS component ORDER BY id",
            &Params::new(),
        )
        .await
        .unwrap();
    let ids: Vec<f64> = result
        .column("component")
        .unwrap()
        .into_iter()
        .filter_map(Value::as_float)
        .collect();
    assert_eq!(ids.len(), 6);
    // clients 1-5 share merchants; client 6 only visits 16 and 18
    assert!(ids[..5].iter().all(|c| *c == ids[0]));
    assert_ne!(ids[5], ids[0]);
}

#[tokio::test]
async fn test_projection_output_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("located_in.parquet");

    let mut config = demo_config();
    config.queries.clear();
    config.enrichments.clear();
    let located_in = config
        .projections
        .iter_mut()
        .find(|p| p.name == "located_in")
        .unwrap();
    located_in.output = Some(output.clone());

    let store = Arc::new(MemoryGraph::new());
    Pipeline::run(&config, store, Vec::new()).await.unwrap();
    assert!(output.exists());

    let registry = config.registry().unwrap();
    let layout = BatchLayout::for_table(&registry, "LocatedIn").unwrap();
    let batch = read_batches(&TabularSource::from_path(&output), &layout, &config.source_options)
        .unwrap()
        .read_all()
        .unwrap();

    assert_eq!(batch.len(), 9);
    assert_eq!(batch.rows()[0], vec![Value::from(10), Value::from(1)]);
}

#[test]
fn test_demo_ddl() {
    let registry = demo_config().registry().unwrap();
    let ddl = registry.ddl();

    assert_eq!(ddl.len(), 7);
    assert!(ddl[0].starts_with("CREATE NODE TABLE Client"));
    assert!(ddl.iter().any(|s| s.starts_with("CREATE REL TABLE TransactedWith")));
}
