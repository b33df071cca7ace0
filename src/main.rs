use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relgraph::{
    project, Algorithm, EdgeTableSpec, EnrichmentJob, MemoryGraph, MemoryMirror, MirrorTarget, NodeTableSpec,
    Params, Pipeline, ProjectionRule, RecordBatch, RowSet, ScalarType, SchemaRegistry, Value,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CITIES: [&str; 4] = ["Boston", "New York", "Los Angeles", "Chicago"];
const COMPANIES: [&str; 3] = ["Starbucks", "Walmart", "Target"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Relgraph v{}", relgraph::version());
    println!("==========================================");
    println!();

    let registry = transactions_schema()?;
    let mut rng = StdRng::seed_from_u64(42);

    // Demo 1: schema, synthetic rows, projection and bulk load
    println!("=== Demo 1: Relational rows to graph ===");
    for ddl in registry.ddl() {
        println!("  {}", ddl);
    }

    let store = Arc::new(MemoryGraph::new());
    let mut pipeline = Pipeline::new(store.clone(), registry.clone());
    let schema = pipeline.ensure_schema().await?;
    println!("✓ Created {} tables", schema.created.len());

    let cities = RecordBatch::from_rows(
        "City",
        registry.batch_columns("City")?,
        CITIES
            .iter()
            .enumerate()
            .map(|(i, name)| vec![Value::from(i as i64 + 1), Value::from(*name)]),
    )?;
    let companies = RecordBatch::from_rows(
        "Company",
        registry.batch_columns("Company")?,
        COMPANIES
            .iter()
            .enumerate()
            .map(|(i, name)| vec![Value::from(i as i64 + 100), Value::from(*name)]),
    )?;
    let clients = RecordBatch::from_rows(
        "Client",
        registry.batch_columns("Client")?,
        (1..=20i64).map(|id| vec![Value::from(id), Value::from(format!("client-{}", id))]),
    )?;

    // A wide merchant table: the node table keeps the id, the foreign-key
    // columns become edges
    let merchant_rows = RecordBatch::from_rows(
        "merchants",
        vec![
            relgraph::TypedColumn::new("merchant_id", ScalarType::Int64),
            relgraph::TypedColumn::new("company_id", ScalarType::Int64),
            relgraph::TypedColumn::new("city_id", ScalarType::Int64),
        ],
        (10..22i64).map(|id| {
            // some merchants are independent
            let company = if id % 5 == 0 {
                Value::Null
            } else {
                Value::from(100 + rng.gen_range(0..COMPANIES.len() as i64))
            };
            vec![Value::from(id), company, Value::from(rng.gen_range(1..=CITIES.len() as i64))]
        })
        .collect::<Vec<_>>(),
    )?;
    let merchants = project(
        &ProjectionRule::for_table("merchant", &registry, "Merchant")?.map("merchant_id", "merchant_id"),
        &merchant_rows,
    )?;
    let belongs_to = project(
        &ProjectionRule::for_table("belongs_to", &registry, "BelongsTo")?
            .map("merchant_id", "from")
            .map("company_id", "to"),
        &merchant_rows,
    )?;
    let located_in = project(
        &ProjectionRule::for_table("located_in", &registry, "LocatedIn")?
            .map("merchant_id", "from")
            .map("city_id", "to"),
        &merchant_rows,
    )?;
    println!(
        "✓ Projected {} merchant rows into {} BelongsTo and {} LocatedIn edges",
        merchant_rows.len(),
        belongs_to.len(),
        located_in.len()
    );

    let transactions = RecordBatch::from_rows(
        "TransactedWith",
        registry.batch_columns("TransactedWith")?,
        (0..60)
            .map(|_| {
                vec![
                    Value::from(rng.gen_range(1..=20i64)),
                    Value::from(rng.gen_range(10..22i64)),
                    Value::from((rng.gen_range(1.0..200.0f64) * 100.0).round() / 100.0),
                    Value::from(rng.gen_bool(0.1)),
                ]
            })
            .collect::<Vec<_>>(),
    )?;

    for (table, batch) in [
        ("City", &cities),
        ("Company", &companies),
        ("Client", &clients),
        ("Merchant", &merchants),
        ("BelongsTo", &belongs_to),
        ("LocatedIn", &located_in),
        ("TransactedWith", &transactions),
    ] {
        let loaded = pipeline.load_batch(table, batch).await?;
        println!("✓ Loaded {:>3} rows into {}", loaded, table);
    }

    // Demo 2: pattern queries
    println!("\n=== Demo 2: Pattern queries ===");
    let queries = [
        "MATCH (m:Merchant)-[:LocatedIn]->(c:City) WHERE c.city = 'Boston' RETURN m.merchant_id ORDER BY m.merchant_id",
        "MATCH (c:Client)-[t:TransactedWith]->(m:Merchant)-[:BelongsTo]->(co:Company) RETURN co.company, count(t) AS transactions, sum(t.amount) AS total ORDER BY total DESC",
        "MATCH (c:Client)-[t:TransactedWith]->(m:Merchant) WHERE t.is_disputed = true RETURN DISTINCT c.name ORDER BY c.name LIMIT 5",
    ];
    for text in queries {
        println!("\nQuery: {}", text);
        let result = pipeline.query(text, &Params::new()).await?;
        println!("  → {} rows, columns {:?}", result.len(), result.columns);
        for row in result.rows.iter().take(5) {
            let cells: Vec<String> = row.iter().map(Value::to_text).collect();
            println!("    {}", cells.join(" | "));
        }
    }

    // Demo 3: enrichment with a relational mirror
    println!("\n=== Demo 3: Enrichment round-trip ===");
    let postgres = MemoryMirror::new("postgres");
    let mut mirrored = RowSet::new(vec!["merchant_id".to_string()]);
    mirrored.rows = merchants.rows().to_vec();
    postgres.insert_table("merchant", mirrored).await;

    let mut pipeline = pipeline.with_mirror(MirrorTarget::new(Arc::new(postgres.clone())).relation("Merchant", "merchant"));
    let job = EnrichmentJob {
        name: "merchant_closeness".to_string(),
        pattern: "MATCH (c:Client)-[t:TransactedWith]->(m:Merchant) RETURN *".to_string(),
        algorithm: Algorithm::Closeness { directed: true },
        column: "closeness".to_string(),
        table: Some("Merchant".to_string()),
        mirror: true,
    };
    let outcome = pipeline.enrich(&job, &Params::new()).await?;
    for target in &outcome.targets {
        match &target.outcome {
            Ok(report) => println!(
                "✓ {}: {} written, {} orphaned",
                target.target, report.written, report.orphaned
            ),
            Err(e) => println!("✗ {}: {}", target.target, e),
        }
    }

    let top = pipeline
        .query(
            "MATCH (m:Merchant) RETURN m.merchant_id, m.closeness ORDER BY m.closeness DESC LIMIT 3",
            &Params::new(),
        )
        .await?;
    println!("\nMost central merchants:");
    for row in &top.rows {
        println!("  Merchant {} → {:.4}", row[0].to_text(), row[1].as_float().unwrap_or_default());
    }

    println!("\n✅ Pipeline finished in stage {}", pipeline.stage());
    Ok(())
}

fn transactions_schema() -> relgraph::PipelineResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.declare_node_table(
        NodeTableSpec::new("Client")
            .column("client_id", ScalarType::Int64)
            .column("name", ScalarType::String),
    )?;
    registry.declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::Int64))?;
    registry.declare_node_table(
        NodeTableSpec::new("Company")
            .column("company_id", ScalarType::Int64)
            .column("company", ScalarType::String),
    )?;
    registry.declare_node_table(
        NodeTableSpec::new("City")
            .column("city_id", ScalarType::Int64)
            .column("city", ScalarType::String),
    )?;
    registry.declare_edge_table(
        EdgeTableSpec::new("TransactedWith", "Client", "Merchant")
            .property("amount", ScalarType::Float64)
            .property("is_disputed", ScalarType::Boolean),
    )?;
    registry.declare_edge_table(EdgeTableSpec::new("BelongsTo", "Merchant", "Company"))?;
    registry.declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City"))?;
    Ok(registry)
}
