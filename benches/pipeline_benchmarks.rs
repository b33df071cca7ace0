use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relgraph::query::parse_query;
use relgraph::{
    ensure_schema, load_batch, project, EdgeTableSpec, GraphStore, MemoryGraph, NodeTableSpec, Params,
    ProjectionRule, RecordBatch, ScalarType, SchemaRegistry, TypedColumn, Value,
};
use tokio::runtime::Runtime;

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::Int64))
        .unwrap();
    registry
        .declare_node_table(
            NodeTableSpec::new("City")
                .column("city_id", ScalarType::Int64)
                .column("city", ScalarType::String),
        )
        .unwrap();
    registry
        .declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City"))
        .unwrap();
    registry
}

/// Wide merchant rows with a nullable city foreign key
fn merchant_rows(size: i64) -> RecordBatch {
    RecordBatch::from_rows(
        "merchants",
        vec![
            TypedColumn::new("merchant_id", ScalarType::Int64),
            TypedColumn::new("city_id", ScalarType::Int64),
            TypedColumn::new("name", ScalarType::String),
        ],
        (0..size).map(|i| {
            let city = if i % 10 == 0 { Value::Null } else { Value::from(i % 50) };
            vec![Value::from(i), city, Value::from(format!("Merchant{}", i))]
        }),
    )
    .unwrap()
}

fn located_in_rule(registry: &SchemaRegistry) -> ProjectionRule {
    ProjectionRule::for_table("located_in", registry, "LocatedIn")
        .unwrap()
        .map("merchant_id", "from")
        .map("city_id", "to")
}

/// Benchmark edge projection throughput
fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    let registry = registry();
    let rule = located_in_rule(&registry);

    for size in [100, 1000, 10_000].iter() {
        let rows = merchant_rows(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let edges = project(&rule, &rows).unwrap();
                criterion::black_box(edges.len());
            });
        });
    }
    group.finish();
}

/// Benchmark node and edge bulk load into a fresh store
fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");
    let rt = Runtime::new().unwrap();
    let registry = registry();
    let rule = located_in_rule(&registry);

    for size in [100, 1000, 10_000].iter() {
        let rows = merchant_rows(*size);
        let merchants = project(
            &ProjectionRule::for_table("merchant", &registry, "Merchant")
                .unwrap()
                .map("merchant_id", "merchant_id"),
            &rows,
        )
        .unwrap();
        let cities = RecordBatch::from_rows(
            "City",
            registry.batch_columns("City").unwrap(),
            (0..50i64).map(|i| vec![Value::from(i), Value::from(format!("City{}", i))]),
        )
        .unwrap();
        let edges = project(&rule, &rows).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let store = MemoryGraph::new();
                    ensure_schema(&store, &registry).await.unwrap();
                    load_batch(&store, &registry, "City", &cities).await.unwrap();
                    load_batch(&store, &registry, "Merchant", &merchants).await.unwrap();
                    load_batch(&store, &registry, "LocatedIn", &edges).await.unwrap();
                })
            });
        });
    }
    group.finish();
}

/// Benchmark pattern query parsing
fn bench_query_parse(c: &mut Criterion) {
    let queries = [
        ("simple", "MATCH (n:Merchant) RETURN n"),
        (
            "filtered",
            "MATCH (m:Merchant)-[:LocatedIn]->(c:City) WHERE c.city = 'City1' AND m.merchant_id > 10 RETURN m.merchant_id",
        ),
        (
            "aggregate",
            "MATCH (m:Merchant)-[:LocatedIn]->(c:City) RETURN c.city, count(m) AS merchants ORDER BY merchants DESC LIMIT 5",
        ),
    ];

    let mut group = c.benchmark_group("query_parse");
    for (name, text) in queries {
        group.bench_function(name, |b| {
            b.iter(|| {
                let query = parse_query(text).unwrap();
                criterion::black_box(query);
            });
        });
    }
    group.finish();
}

/// Benchmark a one-hop filtered match over the loaded graph
fn bench_pattern_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_match");
    let rt = Runtime::new().unwrap();
    let registry = registry();
    let rule = located_in_rule(&registry);

    for size in [1000, 10_000].iter() {
        let rows = merchant_rows(*size);
        let store = MemoryGraph::new();
        rt.block_on(async {
            ensure_schema(&store, &registry).await.unwrap();
            let cities = RecordBatch::from_rows(
                "City",
                registry.batch_columns("City").unwrap(),
                (0..50i64).map(|i| vec![Value::from(i), Value::from(format!("City{}", i))]),
            )
            .unwrap();
            load_batch(&store, &registry, "City", &cities).await.unwrap();
            let merchants = project(
                &ProjectionRule::for_table("merchant", &registry, "Merchant")
                    .unwrap()
                    .map("merchant_id", "merchant_id"),
                &rows,
            )
            .unwrap();
            load_batch(&store, &registry, "Merchant", &merchants).await.unwrap();
            load_batch(&store, &registry, "LocatedIn", &project(&rule, &rows).unwrap())
                .await
                .unwrap();
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = rt
                    .block_on(store.query(
                        "MATCH (m:Merchant)-[:LocatedIn]->(c:City) WHERE c.city = 'City7' RETURN m.merchant_id",
                        &Params::new(),
                    ))
                    .unwrap();
                criterion::black_box(result.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_projection,
    bench_bulk_load,
    bench_query_parse,
    bench_pattern_match
);
criterion_main!(benches);
