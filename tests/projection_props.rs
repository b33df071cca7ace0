use proptest::prelude::*;
use relgraph::{
    project, EdgeTableSpec, NodeTableSpec, ProjectionRule, RecordBatch, ScalarType, SchemaRegistry, TypedColumn,
    Value,
};

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .declare_node_table(NodeTableSpec::new("Merchant").column("merchant_id", ScalarType::Int64))
        .unwrap();
    registry
        .declare_node_table(NodeTableSpec::new("Company").column("company_id", ScalarType::Int64))
        .unwrap();
    registry
        .declare_edge_table(EdgeTableSpec::new("BelongsTo", "Merchant", "Company"))
        .unwrap();
    registry
}

/// Merchant rows with a nullable company foreign key
fn merchant_rows() -> impl Strategy<Value = Vec<(i64, Option<i64>)>> {
    proptest::collection::vec((0i64..1000, proptest::option::of(0i64..50)), 0..64)
}

fn wide_batch(rows: &[(i64, Option<i64>)]) -> RecordBatch {
    RecordBatch::from_rows(
        "merchants",
        vec![
            TypedColumn::new("merchant_id", ScalarType::Int64),
            TypedColumn::new("company_id", ScalarType::Int64),
        ],
        rows.iter()
            .map(|(id, company)| vec![Value::from(*id), company.map(Value::from).unwrap_or(Value::Null)]),
    )
    .unwrap()
}

fn belongs_to(registry: &SchemaRegistry) -> ProjectionRule {
    ProjectionRule::for_table("belongs_to", registry, "BelongsTo")
        .unwrap()
        .map("merchant_id", "from")
        .map("company_id", "to")
}

proptest! {
    #[test]
    fn prop_projection_never_adds_rows(rows in merchant_rows()) {
        let registry = registry();
        let edges = project(&belongs_to(&registry), &wide_batch(&rows)).unwrap();
        prop_assert!(edges.len() <= rows.len());
    }

    #[test]
    fn prop_projection_drops_exactly_null_keys_in_order(rows in merchant_rows()) {
        let registry = registry();
        let edges = project(&belongs_to(&registry), &wide_batch(&rows)).unwrap();

        let expected: Vec<Vec<Value>> = rows
            .iter()
            .filter_map(|(id, company)| company.map(|c| vec![Value::from(*id), Value::from(c)]))
            .collect();
        prop_assert_eq!(edges.rows(), expected.as_slice());
    }

    #[test]
    fn prop_distinct_projection_keeps_first_occurrences(rows in merchant_rows()) {
        let registry = registry();
        let edges = project(&belongs_to(&registry).distinct(), &wide_batch(&rows)).unwrap();

        let mut expected: Vec<Vec<Value>> = Vec::new();
        for (id, company) in &rows {
            if let Some(c) = company {
                let row = vec![Value::from(*id), Value::from(*c)];
                if !expected.contains(&row) {
                    expected.push(row);
                }
            }
        }
        prop_assert_eq!(edges.rows(), expected.as_slice());
    }
}
