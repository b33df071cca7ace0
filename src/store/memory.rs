//! In-memory graph store
//!
//! Nodes and edges live in arenas indexed by position, with per-table
//! primary-key indexes and adjacency lists for both directions. The whole
//! graph sits behind one `tokio::sync::RwLock`: queries share the read lock,
//! schema changes and loads take the write lock.

use super::{GraphStore, NodeKey, PropertyWriteReport};
use crate::batch::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::query::{self, Params, QueryResult};
use crate::schema::{EdgeTableSpec, NodeTableSpec, TableSpec, TypedColumn, FROM_COLUMN, TO_COLUMN};
use crate::value::{Key, Value};
use async_trait::async_trait;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub table: usize,
    pub key: Key,
    pub properties: Vec<Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredEdge {
    pub table: usize,
    pub from: usize,
    pub to: usize,
    pub properties: Vec<Value>,
}

#[derive(Debug)]
pub(crate) struct NodeTable {
    /// Spec as created; columns added later are not part of it
    pub spec: NodeTableSpec,
    /// Declared columns followed by added columns
    pub columns: Vec<TypedColumn>,
    pub key_column: usize,
    pub key_index: FxHashMap<Key, usize>,
    pub nodes: Vec<usize>,
}

impl NodeTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn current_spec(&self) -> NodeTableSpec {
        NodeTableSpec {
            columns: self.columns.clone(),
            ..self.spec.clone()
        }
    }
}

#[derive(Debug)]
pub(crate) struct EdgeTable {
    pub spec: EdgeTableSpec,
    pub from_table: usize,
    pub to_table: usize,
    pub edges: Vec<usize>,
}

impl EdgeTable {
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.spec.properties.iter().position(|c| c.name == name)
    }
}

/// Graph contents guarded by [`MemoryGraph`]
#[derive(Debug, Default)]
pub struct GraphData {
    node_tables: IndexMap<String, NodeTable>,
    edge_tables: IndexMap<String, EdgeTable>,
    /// Table names in creation order
    creation_order: Vec<String>,
    nodes: Vec<StoredNode>,
    edges: Vec<StoredEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl GraphData {
    pub(crate) fn node(&self, id: usize) -> &StoredNode {
        &self.nodes[id]
    }

    pub(crate) fn edge(&self, id: usize) -> &StoredEdge {
        &self.edges[id]
    }

    pub(crate) fn node_table_at(&self, idx: usize) -> Option<&NodeTable> {
        self.node_tables.get_index(idx).map(|(_, t)| t)
    }

    pub(crate) fn edge_table_at(&self, idx: usize) -> Option<&EdgeTable> {
        self.edge_tables.get_index(idx).map(|(_, t)| t)
    }

    pub(crate) fn node_table_name(&self, idx: usize) -> &str {
        self.node_tables.get_index(idx).map(|(n, _)| n.as_str()).unwrap_or_default()
    }

    pub(crate) fn edge_table_name(&self, idx: usize) -> &str {
        self.edge_tables.get_index(idx).map(|(n, _)| n.as_str()).unwrap_or_default()
    }

    pub(crate) fn node_table_index(&self, name: &str) -> Option<usize> {
        self.node_tables.get_index_of(name)
    }

    pub(crate) fn edge_table_index(&self, name: &str) -> Option<usize> {
        self.edge_tables.get_index_of(name)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    pub(crate) fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    pub(crate) fn lookup(&self, table: usize, key: &Key) -> Option<usize> {
        self.node_table_at(table)?.key_index.get(key).copied()
    }

    pub(crate) fn node_property(&self, node: usize, name: &str) -> Option<&Value> {
        let stored = &self.nodes[node];
        let idx = self.node_table_at(stored.table)?.column_index(name)?;
        stored.properties.get(idx)
    }

    pub(crate) fn edge_property(&self, edge: usize, name: &str) -> Option<&Value> {
        let stored = &self.edges[edge];
        let idx = self.edge_table_at(stored.table)?.property_index(name)?;
        stored.properties.get(idx)
    }

    pub(crate) fn node_key(&self, node: usize) -> NodeKey {
        let stored = &self.nodes[node];
        NodeKey {
            table: self.node_table_name(stored.table).to_string(),
            key: stored.key.clone(),
        }
    }

    fn ensure_name_free(&self, name: &str, kind: &str) -> PipelineResult<()> {
        let taken_by = if kind == "node" {
            self.edge_tables.contains_key(name).then_some("edge")
        } else {
            self.node_tables.contains_key(name).then_some("node")
        };
        match taken_by {
            Some(other) => Err(PipelineError::SchemaConflict {
                table: name.to_string(),
                reason: format!("a {} table with this name already exists", other),
            }),
            None => Ok(()),
        }
    }

    fn create_node_table(&mut self, spec: &NodeTableSpec) -> PipelineResult<bool> {
        spec.validate()?;
        self.ensure_name_free(&spec.name, "node")?;
        if let Some(existing) = self.node_tables.get(&spec.name) {
            if existing.spec == *spec {
                return Ok(false);
            }
            return Err(PipelineError::SchemaConflict {
                table: spec.name.clone(),
                reason: "existing node table has a different definition".to_string(),
            });
        }
        let key_column = spec.primary_key_index().ok_or_else(|| PipelineError::InvalidSpec {
            table: spec.name.clone(),
            reason: format!("primary key {} is not a declared column", spec.primary_key),
        })?;
        debug!("{}", spec.ddl());
        self.node_tables.insert(
            spec.name.clone(),
            NodeTable {
                spec: spec.clone(),
                columns: spec.columns.clone(),
                key_column,
                key_index: FxHashMap::default(),
                nodes: Vec::new(),
            },
        );
        self.creation_order.push(spec.name.clone());
        Ok(true)
    }

    fn create_edge_table(&mut self, spec: &EdgeTableSpec) -> PipelineResult<bool> {
        spec.validate()?;
        self.ensure_name_free(&spec.name, "edge")?;
        if let Some(existing) = self.edge_tables.get(&spec.name) {
            if existing.spec == *spec {
                return Ok(false);
            }
            return Err(PipelineError::SchemaConflict {
                table: spec.name.clone(),
                reason: "existing edge table has a different definition".to_string(),
            });
        }
        let endpoint = |name: &str| {
            self.node_table_index(name)
                .ok_or_else(|| PipelineError::DanglingEndpointReference {
                    edge: spec.name.clone(),
                    endpoint: name.to_string(),
                })
        };
        let from_table = endpoint(&spec.from)?;
        let to_table = endpoint(&spec.to)?;
        debug!("{}", spec.ddl());
        self.edge_tables.insert(
            spec.name.clone(),
            EdgeTable {
                spec: spec.clone(),
                from_table,
                to_table,
                edges: Vec::new(),
            },
        );
        self.creation_order.push(spec.name.clone());
        Ok(true)
    }

    fn tables(&self) -> Vec<TableSpec> {
        self.creation_order
            .iter()
            .filter_map(|name| {
                if let Some(t) = self.node_tables.get(name) {
                    Some(TableSpec::Node(t.current_spec()))
                } else {
                    self.edge_tables.get(name).map(|t| TableSpec::Edge(t.spec.clone()))
                }
            })
            .collect()
    }

    fn insert_nodes(&mut self, batch: &RecordBatch) -> PipelineResult<usize> {
        let table_idx = self
            .node_table_index(batch.table())
            .ok_or_else(|| PipelineError::UnknownTable(batch.table().to_string()))?;
        let table = &self.node_tables[table_idx];

        // Batches may carry only the declared columns; added columns get defaults.
        let padding: Vec<Value> = if batch.check_layout(&table.columns).is_ok() {
            Vec::new()
        } else {
            batch.check_layout(&table.spec.columns)?;
            table.columns[table.spec.columns.len()..]
                .iter()
                .map(|c| c.default.clone().unwrap_or(Value::Null))
                .collect()
        };

        // Validate the whole batch before touching anything.
        let mut batch_keys: FxHashSet<Key> = FxHashSet::default();
        let mut keys = Vec::with_capacity(batch.len());
        for (row, values) in batch.rows().iter().enumerate() {
            let key = values[table.key_column].as_key().ok_or_else(|| PipelineError::TypeCoercion {
                table: batch.table().to_string(),
                column: table.spec.primary_key.clone(),
                row,
                value: values[table.key_column].to_text(),
                expected: format!("non-null {}", table.columns[table.key_column].scalar_type),
            })?;
            if table.key_index.contains_key(&key) || !batch_keys.insert(key.clone()) {
                return Err(PipelineError::DuplicateKey {
                    table: batch.table().to_string(),
                    key: key.to_string(),
                    row,
                });
            }
            keys.push(key);
        }

        for (values, key) in batch.rows().iter().zip(keys) {
            let id = self.nodes.len();
            let mut properties = values.clone();
            properties.extend(padding.iter().cloned());
            self.nodes.push(StoredNode {
                table: table_idx,
                key: key.clone(),
                properties,
            });
            self.outgoing.push(Vec::new());
            self.incoming.push(Vec::new());
            let table = &mut self.node_tables[table_idx];
            table.key_index.insert(key, id);
            table.nodes.push(id);
        }
        Ok(batch.len())
    }

    fn insert_edges(&mut self, batch: &RecordBatch) -> PipelineResult<usize> {
        let table_idx = self
            .edge_table_index(batch.table())
            .ok_or_else(|| PipelineError::UnknownTable(batch.table().to_string()))?;
        let table = &self.edge_tables[table_idx];
        let from_spec = &self.node_tables[table.from_table].spec;
        let to_spec = &self.node_tables[table.to_table].spec;
        batch.check_layout(&table.spec.batch_columns(from_spec, to_spec))?;

        let mut resolved = Vec::with_capacity(batch.len());
        for (row, values) in batch.rows().iter().enumerate() {
            let endpoint = |side: &'static str, value: &Value, node_table: usize| {
                value
                    .as_key()
                    .and_then(|k| self.lookup(node_table, &k))
                    .ok_or_else(|| PipelineError::DanglingEdgeEndpoint {
                        table: batch.table().to_string(),
                        row,
                        side,
                        node_table: self.node_table_name(node_table).to_string(),
                        key: value.to_text(),
                    })
            };
            let from = endpoint(FROM_COLUMN, &values[0], table.from_table)?;
            let to = endpoint(TO_COLUMN, &values[1], table.to_table)?;
            resolved.push((from, to));
        }

        for (values, (from, to)) in batch.rows().iter().zip(resolved) {
            let id = self.edges.len();
            self.edges.push(StoredEdge {
                table: table_idx,
                from,
                to,
                properties: values[2..].to_vec(),
            });
            self.outgoing[from].push(id);
            self.incoming[to].push(id);
            self.edge_tables[table_idx].edges.push(id);
        }
        Ok(batch.len())
    }

    fn count(&self, table: &str) -> PipelineResult<usize> {
        if let Some(t) = self.node_tables.get(table) {
            return Ok(t.nodes.len());
        }
        self.edge_tables
            .get(table)
            .map(|t| t.edges.len())
            .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))
    }

    fn add_node_column(&mut self, table: &str, column: &TypedColumn) -> PipelineResult<bool> {
        let table_idx = self
            .node_table_index(table)
            .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))?;
        let node_table = &mut self.node_tables[table_idx];
        if let Some(existing) = node_table.columns.iter().find(|c| c.name == column.name) {
            if existing.scalar_type == column.scalar_type {
                return Ok(false);
            }
            return Err(PipelineError::SchemaConflict {
                table: table.to_string(),
                reason: format!(
                    "column {} exists as {}, requested {}",
                    column.name, existing.scalar_type, column.scalar_type
                ),
            });
        }
        if let Some(default) = &column.default {
            if !default.conforms_to(&column.scalar_type) {
                return Err(PipelineError::InvalidSpec {
                    table: table.to_string(),
                    reason: format!("default of column {} does not conform to {}", column.name, column.scalar_type),
                });
            }
        }
        node_table.columns.push(column.clone());
        let fill = column.default.clone().unwrap_or(Value::Null);
        for &id in &node_table.nodes {
            self.nodes[id].properties.push(fill.clone());
        }
        debug!("ALTER TABLE {} ADD {}", table, column.ddl());
        Ok(true)
    }

    fn set_node_property(
        &mut self,
        table: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport> {
        let table_idx = self
            .node_table_index(table)
            .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))?;
        let node_table = &self.node_tables[table_idx];
        let col_idx = node_table.column_index(column).ok_or_else(|| PipelineError::SchemaMismatch {
            table: table.to_string(),
            reason: format!("column {} does not exist", column),
        })?;
        if col_idx == node_table.key_column {
            return Err(PipelineError::SchemaMismatch {
                table: table.to_string(),
                reason: format!("primary key column {} cannot be overwritten", column),
            });
        }
        let ty = node_table.columns[col_idx].scalar_type;

        let mut report = PropertyWriteReport::default();
        let mut writes = Vec::with_capacity(values.len());
        for (row, (key, value)) in values.iter().enumerate() {
            let Some(&id) = node_table.key_index.get(key) else {
                report.missing.push(key.clone());
                continue;
            };
            let typed = crate::source::coerce::coerce_value(value.clone(), &ty).ok_or_else(|| {
                PipelineError::TypeCoercion {
                    table: table.to_string(),
                    column: column.to_string(),
                    row,
                    value: value.to_text(),
                    expected: ty.to_string(),
                }
            })?;
            writes.push((id, typed));
        }
        for (id, value) in writes {
            self.nodes[id].properties[col_idx] = value;
            report.written += 1;
        }
        Ok(report)
    }

    fn set_edge_property(
        &mut self,
        table: &str,
        key_property: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport> {
        let edge_table = self
            .edge_tables
            .get(table)
            .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))?;
        let missing_property = |name: &str| PipelineError::SchemaMismatch {
            table: table.to_string(),
            reason: format!("edge property {} does not exist", name),
        };
        let key_idx = edge_table
            .property_index(key_property)
            .ok_or_else(|| missing_property(key_property))?;
        let col_idx = edge_table.property_index(column).ok_or_else(|| missing_property(column))?;
        if col_idx == key_idx {
            return Err(PipelineError::SchemaMismatch {
                table: table.to_string(),
                reason: format!("key property {} cannot be overwritten", column),
            });
        }
        let ty = edge_table.spec.properties[col_idx].scalar_type;

        let mut by_key: FxHashMap<Key, Vec<usize>> = FxHashMap::default();
        for &id in &edge_table.edges {
            if let Some(key) = self.edges[id].properties[key_idx].as_key() {
                by_key.entry(key).or_default().push(id);
            }
        }

        let mut report = PropertyWriteReport::default();
        let mut writes = Vec::with_capacity(values.len());
        for (row, (key, value)) in values.iter().enumerate() {
            let Some(ids) = by_key.get(key) else {
                report.missing.push(key.clone());
                continue;
            };
            let typed = crate::source::coerce::coerce_value(value.clone(), &ty).ok_or_else(|| {
                PipelineError::TypeCoercion {
                    table: table.to_string(),
                    column: column.to_string(),
                    row,
                    value: value.to_text(),
                    expected: ty.to_string(),
                }
            })?;
            writes.extend(ids.iter().map(|&id| (id, typed.clone())));
        }
        for (id, value) in writes {
            self.edges[id].properties[col_idx] = value;
            report.written += 1;
        }
        debug!("SET {}.{} on {} edges", table, column, report.written);
        Ok(report)
    }
}

/// Shareable handle to an in-memory graph
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    data: Arc<RwLock<GraphData>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    fn name(&self) -> &str {
        "memory"
    }

    async fn reset(&self) -> PipelineResult<()> {
        let mut data = self.data.write().await;
        *data = GraphData::default();
        info!("Graph store reset");
        Ok(())
    }

    async fn create_node_table(&self, spec: &NodeTableSpec) -> PipelineResult<bool> {
        self.data.write().await.create_node_table(spec)
    }

    async fn create_edge_table(&self, spec: &EdgeTableSpec) -> PipelineResult<bool> {
        self.data.write().await.create_edge_table(spec)
    }

    async fn tables(&self) -> PipelineResult<Vec<TableSpec>> {
        Ok(self.data.read().await.tables())
    }

    async fn insert_nodes(&self, batch: &RecordBatch) -> PipelineResult<usize> {
        self.data.write().await.insert_nodes(batch)
    }

    async fn insert_edges(&self, batch: &RecordBatch) -> PipelineResult<usize> {
        self.data.write().await.insert_edges(batch)
    }

    async fn count(&self, table: &str) -> PipelineResult<usize> {
        self.data.read().await.count(table)
    }

    async fn query(&self, text: &str, params: &Params) -> PipelineResult<QueryResult> {
        let parsed = query::parse_query(text)?;
        let data = self.data.read().await;
        query::execute(&parsed, &data, params)
    }

    async fn add_node_column(&self, table: &str, column: &TypedColumn) -> PipelineResult<bool> {
        self.data.write().await.add_node_column(table, column)
    }

    async fn set_node_property(
        &self,
        table: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport> {
        self.data.write().await.set_node_property(table, column, values)
    }

    async fn set_edge_property(
        &self,
        table: &str,
        key_property: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<PropertyWriteReport> {
        self.data
            .write()
            .await
            .set_edge_property(table, key_property, column, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarType;

    fn city() -> NodeTableSpec {
        NodeTableSpec::new("City")
            .column("city_id", ScalarType::Int64)
            .column("city", ScalarType::String)
    }

    fn merchant() -> NodeTableSpec {
        NodeTableSpec::new("Merchant")
            .column("merchant_id", ScalarType::Int64)
            .column("city_id", ScalarType::Int64)
    }

    fn located_in() -> EdgeTableSpec {
        EdgeTableSpec::new("LocatedIn", "Merchant", "City")
    }

    async fn seeded() -> MemoryGraph {
        let store = MemoryGraph::new();
        store.create_node_table(&city()).await.unwrap();
        store.create_node_table(&merchant()).await.unwrap();
        store.create_edge_table(&located_in()).await.unwrap();
        let cities = RecordBatch::from_rows(
            "City",
            city().columns,
            vec![
                vec![Value::from(1i64), Value::from("Boston")],
                vec![Value::from(2i64), Value::from("NYC")],
            ],
        )
        .unwrap();
        store.insert_nodes(&cities).await.unwrap();
        let merchants = RecordBatch::from_rows(
            "Merchant",
            merchant().columns,
            vec![vec![10i64, 1], vec![11, 2], vec![12, 1]],
        )
        .unwrap();
        store.insert_nodes(&merchants).await.unwrap();
        store
    }

    fn edges(rows: Vec<Vec<i64>>) -> RecordBatch {
        let columns = located_in().batch_columns(&merchant(), &city());
        RecordBatch::from_rows("LocatedIn", columns, rows).unwrap()
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = seeded().await;
        let before = store.tables().await.unwrap();
        assert!(!store.create_node_table(&city()).await.unwrap());
        assert!(!store.create_edge_table(&located_in()).await.unwrap());
        assert_eq!(store.tables().await.unwrap(), before);

        let changed = city().column("population", ScalarType::Int64);
        assert!(matches!(
            store.create_node_table(&changed).await,
            Err(PipelineError::SchemaConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_key_leaves_table_unchanged() {
        let store = seeded().await;
        let batch = RecordBatch::from_rows(
            "Merchant",
            merchant().columns,
            vec![vec![13i64, 1], vec![10, 2]],
        )
        .unwrap();
        let err = store.insert_nodes(&batch).await.unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateKey { row: 1, ref key, .. } if key == "10"));
        assert_eq!(store.count("Merchant").await.unwrap(), 3);

        let in_batch = RecordBatch::from_rows(
            "Merchant",
            merchant().columns,
            vec![vec![20i64, 1], vec![20, 2]],
        )
        .unwrap();
        assert!(matches!(
            store.insert_nodes(&in_batch).await,
            Err(PipelineError::DuplicateKey { row: 1, .. })
        ));
        assert_eq!(store.count("Merchant").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_dangling_endpoint_leaves_table_unchanged() {
        let store = seeded().await;
        store.insert_edges(&edges(vec![vec![10, 1]])).await.unwrap();
        let before = store.count("LocatedIn").await.unwrap();

        let err = store
            .insert_edges(&edges(vec![vec![11, 2], vec![99, 1]]))
            .await
            .unwrap_err();
        match err {
            PipelineError::DanglingEdgeEndpoint { row, side, node_table, key, .. } => {
                assert_eq!(row, 1);
                assert_eq!(side, "from");
                assert_eq!(node_table, "Merchant");
                assert_eq!(key, "99");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count("LocatedIn").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_add_column_and_set_property() {
        let store = seeded().await;
        let score = TypedColumn::new("score", ScalarType::Float64).with_default(0.0);
        assert!(store.add_node_column("Merchant", &score).await.unwrap());
        assert!(!store.add_node_column("Merchant", &score).await.unwrap());

        let report = store
            .set_node_property(
                "Merchant",
                "score",
                &[(Key::Int(10), Value::from(0.5)), (Key::Int(404), Value::from(0.1))],
            )
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.missing, vec![Key::Int(404)]);

        // declared-column batches still load after the column was added
        let more = RecordBatch::from_rows("Merchant", merchant().columns, vec![vec![14i64, 2]]).unwrap();
        store.insert_nodes(&more).await.unwrap();
        let result = store
            .query(
                "MATCH (m:Merchant) RETURN m.merchant_id, m.score ORDER BY m.merchant_id",
                &Params::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.rows[0], vec![Value::Int64(10), Value::Float64(0.5)]);
        assert_eq!(result.rows[3], vec![Value::Int64(14), Value::Float64(0.0)]);
    }

    #[tokio::test]
    async fn test_set_edge_property_by_key_property() {
        let store = seeded().await;
        let paid = EdgeTableSpec::new("Paid", "Merchant", "City")
            .property("transaction_id", ScalarType::Int64)
            .property("is_disputed", ScalarType::Boolean);
        store.create_edge_table(&paid).await.unwrap();
        let rows = vec![
            vec![Value::from(10i64), Value::from(1i64), Value::from(100i64), Value::from(false)],
            vec![Value::from(11i64), Value::from(2i64), Value::from(101i64), Value::from(false)],
            vec![Value::from(12i64), Value::from(1i64), Value::from(102i64), Value::from(false)],
        ];
        let batch = RecordBatch::from_rows("Paid", paid.batch_columns(&merchant(), &city()), rows).unwrap();
        store.insert_edges(&batch).await.unwrap();

        let report = store
            .set_edge_property(
                "Paid",
                "transaction_id",
                "is_disputed",
                &[(Key::Int(101), Value::from(true)), (Key::Int(999), Value::from(true))],
            )
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.missing, vec![Key::Int(999)]);

        let result = store
            .query(
                "MATCH (m:Merchant)-[p:Paid]->(c:City) WHERE p.is_disputed = true RETURN m.merchant_id AS id",
                &Params::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int64(11)]]);

        let err = store
            .set_edge_property("Paid", "transaction_id", "amount", &[(Key::Int(100), Value::from(1.0))])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
        let err = store
            .set_edge_property("Paid", "transaction_id", "is_disputed", &[(Key::Int(100), Value::from("maybe"))])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TypeCoercion { .. }));
    }

    #[tokio::test]
    async fn test_reset_drops_everything() {
        let store = seeded().await;
        store.reset().await.unwrap();
        assert!(store.tables().await.unwrap().is_empty());
        assert!(matches!(store.count("City").await, Err(PipelineError::UnknownTable(_))));
    }
}
