//! Schema registry: declared tables keyed by name
//!
//! Declaration order is preserved, which keeps DDL output and schema
//! creation deterministic.

use super::column::TypedColumn;
use super::table::{EdgeTableSpec, NodeTableSpec, TableSpec};
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: IndexMap<String, TableSpec>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node table. Returns `false` when an identical spec was
    /// already declared.
    pub fn declare_node_table(&mut self, spec: NodeTableSpec) -> PipelineResult<bool> {
        spec.validate()?;
        self.declare(TableSpec::Node(spec))
    }

    /// Register an edge table. Both endpoint node tables must already be
    /// declared.
    pub fn declare_edge_table(&mut self, spec: EdgeTableSpec) -> PipelineResult<bool> {
        spec.validate()?;
        for endpoint in [&spec.from, &spec.to] {
            match self.tables.get(endpoint) {
                Some(TableSpec::Node(_)) => {}
                Some(TableSpec::Edge(_)) => {
                    return Err(PipelineError::InvalidSpec {
                        table: spec.name.clone(),
                        reason: format!("endpoint {} is an edge table", endpoint),
                    })
                }
                None => {
                    return Err(PipelineError::DanglingEndpointReference {
                        edge: spec.name.clone(),
                        endpoint: endpoint.clone(),
                    })
                }
            }
        }
        self.declare(TableSpec::Edge(spec))
    }

    fn declare(&mut self, spec: TableSpec) -> PipelineResult<bool> {
        if let Some(existing) = self.tables.get(spec.name()) {
            if *existing == spec {
                return Ok(false);
            }
            return Err(PipelineError::SchemaConflict {
                table: spec.name().to_string(),
                reason: conflict_reason(existing, &spec),
            });
        }
        debug!("Declared {} table {}", spec.kind(), spec.name());
        self.tables.insert(spec.name().to_string(), spec);
        Ok(true)
    }

    pub fn resolve(&self, name: &str) -> PipelineResult<&TableSpec> {
        self.tables
            .get(name)
            .ok_or_else(|| PipelineError::UnknownTable(name.to_string()))
    }

    pub fn node_table(&self, name: &str) -> PipelineResult<&NodeTableSpec> {
        match self.resolve(name)? {
            TableSpec::Node(n) => Ok(n),
            TableSpec::Edge(_) => Err(PipelineError::InvalidSpec {
                table: name.to_string(),
                reason: "expected a node table, found an edge table".to_string(),
            }),
        }
    }

    pub fn edge_table(&self, name: &str) -> PipelineResult<&EdgeTableSpec> {
        match self.resolve(name)? {
            TableSpec::Edge(e) => Ok(e),
            TableSpec::Node(_) => Err(PipelineError::InvalidSpec {
                table: name.to_string(),
                reason: "expected an edge table, found a node table".to_string(),
            }),
        }
    }

    /// Columns a batch for `name` must carry
    pub fn batch_columns(&self, name: &str) -> PipelineResult<Vec<TypedColumn>> {
        match self.resolve(name)? {
            TableSpec::Node(n) => Ok(n.columns.clone()),
            TableSpec::Edge(e) => {
                let from = self.node_table(&e.from)?;
                let to = self.node_table(&e.to)?;
                Ok(e.batch_columns(from, to))
            }
        }
    }

    pub fn node_tables(&self) -> impl Iterator<Item = &NodeTableSpec> {
        self.tables.values().filter_map(|t| match t {
            TableSpec::Node(n) => Some(n),
            TableSpec::Edge(_) => None,
        })
    }

    pub fn edge_tables(&self) -> impl Iterator<Item = &EdgeTableSpec> {
        self.tables.values().filter_map(|t| match t {
            TableSpec::Edge(e) => Some(e),
            TableSpec::Node(_) => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// DDL for every table, node tables first
    pub fn ddl(&self) -> Vec<String> {
        self.node_tables()
            .map(NodeTableSpec::ddl)
            .chain(self.edge_tables().map(EdgeTableSpec::ddl))
            .collect()
    }
}

fn conflict_reason(existing: &TableSpec, new: &TableSpec) -> String {
    match (existing, new) {
        (TableSpec::Node(a), TableSpec::Node(b)) => {
            if a.primary_key != b.primary_key {
                format!("primary key {} differs from declared {}", b.primary_key, a.primary_key)
            } else {
                "column list differs from the declared one".to_string()
            }
        }
        (TableSpec::Edge(a), TableSpec::Edge(b)) => {
            if a.from != b.from || a.to != b.to {
                format!(
                    "endpoints {} -> {} differ from declared {} -> {}",
                    b.from, b.to, a.from, a.to
                )
            } else {
                "property list differs from the declared one".to_string()
            }
        }
        _ => format!("already declared as a {} table", existing.kind()),
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

    #[test]
    fn test_redeclare_identical_is_noop() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.declare_node_table(city()).unwrap());
        assert!(!registry.declare_node_table(city()).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_redeclaration() {
        let mut registry = SchemaRegistry::new();
        registry.declare_node_table(city()).unwrap();
        let changed = city().column("population", ScalarType::Int64);
        let err = registry.declare_node_table(changed).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaConflict { ref table, .. } if table == "City"));

        registry.declare_node_table(merchant()).unwrap();
        let edge_named_city = EdgeTableSpec::new("City", "Merchant", "Merchant");
        assert!(matches!(
            registry.declare_edge_table(edge_named_city),
            Err(PipelineError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn test_edge_requires_declared_endpoints() {
        let mut registry = SchemaRegistry::new();
        registry.declare_node_table(merchant()).unwrap();
        let edge = EdgeTableSpec::new("LocatedIn", "Merchant", "City");
        let err = registry.declare_edge_table(edge.clone()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DanglingEndpointReference { ref endpoint, .. } if endpoint == "City"
        ));

        registry.declare_node_table(city()).unwrap();
        assert!(registry.declare_edge_table(edge).unwrap());
        let cols = registry.batch_columns("LocatedIn").unwrap();
        assert_eq!(cols[0].scalar_type, ScalarType::Int64);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.resolve("Nope"),
            Err(PipelineError::UnknownTable(ref name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_ddl_orders_nodes_before_edges() {
        let mut registry = SchemaRegistry::new();
        registry.declare_node_table(merchant()).unwrap();
        registry.declare_node_table(city()).unwrap();
        registry
            .declare_edge_table(EdgeTableSpec::new("LocatedIn", "Merchant", "City"))
            .unwrap();
        let ddl = registry.ddl();
        assert_eq!(ddl.len(), 3);
        assert!(ddl[2].starts_with("CREATE REL TABLE LocatedIn"));
    }
}
