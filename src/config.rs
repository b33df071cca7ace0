//! Pipeline configuration document
//!
//! A YAML file declares the tables, the files loaded into them, the
//! projections deriving further batches, named queries and enrichment jobs.
//! Relative paths resolve against the directory holding the file.

use crate::enrich::EnrichmentJob;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::LoadMode;
use crate::projection::ProjectionRule;
use crate::query::Params;
use crate::schema::{EdgeTableSpec, NodeTableSpec, SchemaRegistry, TypedColumn};
use crate::source::coerce::{from_json, json_to_value};
use crate::source::{BatchLayout, SourceOptions, TabularSource};
use crate::value::ScalarType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A column as written in the document: `{ name: age, type: INT64 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ColumnConfig {
    fn to_column(&self, table: &str) -> PipelineResult<TypedColumn> {
        let column = TypedColumn::new(&self.name, self.scalar_type);
        match &self.default {
            None => Ok(column),
            Some(json) => from_json(json, &self.scalar_type)
                .map(|v| column.with_default(v))
                .ok_or_else(|| PipelineError::InvalidSpec {
                    table: table.to_string(),
                    reason: format!("default {} does not fit {} {}", json, self.name, self.scalar_type),
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableConfig {
    Node {
        name: String,
        columns: Vec<ColumnConfig>,
        /// Defaults to the first column
        #[serde(default)]
        primary_key: Option<String>,
    },
    Edge {
        name: String,
        from: String,
        to: String,
        #[serde(default)]
        properties: Vec<ColumnConfig>,
    },
}

impl TableConfig {
    pub fn name(&self) -> &str {
        match self {
            TableConfig::Node { name, .. } | TableConfig::Edge { name, .. } => name,
        }
    }
}

/// A file loaded as-is into one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub table: String,
    pub path: PathBuf,
    /// Overrides the document-wide source options
    #[serde(default)]
    pub options: Option<SourceOptions>,
}

/// A projection from a source file into a declared table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub name: String,
    /// File holding the rows to project
    pub source: PathBuf,
    pub target: String,
    /// Target column to source column
    pub columns: IndexMap<String, String>,
    #[serde(default)]
    pub distinct: bool,
    /// Source column types; by default each mapped source column takes the
    /// type of the target column it feeds
    #[serde(default)]
    pub source_columns: Option<Vec<ColumnConfig>>,
    /// Also write the projected batch to this file (`.csv` or `.parquet`)
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub options: Option<SourceOptions>,
}

impl ProjectionConfig {
    pub fn rule(&self, registry: &SchemaRegistry) -> PipelineResult<ProjectionRule> {
        let mut rule = ProjectionRule::for_table(&self.name, registry, &self.target)?;
        for (target, source) in &self.columns {
            if !rule.columns().iter().any(|c| &c.name == target) {
                return Err(PipelineError::Config(format!(
                    "projection {} maps unknown column {}.{}",
                    self.name, self.target, target
                )));
            }
            rule = rule.map(source.clone(), target);
        }
        Ok(if self.distinct { rule.distinct() } else { rule })
    }

    /// Layout the source file is read with
    pub fn source_layout(&self, registry: &SchemaRegistry) -> PipelineResult<BatchLayout> {
        let label = format!("{}:{}", self.name, self.source.display());
        if let Some(columns) = &self.source_columns {
            let columns = columns
                .iter()
                .map(|c| c.to_column(&label))
                .collect::<PipelineResult<Vec<_>>>()?;
            return Ok(BatchLayout::new(label, columns));
        }

        let target = registry.batch_columns(&self.target)?;
        let mut columns: Vec<TypedColumn> = Vec::with_capacity(self.columns.len());
        for (target_name, source) in &self.columns {
            if columns.iter().any(|c| &c.name == source) {
                continue;
            }
            let ty = target
                .iter()
                .find(|c| &c.name == target_name)
                .map(|c| c.scalar_type)
                .ok_or_else(|| {
                    PipelineError::Config(format!(
                        "projection {} maps unknown column {}.{}",
                        self.name, self.target, target_name
                    ))
                })?;
            columns.push(TypedColumn::new(source, ty));
        }
        Ok(BatchLayout::new(label, columns))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub params: IndexMap<String, serde_json::Value>,
}

impl QueryConfig {
    pub fn params(&self) -> PipelineResult<Params> {
        to_params(&self.params)
    }
}

/// Typed query parameters from untyped literals
pub fn to_params(raw: &IndexMap<String, serde_json::Value>) -> PipelineResult<Params> {
    raw.iter()
        .map(|(name, json)| {
            json_to_value(json)
                .map(|v| (name.clone(), v))
                .ok_or_else(|| PipelineError::Config(format!("parameter ${} has unsupported value {}", name, json)))
        })
        .collect()
}

/// The whole document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub load_mode: LoadMode,
    pub source_options: SourceOptions,
    pub tables: Vec<TableConfig>,
    pub sources: Vec<SourceConfig>,
    pub projections: Vec<ProjectionConfig>,
    pub queries: Vec<QueryConfig>,
    pub enrichments: Vec<EnrichmentJob>,
    /// Directory relative paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_yaml(text: &str) -> PipelineResult<Self> {
        serde_yaml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source(&self, path: &Path) -> TabularSource {
        TabularSource::from_path(self.resolve_path(path))
    }

    pub fn options_for<'a>(&'a self, options: &'a Option<SourceOptions>) -> &'a SourceOptions {
        options.as_ref().unwrap_or(&self.source_options)
    }

    /// Declare every table in document order
    pub fn registry(&self) -> PipelineResult<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for table in &self.tables {
            match table {
                TableConfig::Node {
                    name,
                    columns,
                    primary_key,
                } => {
                    let mut spec = NodeTableSpec::new(name);
                    for column in columns {
                        spec = spec.typed_column(column.to_column(name)?);
                    }
                    if let Some(pk) = primary_key {
                        spec = spec.primary_key(pk);
                    }
                    registry.declare_node_table(spec)?;
                }
                TableConfig::Edge {
                    name,
                    from,
                    to,
                    properties,
                } => {
                    let mut spec = EdgeTableSpec::new(name, from, to);
                    for property in properties {
                        spec = spec.typed_property(property.to_column(name)?);
                    }
                    registry.declare_edge_table(spec)?;
                }
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Algorithm;
    use crate::value::Value;

    const DOC: &str = r#"
load_mode: incremental
source_options:
  has_header: false
tables:
  - kind: node
    name: City
    columns:
      - { name: city_id, type: INT64 }
      - { name: city, type: STRING }
  - kind: node
    name: Merchant
    columns:
      - { name: merchant_id, type: INT64 }
      - { name: verified, type: BOOLEAN, default: false }
  - kind: edge
    name: LocatedIn
    from: Merchant
    to: City
projections:
  - name: located_in
    source: merchants.csv
    target: LocatedIn
    columns: { from: merchant_id, to: city_id }
queries:
  - name: in_city
    text: "MATCH (m:Merchant)-[:LocatedIn]->(c:City) WHERE c.city = $city RETURN m.merchant_id"
    params: { city: Boston }
enrichments:
  - name: hubs
    pattern: "MATCH (m:Merchant)-[e:LocatedIn]->(c:City) RETURN *"
    algorithm: { name: degree }
    column: degree
"#;

    #[test]
    fn test_parse_document() {
        let mut config = PipelineConfig::from_yaml(DOC).unwrap();
        config.base_dir = PathBuf::from("/data");
        assert_eq!(config.load_mode, LoadMode::Incremental);
        assert!(!config.source_options.has_header);
        assert_eq!(config.source_options.delimiter, ',');

        let registry = config.registry().unwrap();
        let merchant = registry.node_table("Merchant").unwrap();
        assert_eq!(merchant.primary_key, "merchant_id");
        assert_eq!(merchant.columns[1].default, Some(Value::Boolean(false)));
        assert_eq!(
            registry.ddl(),
            vec![
                "CREATE NODE TABLE City(city_id INT64, city STRING, PRIMARY KEY (city_id))",
                "CREATE NODE TABLE Merchant(merchant_id INT64, verified BOOLEAN DEFAULT false, PRIMARY KEY (merchant_id))",
                "CREATE REL TABLE LocatedIn(FROM Merchant TO City)",
            ]
        );

        let projection = &config.projections[0];
        let layout = projection.source_layout(&registry).unwrap();
        let names: Vec<&str> = layout.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["merchant_id", "city_id"]);
        assert_eq!(
            config.resolve_path(&projection.source),
            PathBuf::from("/data/merchants.csv")
        );

        let params = config.queries[0].params().unwrap();
        assert_eq!(params["city"], Value::from("Boston"));
        assert_eq!(config.enrichments[0].algorithm, Algorithm::Degree { directed: false });
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            PipelineConfig::from_yaml("tables: [{ kind: view, name: X }]"),
            Err(PipelineError::Config(_))
        ));

        let config = PipelineConfig::from_yaml(
            "tables: [{ kind: node, name: X, columns: [{ name: id, type: INT64, default: abc }] }]",
        )
        .unwrap();
        assert!(matches!(config.registry(), Err(PipelineError::InvalidSpec { .. })));

        let config = PipelineConfig::from_yaml(
            "tables: [{ kind: node, name: X, columns: [{ name: id, type: INT64 }] }, { kind: edge, name: E, from: X, to: Y }]",
        )
        .unwrap();
        assert!(matches!(
            config.registry(),
            Err(PipelineError::DanglingEndpointReference { .. })
        ));
    }
}
