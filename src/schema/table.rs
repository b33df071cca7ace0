//! Node and edge table specifications

use super::column::TypedColumn;
use crate::error::{PipelineError, PipelineResult};
use crate::value::ScalarType;
use std::collections::HashSet;

/// Column name holding the source endpoint key in an edge batch
pub const FROM_COLUMN: &str = "from";
/// Column name holding the target endpoint key in an edge batch
pub const TO_COLUMN: &str = "to";

/// A node table: ordered columns with exactly one primary-key column
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTableSpec {
    pub name: String,
    pub columns: Vec<TypedColumn>,
    pub primary_key: String,
}

impl NodeTableSpec {
    /// Start a spec; the first column added becomes the primary key unless
    /// `primary_key` is called.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: String::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.push_column(TypedColumn::new(name, scalar_type));
        self
    }

    pub fn typed_column(mut self, column: TypedColumn) -> Self {
        self.push_column(column);
        self
    }

    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    fn push_column(&mut self, column: TypedColumn) {
        if self.primary_key.is_empty() {
            self.primary_key = column.name.clone();
        }
        self.columns.push(column);
    }

    pub fn column_def(&self, name: &str) -> Option<&TypedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.name == self.primary_key)
    }

    /// Type of the primary-key column
    pub fn key_type(&self) -> Option<ScalarType> {
        self.column_def(&self.primary_key).map(|c| c.scalar_type)
    }

    /// Reject specs that can never hold data
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |reason: String| PipelineError::InvalidSpec {
            table: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("table name is empty".to_string()));
        }
        if self.columns.is_empty() {
            return Err(invalid("node table declares no columns".to_string()));
        }
        validate_columns(&self.columns).map_err(invalid)?;

        let pk = self
            .column_def(&self.primary_key)
            .ok_or_else(|| invalid(format!("primary key {} is not a declared column", self.primary_key)))?;
        if !pk.scalar_type.is_key_type() {
            return Err(invalid(format!(
                "primary key {} has type {}, expected INT64, STRING or TIMESTAMP",
                pk.name, pk.scalar_type
            )));
        }
        Ok(())
    }

    /// `CREATE NODE TABLE` statement for this spec
    pub fn ddl(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(TypedColumn::ddl).collect();
        format!(
            "CREATE NODE TABLE {}({}, PRIMARY KEY ({}))",
            self.name,
            cols.join(", "),
            self.primary_key
        )
    }
}

/// A directed edge table between two node tables
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTableSpec {
    pub name: String,
    pub from: String,
    pub to: String,
    pub properties: Vec<TypedColumn>,
}

impl EdgeTableSpec {
    pub fn new(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.properties.push(TypedColumn::new(name, scalar_type));
        self
    }

    pub fn typed_property(mut self, column: TypedColumn) -> Self {
        self.properties.push(column);
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |reason: String| PipelineError::InvalidSpec {
            table: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("table name is empty".to_string()));
        }
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(invalid("edge table needs both FROM and TO tables".to_string()));
        }
        validate_columns(&self.properties).map_err(invalid)?;
        if let Some(p) = self
            .properties
            .iter()
            .find(|p| p.name == FROM_COLUMN || p.name == TO_COLUMN)
        {
            return Err(invalid(format!("property name {} is reserved", p.name)));
        }
        Ok(())
    }

    /// Columns of a batch loadable into this table: `from`, `to`, then the
    /// properties, with endpoint columns typed as the endpoint primary keys.
    pub fn batch_columns(&self, from: &NodeTableSpec, to: &NodeTableSpec) -> Vec<TypedColumn> {
        let mut columns = Vec::with_capacity(self.properties.len() + 2);
        columns.push(TypedColumn::new(
            FROM_COLUMN,
            from.key_type().unwrap_or(ScalarType::String),
        ));
        columns.push(TypedColumn::new(
            TO_COLUMN,
            to.key_type().unwrap_or(ScalarType::String),
        ));
        columns.extend(self.properties.iter().cloned());
        columns
    }

    /// `CREATE REL TABLE` statement for this spec
    pub fn ddl(&self) -> String {
        let mut parts = vec![format!("FROM {} TO {}", self.from, self.to)];
        parts.extend(self.properties.iter().map(TypedColumn::ddl));
        format!("CREATE REL TABLE {}({})", self.name, parts.join(", "))
    }
}

/// Either kind of table, as resolved from the registry
#[derive(Debug, Clone, PartialEq)]
pub enum TableSpec {
    Node(NodeTableSpec),
    Edge(EdgeTableSpec),
}

impl TableSpec {
    pub fn name(&self) -> &str {
        match self {
            TableSpec::Node(n) => &n.name,
            TableSpec::Edge(e) => &e.name,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, TableSpec::Node(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TableSpec::Node(_) => "node",
            TableSpec::Edge(_) => "edge",
        }
    }

    pub fn ddl(&self) -> String {
        match self {
            TableSpec::Node(n) => n.ddl(),
            TableSpec::Edge(e) => e.ddl(),
        }
    }
}

impl From<NodeTableSpec> for TableSpec {
    fn from(spec: NodeTableSpec) -> Self {
        TableSpec::Node(spec)
    }
}

impl From<EdgeTableSpec> for TableSpec {
    fn from(spec: EdgeTableSpec) -> Self {
        TableSpec::Edge(spec)
    }
}

fn validate_columns(columns: &[TypedColumn]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for col in columns {
        if col.name.trim().is_empty() {
            return Err("column name is empty".to_string());
        }
        if !seen.insert(col.name.as_str()) {
            return Err(format!("column {} declared twice", col.name));
        }
        if let Some(default) = &col.default {
            if !default.conforms_to(&col.scalar_type) {
                return Err(format!(
                    "default {} of column {} does not conform to {}",
                    default, col.name, col.scalar_type
                ));
            }
        }
    }
    Ok(())
}
