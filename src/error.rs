//! Error types shared by every pipeline component

use crate::query::ParseError;
use thiserror::Error;

/// Errors raised by schema, source, projection, load and enrichment code.
///
/// Fields name the offending table, column and zero-based data row so a
/// failed run can be fixed and restarted deterministically.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A table name was re-declared with a different spec
    #[error("Schema conflict on table {table}: {reason}")]
    SchemaConflict { table: String, reason: String },

    /// A table name that was never declared
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// An edge table names an endpoint table that is not declared (yet)
    #[error("Edge table {edge} references undeclared node table {endpoint}")]
    DanglingEndpointReference { edge: String, endpoint: String },

    /// A spec that can never be valid (bad primary key, duplicate column, ...)
    #[error("Invalid spec for table {table}: {reason}")]
    InvalidSpec { table: String, reason: String },

    /// A raw value could not be converted to its declared column type
    #[error("Cannot coerce {value:?} to {expected} in {table}.{column} at row {row}")]
    TypeCoercion {
        table: String,
        column: String,
        row: usize,
        value: String,
        expected: String,
    },

    /// Source or batch columns do not line up with the declared table
    #[error("Schema mismatch for table {table}: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Node batch repeats an existing or in-batch primary key
    #[error("Duplicate primary key {key} in table {table} at row {row}")]
    DuplicateKey { table: String, key: String, row: usize },

    /// Edge batch row points at a node that does not exist
    #[error("Edge table {table} row {row}: {side} endpoint {key} not found in {node_table}")]
    DanglingEdgeEndpoint {
        table: String,
        row: usize,
        side: &'static str,
        node_table: String,
        key: String,
    },

    /// Failure surfaced by an external store, mirror or algorithm
    #[error("{collaborator} failed: {message}")]
    Collaborator { collaborator: String, message: String },

    /// Pattern query could not be parsed
    #[error("Query error: {0}")]
    Query(#[from] ParseError),

    /// Pattern query parsed but could not be evaluated
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Configuration document is unreadable or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl PipelineError {
    /// Shorthand for wrapping a collaborator's own error
    pub fn collaborator(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PipelineError::Collaborator {
            collaborator: name.into(),
            message: err.to_string(),
        }
    }

    /// Whether the error stems from configuration or data shape rather than
    /// from an external system.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::SchemaConflict { .. }
                | PipelineError::UnknownTable(_)
                | PipelineError::DanglingEndpointReference { .. }
                | PipelineError::InvalidSpec { .. }
                | PipelineError::TypeCoercion { .. }
                | PipelineError::SchemaMismatch { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = PipelineError::TypeCoercion {
            table: "Client".to_string(),
            column: "age".to_string(),
            row: 3,
            value: "abc".to_string(),
            expected: "INT64".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Client.age"));
        assert!(msg.contains("row 3"));
        assert!(err.is_schema_error());

        let err = PipelineError::collaborator("postgres", "connection refused");
        assert_eq!(err.to_string(), "postgres failed: connection refused");
        assert!(!err.is_schema_error());
    }
}
