//! Pattern query processing
//!
//! A read-only Cypher subset: `MATCH` over comma-separated paths, `WHERE`,
//! `RETURN [DISTINCT]` with aliases and aggregates, `ORDER BY`, `SKIP` and
//! `LIMIT`. Queries run against the in-memory graph; results carry both the
//! projected table and the nodes and edges the surviving matches touched.

pub mod ast;
pub mod executor;
pub mod parser;

use crate::store::{EdgeKey, NodeKey};
use crate::value::Value;
use serde::Serialize;
use std::collections::HashMap;

pub use ast::Query;
pub use executor::execute;
pub use parser::{parse_query, ParseError, ParseResult};

/// Named `$parameter` values
pub type Params = HashMap<String, Value>;

/// Tabular and graph-shaped result of a pattern query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Distinct nodes bound by matches that passed WHERE, in first-seen order
    pub nodes: Vec<NodeKey>,
    /// Distinct edges traversed by those matches, in first-seen order
    pub edges: Vec<EdgeKey>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }
}
