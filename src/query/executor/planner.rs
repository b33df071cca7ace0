//! Resolves a parsed pattern against the graph schema
//!
//! Labels and edge types become table indexes, inline property values are
//! bound from literals or parameters, and every node and edge variable gets
//! a slot in the match record. Anonymous nodes get slots too so their
//! bindings can be reported in the result subgraph.

use crate::error::{PipelineError, PipelineResult};
use crate::query::ast::{Direction, EdgePattern, Expression, NodePattern, Query};
use crate::query::Params;
use crate::store::memory::GraphData;
use crate::value::{Key, Value};
use indexmap::IndexMap;

/// Upper hop bound applied to `[*]` and `[*n..]`
pub(crate) const MAX_VARIABLE_HOPS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Node,
    Edge,
}

#[derive(Debug)]
pub(crate) struct NodeStep {
    pub slot: usize,
    /// `None` matches nodes of any table
    pub tables: Option<Vec<usize>>,
    pub properties: Vec<(String, Value)>,
    /// Primary-key lookup when the pattern pins the key of a single table
    pub key_lookup: Option<(usize, Key)>,
}

#[derive(Debug)]
pub(crate) struct EdgeStep {
    pub slot: Option<usize>,
    pub tables: Option<Vec<usize>>,
    pub direction: Direction,
    pub properties: Vec<(String, Value)>,
    /// Inclusive hop bounds of a variable-length edge
    pub hops: Option<(usize, usize)>,
}

#[derive(Debug)]
pub(crate) struct PathPlan {
    pub start: NodeStep,
    pub segments: Vec<(EdgeStep, NodeStep)>,
}

#[derive(Debug)]
pub(crate) struct PatternPlan {
    pub paths: Vec<PathPlan>,
    /// User variables in order of first appearance
    variables: IndexMap<String, (usize, SlotKind)>,
    slot_count: usize,
}

impl PatternPlan {
    pub fn build(query: &Query, data: &GraphData, params: &Params) -> PipelineResult<Self> {
        let mut plan = PatternPlan {
            paths: Vec::new(),
            variables: IndexMap::new(),
            slot_count: 0,
        };

        for path in &query.paths {
            let start = plan.node_step(&path.start, data, params)?;
            let mut segments = Vec::with_capacity(path.segments.len());
            for segment in &path.segments {
                let edge = plan.edge_step(&segment.edge, data, params)?;
                let node = plan.node_step(&segment.node, data, params)?;
                segments.push((edge, node));
            }
            plan.paths.push(PathPlan { start, segments });
        }
        Ok(plan)
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn variable(&self, name: &str) -> Option<(usize, SlotKind)> {
        self.variables.get(name).copied()
    }

    /// User variable names, in order of first appearance
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    fn allocate(&mut self) -> usize {
        self.slot_count += 1;
        self.slot_count - 1
    }

    fn slot_for(&mut self, name: &str, kind: SlotKind) -> PipelineResult<usize> {
        if let Some(&(slot, existing)) = self.variables.get(name) {
            if existing != kind {
                return Err(PipelineError::QueryExecution(format!(
                    "Variable {} is used as both a node and a relationship",
                    name
                )));
            }
            return Ok(slot);
        }
        let slot = self.allocate();
        self.variables.insert(name.to_string(), (slot, kind));
        Ok(slot)
    }

    fn node_step(&mut self, pattern: &NodePattern, data: &GraphData, params: &Params) -> PipelineResult<NodeStep> {
        let slot = match &pattern.variable {
            Some(name) => self.slot_for(name, SlotKind::Node)?,
            None => self.allocate(),
        };
        let tables = if pattern.labels.is_empty() {
            None
        } else {
            Some(
                pattern
                    .labels
                    .iter()
                    .map(|l| {
                        data.node_table_index(l)
                            .ok_or_else(|| PipelineError::UnknownTable(l.clone()))
                    })
                    .collect::<PipelineResult<Vec<_>>>()?,
            )
        };
        let properties = resolve_properties(&pattern.properties, params)?;

        let key_lookup = match tables.as_deref() {
            Some(&[table]) => data.node_table_at(table).and_then(|t| {
                properties
                    .iter()
                    .find(|(k, _)| *k == t.spec.primary_key)
                    .and_then(|(_, v)| v.as_key())
                    .map(|key| (table, key))
            }),
            _ => None,
        };

        Ok(NodeStep {
            slot,
            tables,
            properties,
            key_lookup,
        })
    }

    fn edge_step(&mut self, pattern: &EdgePattern, data: &GraphData, params: &Params) -> PipelineResult<EdgeStep> {
        let slot = match &pattern.variable {
            Some(name) => Some(self.slot_for(name, SlotKind::Edge)?),
            None => None,
        };
        let tables = if pattern.types.is_empty() {
            None
        } else {
            Some(
                pattern
                    .types
                    .iter()
                    .map(|t| {
                        data.edge_table_index(t)
                            .ok_or_else(|| PipelineError::UnknownTable(t.clone()))
                    })
                    .collect::<PipelineResult<Vec<_>>>()?,
            )
        };
        let hops = pattern.length.map(|len| {
            let max = len.max.unwrap_or(MAX_VARIABLE_HOPS.max(len.min));
            (len.min, max)
        });

        Ok(EdgeStep {
            slot,
            tables,
            direction: pattern.direction,
            properties: resolve_properties(&pattern.properties, params)?,
            hops,
        })
    }
}

fn resolve_properties(properties: &[(String, Expression)], params: &Params) -> PipelineResult<Vec<(String, Value)>> {
    properties
        .iter()
        .map(|(key, expr)| {
            let value = match expr {
                Expression::Literal(v) => v.clone(),
                Expression::Parameter(name) => params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PipelineError::QueryExecution(format!("Missing parameter ${}", name)))?,
                _ => {
                    return Err(PipelineError::QueryExecution(format!(
                        "Inline property {} must be a literal or a parameter",
                        key
                    )))
                }
            };
            Ok((key.clone(), value))
        })
        .collect()
}
