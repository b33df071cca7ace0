//! Backtracking pattern matcher
//!
//! Paths are matched left to right, each hop extending the current record.
//! Variables shared between paths must bind to the same node. Fixed-length
//! edges may repeat across hops; a variable-length edge never reuses an edge
//! within its own walk.

use super::planner::{EdgeStep, NodeStep, PatternPlan};
use super::record::{Bound, Record};
use crate::query::ast::Direction;
use crate::store::memory::GraphData;
use crate::value::Value;

pub(crate) struct Matcher<'a> {
    data: &'a GraphData,
    plan: &'a PatternPlan,
}

impl<'a> Matcher<'a> {
    pub fn new(data: &'a GraphData, plan: &'a PatternPlan) -> Self {
        Self { data, plan }
    }

    /// Every complete match, in traversal order
    pub fn run(&self) -> Vec<Record> {
        let mut record = Record::new(self.plan.slot_count());
        let mut out = Vec::new();
        self.match_path(0, &mut record, &mut out);
        out
    }

    fn match_path(&self, path: usize, record: &mut Record, out: &mut Vec<Record>) {
        let Some(plan) = self.plan.paths.get(path) else {
            out.push(record.clone());
            return;
        };
        for node in self.start_candidates(&plan.start, record) {
            if let Some(new) = self.bind_node(&plan.start, node, record) {
                self.match_segment(path, 0, node, record, out);
                if new {
                    record.unbind(plan.start.slot);
                }
            }
        }
    }

    fn match_segment(&self, path: usize, segment: usize, current: usize, record: &mut Record, out: &mut Vec<Record>) {
        let Some((edge, next)) = self.plan.paths[path].segments.get(segment) else {
            self.match_path(path + 1, record, out);
            return;
        };

        if let Some((min, max)) = edge.hops {
            let start = record.edges.len();
            self.walk(path, segment, start, current, (min, max), record, out);
            return;
        }

        for (e, other) in self.expand(current, edge) {
            let edge_new = match edge.slot {
                Some(slot) => match record.bind(slot, Bound::Edge(e)) {
                    Some(new) => new,
                    None => continue,
                },
                None => false,
            };
            if let Some(node_new) = self.bind_node(next, other, record) {
                record.edges.push(e);
                self.match_segment(path, segment + 1, other, record, out);
                record.edges.pop();
                if node_new {
                    record.unbind(next.slot);
                }
            }
            if let (true, Some(slot)) = (edge_new, edge.slot) {
                record.unbind(slot);
            }
        }
    }

    /// Depth-first walk of a variable-length edge. `record.edges[start..]`
    /// holds the hops taken so far.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        path: usize,
        segment: usize,
        start: usize,
        at: usize,
        (min, max): (usize, usize),
        record: &mut Record,
        out: &mut Vec<Record>,
    ) {
        let (edge, next) = &self.plan.paths[path].segments[segment];
        let depth = record.edges.len() - start;

        if depth >= min {
            if let Some(new) = self.bind_node(next, at, record) {
                self.match_segment(path, segment + 1, at, record, out);
                if new {
                    record.unbind(next.slot);
                }
            }
        }
        if depth >= max {
            return;
        }
        for (e, other) in self.expand(at, edge) {
            if record.edges[start..].contains(&e) {
                continue;
            }
            record.edges.push(e);
            self.walk(path, segment, start, other, (min, max), record, out);
            record.edges.pop();
        }
    }

    fn start_candidates(&self, step: &NodeStep, record: &Record) -> Vec<usize> {
        if let Some(bound) = record.node(step.slot) {
            return vec![bound];
        }
        if let Some((table, key)) = &step.key_lookup {
            return self.data.lookup(*table, key).into_iter().collect();
        }
        match &step.tables {
            Some(tables) => tables
                .iter()
                .filter_map(|&t| self.data.node_table_at(t))
                .flat_map(|t| t.nodes.iter().copied())
                .collect(),
            None => (0..self.data.node_count()).collect(),
        }
    }

    fn bind_node(&self, step: &NodeStep, node: usize, record: &mut Record) -> Option<bool> {
        if !self.node_matches(step, node) {
            return None;
        }
        record.bind(step.slot, Bound::Node(node))
    }

    fn node_matches(&self, step: &NodeStep, node: usize) -> bool {
        let stored = self.data.node(node);
        if let Some(tables) = &step.tables {
            if !tables.contains(&stored.table) {
                return false;
            }
        }
        step.properties.iter().all(|(key, expected)| {
            self.data
                .node_property(node, key)
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }

    fn edge_matches(&self, step: &EdgeStep, edge: usize) -> bool {
        let stored = self.data.edge(edge);
        if let Some(tables) = &step.tables {
            if !tables.contains(&stored.table) {
                return false;
            }
        }
        step.properties.iter().all(|(key, expected)| {
            self.data
                .edge_property(edge, key)
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }

    /// Edges leaving `node` in the step's direction, with the node at the
    /// other end
    fn expand(&self, node: usize, step: &EdgeStep) -> Vec<(usize, usize)> {
        let mut hops = Vec::new();
        if matches!(step.direction, Direction::Outgoing | Direction::Both) {
            for &e in self.data.outgoing(node) {
                if self.edge_matches(step, e) {
                    hops.push((e, self.data.edge(e).to));
                }
            }
        }
        if matches!(step.direction, Direction::Incoming | Direction::Both) {
            for &e in self.data.incoming(node) {
                let stored = self.data.edge(e);
                // a self-loop was already seen going out
                if step.direction == Direction::Both && stored.from == stored.to {
                    continue;
                }
                if self.edge_matches(step, e) {
                    hops.push((e, stored.from));
                }
            }
        }
        hops
    }
}

/// Equality used by inline property maps and `=`: null never matches,
/// numbers compare across integer and float
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match a.compare(b) {
        Some(ord) => ord.is_eq(),
        None => a == b,
    }
}
