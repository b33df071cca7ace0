//! Query execution
//!
//! Matching produces records, WHERE filters them, then RETURN projects or
//! aggregates, followed by DISTINCT, ORDER BY, SKIP and LIMIT in that order.

mod eval;
mod matcher;
mod planner;
mod record;

use crate::error::{PipelineError, PipelineResult};
use crate::query::ast::{Expression, OrderItem, Query, AGGREGATE_FUNCTIONS};
use crate::query::{Params, QueryResult};
use crate::store::memory::GraphData;
use crate::store::EdgeKey;
use crate::value::Value;
use eval::EvalContext;
use indexmap::{IndexMap, IndexSet};
use matcher::Matcher;
use planner::PatternPlan;
use record::Record;
use rustc_hash::FxHashSet;
use tracing::debug;

fn exec_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::QueryExecution(msg.into())
}

pub(crate) fn is_aggregate_name(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.iter().any(|f| name.eq_ignore_ascii_case(f))
}

/// Run a parsed query against a graph snapshot
pub fn execute(query: &Query, data: &GraphData, params: &Params) -> PipelineResult<QueryResult> {
    let plan = PatternPlan::build(query, data, params)?;
    let items = return_items(query, &plan)?;
    check_variables(query, &plan, &items)?;

    let ctx = EvalContext {
        data,
        plan: &plan,
        params,
    };

    let mut records = Vec::new();
    for record in Matcher::new(data, &plan).run() {
        if let Some(predicate) = &query.where_clause {
            if !ctx.holds(predicate, &record)? {
                continue;
            }
        }
        records.push(record);
    }

    let mut result = QueryResult {
        columns: items.iter().map(|(name, _)| name.clone()).collect(),
        ..Default::default()
    };
    collect_subgraph(data, &records, &mut result);

    let sort_keys = resolve_order(&query.order_by, &items);
    let mut rows = if query.is_aggregating() {
        aggregate(&ctx, &items, &sort_keys, &records)?
    } else {
        project(&ctx, &items, &sort_keys, &records)?
    };

    if query.return_clause.distinct {
        let mut seen: FxHashSet<Vec<Value>> = FxHashSet::default();
        rows.retain(|(row, _)| seen.insert(row.clone()));
    }

    if !sort_keys.is_empty() {
        rows.sort_by(|(_, a), (_, b)| {
            for ((x, y), item) in a.iter().zip(b).zip(&query.order_by) {
                let ord = x.sort_cmp(y);
                let ord = if item.ascending { ord } else { ord.reverse() };
                if ord.is_ne() {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    result.rows = rows
        .into_iter()
        .map(|(row, _)| row)
        .skip(query.skip.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    debug!(
        "Query matched {} records, returned {} rows",
        records.len(),
        result.rows.len()
    );
    Ok(result)
}

/// Output columns and the expression computing each
fn return_items(query: &Query, plan: &PatternPlan) -> PipelineResult<Vec<(String, Expression)>> {
    let clause = &query.return_clause;
    if clause.star {
        let items: Vec<_> = plan
            .variable_names()
            .map(|name| (name.to_string(), Expression::Variable(name.to_string())))
            .collect();
        if items.is_empty() {
            return Err(exec_err("RETURN * requires at least one named variable"));
        }
        return Ok(items);
    }
    clause
        .items
        .iter()
        .map(|item| {
            if item.expression.contains_nested_aggregate() {
                return Err(exec_err(format!(
                    "Aggregates must be top-level RETURN items: {}",
                    item.text
                )));
            }
            Ok((item.column_name().to_string(), item.expression.clone()))
        })
        .collect()
}

fn check_variables(query: &Query, plan: &PatternPlan, items: &[(String, Expression)]) -> PipelineResult<()> {
    let mut used = Vec::new();
    if let Some(predicate) = &query.where_clause {
        collect_variables(predicate, &mut used);
    }
    for (_, expr) in items {
        collect_variables(expr, &mut used);
    }
    for name in used {
        if plan.variable(name).is_none() {
            return Err(exec_err(format!("Variable {} is not defined", name)));
        }
    }

    let mut ordered = Vec::new();
    for item in &query.order_by {
        collect_variables(&item.expression, &mut ordered);
    }
    for name in ordered {
        if plan.variable(name).is_none() && !items.iter().any(|(column, _)| column == name) {
            return Err(exec_err(format!("Variable {} is not defined", name)));
        }
    }
    Ok(())
}

fn collect_variables<'e>(expr: &'e Expression, out: &mut Vec<&'e str>) {
    match expr {
        Expression::Variable(name) | Expression::Property { variable: name, .. } => out.push(name),
        Expression::Binary { left, right, .. } => {
            collect_variables(left, out);
            collect_variables(right, out);
        }
        Expression::Not(inner) | Expression::IsNull { expr: inner, .. } => collect_variables(inner, out),
        Expression::Function { args, .. } => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
        Expression::Literal(_) | Expression::Parameter(_) | Expression::CountStar => {}
    }
}

/// Distinct nodes and edges touched by the surviving records
fn collect_subgraph(data: &GraphData, records: &[Record], result: &mut QueryResult) {
    let mut nodes: IndexSet<usize> = IndexSet::new();
    let mut edges: IndexSet<usize> = IndexSet::new();
    for record in records {
        nodes.extend(record.bound_nodes());
        for &e in &record.edges {
            let stored = data.edge(e);
            nodes.insert(stored.from);
            nodes.insert(stored.to);
            edges.insert(e);
        }
    }
    result.nodes = nodes.into_iter().map(|n| data.node_key(n)).collect();
    result.edges = edges
        .into_iter()
        .map(|e| {
            let stored = data.edge(e);
            EdgeKey {
                table: data.edge_table_name(stored.table).to_string(),
                from: data.node_key(stored.from),
                to: data.node_key(stored.to),
            }
        })
        .collect();
}

enum SortKey<'q> {
    /// Sort by an output column
    Column(usize),
    /// Sort by an expression evaluated per record
    Expr(&'q Expression),
}

fn resolve_order<'q>(order_by: &'q [OrderItem], items: &[(String, Expression)]) -> Vec<SortKey<'q>> {
    order_by
        .iter()
        .map(|order| {
            let by_alias = match &order.expression {
                Expression::Variable(name) => items.iter().position(|(column, _)| column == name),
                _ => None,
            };
            let position = by_alias
                .or_else(|| items.iter().position(|(column, _)| *column == order.text))
                .or_else(|| items.iter().position(|(_, expr)| *expr == order.expression));
            match position {
                Some(idx) => SortKey::Column(idx),
                None => SortKey::Expr(&order.expression),
            }
        })
        .collect()
}

type KeyedRow = (Vec<Value>, Vec<Value>);

fn project(
    ctx: &EvalContext<'_>,
    items: &[(String, Expression)],
    sort_keys: &[SortKey<'_>],
    records: &[Record],
) -> PipelineResult<Vec<KeyedRow>> {
    records
        .iter()
        .map(|record| {
            let row = items
                .iter()
                .map(|(_, expr)| ctx.eval(expr, record))
                .collect::<PipelineResult<Vec<_>>>()?;
            let keys = sort_keys
                .iter()
                .map(|key| match key {
                    SortKey::Column(idx) => Ok(row[*idx].clone()),
                    SortKey::Expr(expr) => ctx.eval(expr, record),
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok((row, keys))
        })
        .collect()
}

fn aggregate(
    ctx: &EvalContext<'_>,
    items: &[(String, Expression)],
    sort_keys: &[SortKey<'_>],
    records: &[Record],
) -> PipelineResult<Vec<KeyedRow>> {
    let group_items: Vec<usize> = (0..items.len()).filter(|&i| !items[i].1.is_aggregate()).collect();
    let agg_items: Vec<usize> = (0..items.len()).filter(|&i| items[i].1.is_aggregate()).collect();

    let new_accumulators = || {
        agg_items
            .iter()
            .map(|&i| Accumulator::new(&items[i].1))
            .collect::<PipelineResult<Vec<_>>>()
    };

    let mut groups: IndexMap<Vec<Value>, Vec<Accumulator>> = IndexMap::new();
    for record in records {
        let key = group_items
            .iter()
            .map(|&i| ctx.eval(&items[i].1, record))
            .collect::<PipelineResult<Vec<_>>>()?;
        let accumulators = match groups.entry(key) {
            indexmap::map::Entry::Occupied(entry) => entry.into_mut(),
            indexmap::map::Entry::Vacant(entry) => entry.insert(new_accumulators()?),
        };
        for (acc, &i) in accumulators.iter_mut().zip(&agg_items) {
            let value = match acc.argument(&items[i].1) {
                Some(arg) => ctx.eval(arg, record)?,
                None => Value::Boolean(true),
            };
            acc.update(value)?;
        }
    }

    // An ungrouped aggregate over nothing still yields one row
    if groups.is_empty() && group_items.is_empty() {
        groups.insert(Vec::new(), new_accumulators()?);
    }

    groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row = vec![Value::Null; items.len()];
            for (value, &i) in key.into_iter().zip(&group_items) {
                row[i] = value;
            }
            for (acc, &i) in accumulators.into_iter().zip(&agg_items) {
                row[i] = acc.finish();
            }
            let keys = sort_keys
                .iter()
                .map(|key| match key {
                    SortKey::Column(idx) => Ok(row[*idx].clone()),
                    SortKey::Expr(_) => Err(exec_err(
                        "ORDER BY of an aggregating query must refer to a RETURN item",
                    )),
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok((row, keys))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug)]
struct Accumulator {
    func: AggFunc,
    seen: Option<FxHashSet<Value>>,
    count: i64,
    int_sum: i64,
    float_sum: f64,
    saw_float: bool,
    best: Option<Value>,
}

impl Accumulator {
    fn new(expr: &Expression) -> PipelineResult<Self> {
        let (func, distinct) = match expr {
            Expression::CountStar => (AggFunc::Count, false),
            Expression::Function { name, args, distinct } => {
                if args.len() != 1 {
                    return Err(exec_err(format!("{}() expects one argument", name)));
                }
                let func = match name.to_ascii_lowercase().as_str() {
                    "count" => AggFunc::Count,
                    "sum" => AggFunc::Sum,
                    "avg" => AggFunc::Avg,
                    "min" => AggFunc::Min,
                    "max" => AggFunc::Max,
                    other => return Err(exec_err(format!("Unknown aggregate {}()", other))),
                };
                (func, *distinct)
            }
            _ => return Err(exec_err("Not an aggregate expression")),
        };
        Ok(Self {
            func,
            seen: distinct.then(FxHashSet::default),
            count: 0,
            int_sum: 0,
            float_sum: 0.0,
            saw_float: false,
            best: None,
        })
    }

    fn argument<'e>(&self, expr: &'e Expression) -> Option<&'e Expression> {
        match expr {
            Expression::Function { args, .. } => args.first(),
            _ => None,
        }
    }

    fn update(&mut self, value: Value) -> PipelineResult<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }
        self.count += 1;
        match self.func {
            AggFunc::Count => {}
            AggFunc::Sum | AggFunc::Avg => match value {
                Value::Int64(i) if !self.saw_float => match self.int_sum.checked_add(i) {
                    Some(sum) => self.int_sum = sum,
                    None => {
                        self.saw_float = true;
                        self.float_sum = self.int_sum as f64 + i as f64;
                    }
                },
                other => {
                    let f = other
                        .as_float()
                        .ok_or_else(|| exec_err(format!("Cannot sum non-numeric value {}", other)))?;
                    if !self.saw_float {
                        self.saw_float = true;
                        self.float_sum = self.int_sum as f64;
                    }
                    self.float_sum += f;
                }
            },
            AggFunc::Min | AggFunc::Max => {
                let replace = match &self.best {
                    None => true,
                    Some(best) => {
                        let ord = value.sort_cmp(best);
                        if self.func == AggFunc::Min {
                            ord.is_lt()
                        } else {
                            ord.is_gt()
                        }
                    }
                };
                if replace {
                    self.best = Some(value);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self.func {
            AggFunc::Count => Value::Int64(self.count),
            AggFunc::Sum if self.saw_float => Value::Float64(self.float_sum),
            AggFunc::Sum => Value::Int64(self.int_sum),
            AggFunc::Avg if self.count == 0 => Value::Null,
            AggFunc::Avg => {
                let total = if self.saw_float { self.float_sum } else { self.int_sum as f64 };
                Value::Float64(total / self.count as f64)
            }
            AggFunc::Min | AggFunc::Max => self.best.unwrap_or(Value::Null),
        }
    }
}
