//! Expression evaluation over match records
//!
//! Predicates use three-valued logic: comparisons involving null yield null,
//! and WHERE keeps a record only when its predicate is `true`.

use super::matcher::values_equal;
use super::planner::PatternPlan;
use super::record::{Bound, Record};
use crate::error::{PipelineError, PipelineResult};
use crate::query::ast::{BinaryOp, Expression};
use crate::query::Params;
use crate::store::memory::GraphData;
use crate::source::coerce::coerce_value;
use crate::value::{ScalarType, Value};
use std::cmp::Ordering;

pub(crate) struct EvalContext<'a> {
    pub data: &'a GraphData,
    pub plan: &'a PatternPlan,
    pub params: &'a Params,
}

fn exec_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::QueryExecution(msg.into())
}

impl EvalContext<'_> {
    pub fn eval(&self, expr: &Expression, record: &Record) -> PipelineResult<Value> {
        match expr {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Parameter(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| exec_err(format!("Missing parameter ${}", name))),
            Expression::Variable(name) => Ok(match self.bound(name, record)? {
                Some(Bound::Node(id)) => Value::from(self.data.node(id).key.clone()),
                Some(Bound::Edge(id)) => Value::String(self.describe_edge(id)),
                None => Value::Null,
            }),
            Expression::Property { variable, property } => Ok(match self.bound(variable, record)? {
                Some(Bound::Node(id)) => self.data.node_property(id, property).cloned().unwrap_or(Value::Null),
                Some(Bound::Edge(id)) => self.data.edge_property(id, property).cloned().unwrap_or(Value::Null),
                None => Value::Null,
            }),
            Expression::Not(inner) => Ok(match truth(&self.eval(inner, record)?)? {
                Some(b) => Value::Boolean(!b),
                None => Value::Null,
            }),
            Expression::IsNull { expr, negated } => {
                let is_null = self.eval(expr, record)?.is_null();
                Ok(Value::Boolean(is_null != *negated))
            }
            Expression::Binary { left, op, right } => self.eval_binary(left, *op, right, record),
            Expression::Function { name, args, .. } => self.eval_function(name, args, record),
            Expression::CountStar => Err(exec_err("count(*) is only allowed in RETURN")),
        }
    }

    /// Whether `expr` evaluates to `true`
    pub fn holds(&self, expr: &Expression, record: &Record) -> PipelineResult<bool> {
        Ok(truth(&self.eval(expr, record)?)? == Some(true))
    }

    fn bound(&self, name: &str, record: &Record) -> PipelineResult<Option<Bound>> {
        let (slot, _) = self
            .plan
            .variable(name)
            .ok_or_else(|| exec_err(format!("Variable {} is not defined", name)))?;
        Ok(record.get(slot))
    }

    fn describe_edge(&self, edge: usize) -> String {
        let stored = self.data.edge(edge);
        format!(
            "{}-[{}]->{}",
            self.data.node_key(stored.from),
            self.data.edge_table_name(stored.table),
            self.data.node_key(stored.to)
        )
    }

    fn eval_binary(&self, left: &Expression, op: BinaryOp, right: &Expression, record: &Record) -> PipelineResult<Value> {
        // AND/OR short-circuit where the result is already decided
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = truth(&self.eval(left, record)?)?;
            let decided = if op == BinaryOp::And { Some(false) } else { Some(true) };
            if l == decided {
                return Ok(Value::Boolean(l == Some(true)));
            }
            let r = truth(&self.eval(right, record)?)?;
            if r == decided {
                return Ok(Value::Boolean(r == Some(true)));
            }
            return Ok(match (l, r) {
                (Some(a), Some(b)) => Value::Boolean(if op == BinaryOp::And { a && b } else { a || b }),
                _ => Value::Null,
            });
        }

        let l = self.eval(left, record)?;
        let r = self.eval(right, record)?;
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }

        match op {
            BinaryOp::Eq => Ok(Value::Boolean(values_equal(&l, &r))),
            BinaryOp::Ne => Ok(Value::Boolean(!values_equal(&l, &r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Ok(match l.compare(&r) {
                Some(ord) => Value::Boolean(match op {
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Le => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }),
                None => Value::Null,
            }),
            BinaryOp::StartsWith | BinaryOp::EndsWith | BinaryOp::Contains => Ok(match (l.as_str(), r.as_str()) {
                (Some(a), Some(b)) => Value::Boolean(match op {
                    BinaryOp::StartsWith => a.starts_with(b),
                    BinaryOp::EndsWith => a.ends_with(b),
                    _ => a.contains(b),
                }),
                _ => Value::Null,
            }),
            _ => arithmetic(&l, op, &r),
        }
    }

    fn eval_function(&self, name: &str, args: &[Expression], record: &Record) -> PipelineResult<Value> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "label" | "labels" => {
                let [Expression::Variable(var)] = args else {
                    return Err(exec_err(format!("{}() expects one variable", name)));
                };
                Ok(match self.bound(var, record)? {
                    Some(Bound::Node(id)) => Value::from(self.data.node_table_name(self.data.node(id).table)),
                    Some(Bound::Edge(id)) => Value::from(self.data.edge_table_name(self.data.edge(id).table)),
                    None => Value::Null,
                })
            }
            "coalesce" => {
                for arg in args {
                    let value = self.eval(arg, record)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
            "array_cosine_similarity" => {
                let [left, right] = args else {
                    return Err(exec_err(format!("{}() expects two arguments", name)));
                };
                cosine_similarity(&self.eval(left, record)?, &self.eval(right, record)?)
            }
            "cast" => {
                let [arg, target] = args else {
                    return Err(exec_err(format!("{}() expects a value and a type name", name)));
                };
                let target = self.eval(target, record)?;
                let ty: ScalarType = target
                    .as_str()
                    .ok_or_else(|| exec_err(format!("{}() type must be a string, got {}", name, target)))?
                    .parse()
                    .map_err(exec_err)?;
                let value = self.eval(arg, record)?;
                let text = value.to_text();
                coerce_value(value, &ty).ok_or_else(|| exec_err(format!("Cannot cast {} to {}", text, ty)))
            }
            _ => {
                let [arg] = args else {
                    return Err(exec_err(format!("{}() expects one argument", name)));
                };
                let value = self.eval(arg, record)?;
                scalar_function(&lower, value)
            }
        }
    }
}

/// Cosine of the angle between two equal-length vectors. Null when either
/// side is null or has zero norm.
fn cosine_similarity(left: &Value, right: &Value) -> PipelineResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (Value::Vector(a), Value::Vector(b)) = (left, right) else {
        return Err(exec_err(format!(
            "array_cosine_similarity() expects two vectors, got {} and {}",
            left, right
        )));
    };
    if a.len() != b.len() {
        return Err(exec_err(format!(
            "array_cosine_similarity() dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    Ok(if denom == 0.0 {
        Value::Null
    } else {
        Value::Float64(dot / denom)
    })
}

fn scalar_function(name: &str, value: Value) -> PipelineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match name {
        "lower" | "tolower" => Ok(value.as_str().map(|s| Value::from(s.to_lowercase())).unwrap_or(Value::Null)),
        "upper" | "toupper" => Ok(value.as_str().map(|s| Value::from(s.to_uppercase())).unwrap_or(Value::Null)),
        "tostring" | "string" => Ok(Value::String(value.to_text())),
        "abs" => Ok(match value {
            Value::Int64(i) => Value::Int64(i.wrapping_abs()),
            Value::Float64(f) => Value::Float64(f.abs()),
            _ => Value::Null,
        }),
        "size" | "length" => Ok(match &value {
            Value::String(s) => Value::Int64(s.chars().count() as i64),
            Value::Vector(v) => Value::Int64(v.len() as i64),
            _ => Value::Null,
        }),
        other if super::is_aggregate_name(other) => {
            Err(exec_err(format!("Aggregate {}() is only allowed in RETURN", other)))
        }
        other => Err(exec_err(format!("Unknown function {}()", other))),
    }
}

/// Boolean view of a predicate value; null is unknown
fn truth(value: &Value) -> PipelineResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(exec_err(format!("Expected a boolean, got {}", other))),
    }
}

fn arithmetic(l: &Value, op: BinaryOp, r: &Value) -> PipelineResult<Value> {
    if let (Value::Int64(a), Value::Int64(b)) = (l, r) {
        let result = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div | BinaryOp::Mod if *b == 0 => return Err(exec_err("Division by zero")),
            BinaryOp::Div => a.checked_div(*b),
            BinaryOp::Mod => a.checked_rem(*b),
            _ => None,
        };
        return result
            .map(Value::Int64)
            .ok_or_else(|| exec_err(format!("Integer overflow in {} {:?} {}", a, op, b)));
    }
    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, l, r) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }
    match (l.as_float(), r.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float64(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            _ => return Err(exec_err(format!("Unsupported operator {:?}", op))),
        })),
        _ => Err(exec_err(format!("Cannot apply {:?} to {} and {}", op, l, r))),
    }
}
