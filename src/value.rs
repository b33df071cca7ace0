//! Scalar types and values flowing through batches, stores and mirrors

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Textual timestamp layout used for delimited output and display
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Semantic type of a column.
///
/// Written Kùzu-style in configuration (`INT64`, `DOUBLE`, `STRING`,
/// `BOOLEAN`, `TIMESTAMP`, `DOUBLE[384]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScalarType {
    Int64,
    Float64,
    String,
    Boolean,
    Timestamp,
    /// Fixed-width vector of f64 with the given dimension
    Vector(usize),
}

impl ScalarType {
    /// Types allowed as a node table primary key
    pub fn is_key_type(&self) -> bool {
        matches!(self, ScalarType::Int64 | ScalarType::String | ScalarType::Timestamp)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int64 => write!(f, "INT64"),
            ScalarType::Float64 => write!(f, "DOUBLE"),
            ScalarType::String => write!(f, "STRING"),
            ScalarType::Boolean => write!(f, "BOOLEAN"),
            ScalarType::Timestamp => write!(f, "TIMESTAMP"),
            ScalarType::Vector(dim) => write!(f, "DOUBLE[{}]", dim),
        }
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();

        if let Some(inner) = upper.strip_suffix(']') {
            let (base, dim) = inner
                .split_once('[')
                .ok_or_else(|| format!("malformed vector type: {}", s))?;
            if !matches!(base.trim(), "DOUBLE" | "FLOAT" | "REAL") {
                return Err(format!("unsupported vector element type: {}", base));
            }
            let dim: usize = dim
                .trim()
                .parse()
                .map_err(|_| format!("vector dimension must be a positive integer: {}", s))?;
            if dim == 0 {
                return Err(format!("vector dimension must be a positive integer: {}", s));
            }
            return Ok(ScalarType::Vector(dim));
        }

        match upper.as_str() {
            "INT" | "INT8" | "INT16" | "INT32" | "INT64" | "INTEGER" | "BIGINT" | "UINT8"
            | "UINT16" | "UINT32" | "UINT64" | "SERIAL" => Ok(ScalarType::Int64),
            "FLOAT" | "DOUBLE" | "REAL" | "FLOAT64" => Ok(ScalarType::Float64),
            "STRING" | "TEXT" | "VARCHAR" => Ok(ScalarType::String),
            "BOOL" | "BOOLEAN" => Ok(ScalarType::Boolean),
            "TIMESTAMP" | "DATE" | "DATETIME" => Ok(ScalarType::Timestamp),
            _ => Err(format!("unknown scalar type: {}", s)),
        }
    }
}

impl TryFrom<String> for ScalarType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ScalarType> for String {
    fn from(t: ScalarType) -> Self {
        t.to_string()
    }
}

/// A single typed cell. `Null` conforms to every type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    String(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Vector(Vec<f64>),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The scalar type of a non-null value
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(ScalarType::Int64),
            Value::Float64(_) => Some(ScalarType::Float64),
            Value::String(_) => Some(ScalarType::String),
            Value::Boolean(_) => Some(ScalarType::Boolean),
            Value::Timestamp(_) => Some(ScalarType::Timestamp),
            Value::Vector(v) => Some(ScalarType::Vector(v.len())),
        }
    }

    /// Whether this value may be stored in a column of `ty`
    pub fn conforms_to(&self, ty: &ScalarType) -> bool {
        match self.scalar_type() {
            None => true,
            Some(actual) => actual == *ty,
        }
    }

    /// Hashable primary-key form, if the value is of a key type
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Value::Int64(i) => Some(Key::Int(*i)),
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Timestamp(t) => Some(Key::Timestamp(*t)),
            _ => None,
        }
    }

    /// Plain text used in delimited output; `Null` renders as an empty field
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(i) => i.to_string(),
            Value::Float64(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Timestamp(t) => t.format(TIMESTAMP_FORMAT).to_string(),
            Value::Vector(v) => serde_json::to_string(v).unwrap_or_default(),
        }
    }

    /// JSON rendering for CLI output
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int64(i) => serde_json::Value::from(*i),
            Value::Float64(f) => serde_json::Value::from(*f),
            Value::String(s) => serde_json::Value::from(s.as_str()),
            Value::Boolean(b) => serde_json::Value::from(*b),
            Value::Timestamp(_) => serde_json::Value::from(self.to_text()),
            Value::Vector(v) => serde_json::Value::from(v.clone()),
        }
    }

    /// Comparison used by WHERE predicates: numbers compare across
    /// Int64/Float64, everything else only within its own type, and any
    /// comparison involving Null is undefined.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Vector(a), Value::Vector(b)) => a.partial_cmp(b),
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Total order for ORDER BY: Null sorts last, then by type rank
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        if let Some(ord) = self.compare(other) {
            return ord;
        }
        self.type_rank().cmp(&other.type_rank())
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Int64(_) | Value::Float64(_) => 1,
            Value::String(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Vector(_) => 4,
            Value::Null => 5,
        }
    }
}

// Floats compare bitwise so Value can key hash sets (DISTINCT, grouping).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int64(i) => i.hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Vector(v) => {
                for x in v {
                    x.to_bits().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "\"{}\"", s),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int64(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Primary-key value of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        match k {
            Key::Int(i) => Value::Int64(i),
            Key::Str(s) => Value::String(s),
            Key::Timestamp(t) => Value::Timestamp(t),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => write!(f, "{}", s),
            Key::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
        }
    }
}
