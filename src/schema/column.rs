//! Typed column definitions

use crate::value::{ScalarType, Value};

/// A named column with a fixed scalar type and an optional default.
///
/// The default fills the column when a source does not provide it.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedColumn {
    pub name: String,
    pub scalar_type: ScalarType,
    pub default: Option<Value>,
}

impl TypedColumn {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Column clause as it appears inside a CREATE TABLE statement
    pub fn ddl(&self) -> String {
        match &self.default {
            Some(v) if !v.is_null() => {
                format!("{} {} DEFAULT {}", self.name, self.scalar_type, ddl_literal(v))
            }
            _ => format!("{} {}", self.name, self.scalar_type),
        }
    }
}

fn ddl_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Timestamp(_) => format!("timestamp('{}')", value.to_text()),
        Value::Float64(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.1}", f),
        other => other.to_text(),
    }
}
