//! Conversion of raw source values to declared column types

use crate::value::{ScalarType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const TIMESTAMP_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse one text literal. Empty text is `Null`; `None` means the text is
/// not a valid literal of `ty`. Strings are kept verbatim, surrounding
/// whitespace included; other types ignore it.
pub fn parse_text(raw: &str, ty: &ScalarType) -> Option<Value> {
    if *ty == ScalarType::String {
        return Some(if raw.is_empty() {
            Value::Null
        } else {
            Value::String(raw.to_string())
        });
    }
    let text = raw.trim();
    if text.is_empty() {
        return Some(Value::Null);
    }
    match ty {
        ScalarType::String => Some(Value::String(raw.to_string())),
        ScalarType::Int64 => parse_int(text).map(Value::Int64),
        ScalarType::Float64 => text.parse::<f64>().ok().map(Value::Float64),
        ScalarType::Boolean => parse_bool(text).map(Value::Boolean),
        ScalarType::Timestamp => parse_timestamp(text).map(Value::Timestamp),
        ScalarType::Vector(dim) => {
            let items: Vec<f64> = serde_json::from_str(text).ok()?;
            (items.len() == *dim).then_some(Value::Vector(items))
        }
    }
}

/// Parse one delimited field. A field equal to `null_marker` is `Null`.
/// With a non-empty marker an empty field in a string column is the empty
/// string rather than `Null`.
pub fn parse_field(raw: &str, ty: &ScalarType, null_marker: &str) -> Option<Value> {
    if raw == null_marker {
        return Some(Value::Null);
    }
    match ty {
        ScalarType::String => Some(Value::String(raw.to_string())),
        _ => parse_text(raw, ty),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(i);
    }
    // `12.0` as written by dataframe exports of nullable integer columns
    let f = text.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.f]` and plain dates (midnight)
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for layout in TIMESTAMP_LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert an already-typed value to `ty`, widening where no information is
/// lost and re-parsing strings.
pub fn coerce_value(value: Value, ty: &ScalarType) -> Option<Value> {
    if value.conforms_to(ty) {
        return Some(value);
    }
    match (value, ty) {
        (Value::String(s), _) => parse_text(&s, ty),
        (Value::Int64(i), ScalarType::Float64) => Some(Value::Float64(i as f64)),
        (Value::Float64(f), ScalarType::Int64) => {
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(Value::Int64(f as i64))
        }
        (Value::Int64(i), ScalarType::Boolean) if i == 0 || i == 1 => Some(Value::Boolean(i == 1)),
        (Value::Int64(i), ScalarType::String) => Some(Value::String(i.to_string())),
        _ => None,
    }
}

/// Typed value from an untyped JSON/YAML literal (config defaults, query
/// parameters).
pub fn from_json(json: &serde_json::Value, ty: &ScalarType) -> Option<Value> {
    let value = json_to_value(json)?;
    coerce_value(value, ty)
}

/// Best-effort typed value of a JSON literal, without a target type
pub fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int64)
            .or_else(|| n.as_f64().map(Value::Float64)),
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(serde_json::Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .map(Value::Vector),
        serde_json::Value::Object(_) => None,
    }
}
