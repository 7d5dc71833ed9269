//! Typed scalar extraction from payloads.

use std::fmt;

use serde_json::Value;

use crate::config::schema::{ParsedType, StaticValue, ValueConfig};
use crate::rules::path;

/// A scalar extracted from configuration or payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl TypedValue {
    /// Numeric view for distribution observations. Text never records as a
    /// number; coercion to a numeric type is the extractor's job.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer(i) => Some(*i as f64),
            TypedValue::Float(f) => Some(*f),
            TypedValue::Text(_) => None,
        }
    }

    /// Counter increment view; negatives and non-numerics clamp to 0.
    pub fn as_increment(&self) -> u64 {
        match self {
            TypedValue::Integer(i) => (*i).max(0) as u64,
            TypedValue::Float(f) if *f > 0.0 => *f as u64,
            _ => 0,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(i) => write!(f, "{i}"),
            TypedValue::Float(v) => write!(f, "{v}"),
            TypedValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Resolve a value config into zero or more typed scalars.
///
/// A static value ignores the payload and always yields one element. A parsed
/// value yields one element per path match that coerces cleanly to the target
/// type; matches that fail coercion are dropped without discarding their
/// siblings. An unset config yields nothing.
pub fn extract_values(config: Option<&ValueConfig>, payload: &Value) -> Vec<TypedValue> {
    match config {
        Some(ValueConfig::StaticValue(literal)) => vec![match literal {
            StaticValue::Integer(i) => TypedValue::Integer(*i),
            StaticValue::Float(f) => TypedValue::Float(*f),
            StaticValue::Text(s) => TypedValue::Text(s.clone()),
        }],
        Some(ValueConfig::ParsedValue(parsed)) => path::resolve(&parsed.field_path, payload)
            .into_iter()
            .filter_map(|m| coerce(m, parsed.parsed_type))
            .collect(),
        None => Vec::new(),
    }
}

fn coerce(value: &Value, target: ParsedType) -> Option<TypedValue> {
    match target {
        ParsedType::Float => match value {
            Value::Number(n) => n.as_f64().map(TypedValue::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(TypedValue::Float),
            Value::Bool(b) => Some(TypedValue::Float(if *b { 1.0 } else { 0.0 })),
            _ => None,
        },
        ParsedType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(TypedValue::Integer),
            Value::String(s) => s.trim().parse::<i64>().ok().map(TypedValue::Integer),
            Value::Bool(b) => Some(TypedValue::Integer(i64::from(*b))),
            _ => None,
        },
        ParsedType::String => Some(match value {
            Value::String(s) => TypedValue::Text(s.clone()),
            other => TypedValue::Text(other.to_string()),
        }),
    }
}
