//! Path expressions over JSON trees.
//!
//! # Responsibilities
//! - Parse dot/bracket path expressions (`.field`, `[n]`, `[*]`)
//! - Normalize unrooted expressions (leading `.` or `[` gets a `$` root)
//! - Evaluate an expression to an ordered sequence of matched values
//!
//! # Design Decisions
//! - Wildcards expand arrays and object children in encounter order; that
//!   order drives label zipping downstream
//! - Missing paths, type mismatches, and unparseable expressions all resolve
//!   to an empty match list; the resolver never returns an error

use serde_json::Value;

/// One step of a parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Object field access (`.name` or `['name']`).
    Field(String),
    /// Array index access (`[n]`).
    Index(usize),
    /// Expansion of all array elements or object values (`[*]`).
    Wildcard,
}

/// A parsed path expression, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<Segment>,
}

impl PathExpr {
    /// Parse an expression. Returns `None` when the expression is empty or
    /// malformed.
    pub fn parse(expr: &str) -> Option<Self> {
        if expr.is_empty() {
            return None;
        }
        let normalized = normalize(expr);
        let mut rest = normalized.as_str();
        rest = rest.strip_prefix('$').unwrap_or(rest);

        let mut segments = Vec::new();
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return None;
                }
                segments.push(Segment::Field(after[..end].to_string()));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']')?;
                segments.push(bracket_segment(after[..end].trim())?);
                rest = &after[end + 1..];
            } else {
                // A bare field name is only valid as the first segment
                // (e.g. "predictions[0]").
                if !segments.is_empty() {
                    return None;
                }
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                segments.push(Segment::Field(rest[..end].to_string()));
                rest = &rest[end..];
            }
        }
        Some(Self { segments })
    }

    /// Evaluate against a JSON tree, returning matches in encounter order.
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Field(name) => {
                        if let Some(child) = value.as_object().and_then(|o| o.get(name)) {
                            next.push(child);
                        }
                    }
                    Segment::Index(index) => {
                        if let Some(child) = value.as_array().and_then(|a| a.get(*index)) {
                            next.push(child);
                        }
                    }
                    Segment::Wildcard => match value {
                        Value::Array(items) => next.extend(items.iter()),
                        Value::Object(map) => next.extend(map.values()),
                        _ => {}
                    },
                }
            }
            current = next;
        }
        current
    }
}

fn bracket_segment(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    if let Some(quoted) = unquote(inner) {
        return Some(Segment::Field(quoted.to_string()));
    }
    inner.parse::<usize>().ok().map(Segment::Index)
}

fn unquote(inner: &str) -> Option<&str> {
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

/// Prefix a `$` root marker when the expression starts with `.` or `[`.
pub fn normalize(expr: &str) -> String {
    if expr.starts_with('.') || expr.starts_with('[') {
        format!("${expr}")
    } else {
        expr.to_string()
    }
}

/// Parse and evaluate in one step; any failure yields no matches.
pub fn resolve<'a>(expr: &str, tree: &'a Value) -> Vec<&'a Value> {
    match PathExpr::parse(expr) {
        Some(parsed) => parsed.resolve(tree),
        None => Vec::new(),
    }
}
