//! Label synthesis from key/value expression pairs.
//!
//! # Design Decisions
//! - A label config whose key or value resolves to nothing produces no pairs
//!   at all; labels are never padded with blanks
//! - Parallel key/value sequences of unequal length wrap modulo their own
//!   length, so a single static key can label every element of a wildcard
//!   match (and equal-length sequences zip element-wise)
//! - Label keys must resolve without a payload: a config whose key yields
//!   nothing against an empty object is excluded from instrument identity and
//!   skipped during instance synthesis, keeping the two consistent

use serde_json::{Map, Value};

use crate::config::schema::{LabelConfig, MetricConfig};
use crate::rules::value::extract_values;

/// Resolve one label config into ordered key/value string pairs.
pub fn labels_for_config(config: &LabelConfig, payload: &Value) -> Vec<(String, String)> {
    let keys = extract_values(config.label_key.as_ref(), payload);
    let values = extract_values(config.label_value.as_ref(), payload);
    if keys.is_empty() || values.is_empty() {
        return Vec::new();
    }
    let count = keys.len().max(values.len());
    (0..count)
        .map(|i| {
            (
                keys[i % keys.len()].to_string(),
                values[i % values.len()].to_string(),
            )
        })
        .collect()
}

/// The full label set of a metric against one payload fragment: the
/// concatenation, in configured order, of every label config's pairs.
pub fn metric_labels(metric: &MetricConfig, payload: &Value) -> Vec<(String, String)> {
    metric
        .labels
        .iter()
        .filter(|config| has_resolvable_key(config))
        .flat_map(|config| labels_for_config(config, payload))
        .collect()
}

/// Label names contributed by a list of label configs, resolved without a
/// payload. Used for instrument identity, which must be fixed before any
/// payload exists.
pub fn label_keys(configs: &[LabelConfig]) -> Vec<String> {
    let empty = empty_payload();
    configs
        .iter()
        .flat_map(|config| {
            extract_values(config.label_key.as_ref(), &empty)
                .into_iter()
                .map(|key| key.to_string())
        })
        .collect()
}

fn has_resolvable_key(config: &LabelConfig) -> bool {
    !extract_values(config.label_key.as_ref(), &empty_payload()).is_empty()
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}
