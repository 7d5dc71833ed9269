//! Metric instance generation for one payload and phase.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::schema::{MetricConfig, MetricKind, SidecarConfig};
use crate::rules::labels::{labels_for_config, metric_labels};
use crate::rules::path;
use crate::rules::spec::{instrument_spec, MetricInstrumentSpec, Phase};
use crate::rules::value::{extract_values, TypedValue};

/// One concrete observation produced from a single payload evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricInstance {
    /// Values to record, in extraction order.
    pub values: Vec<TypedValue>,
    /// Label pairs attached to every value of this instance.
    pub labels: Vec<(String, String)>,
}

/// Generate the instances to record for one payload in one phase, grouped by
/// instrument spec. Definitions deriving the same spec append to the same
/// instance list, in declared order per filtered fragment.
pub fn metric_instances(
    config: &SidecarConfig,
    payload: &Value,
    phase: Phase,
) -> HashMap<MetricInstrumentSpec, Vec<MetricInstance>> {
    let (metrics, filter) = match phase {
        Phase::Request => (&config.input_metrics, &config.input_content_filter),
        Phase::Response => (&config.output_metrics, &config.output_content_filter),
    };

    let fragments = filtered_fragments(filter, payload);

    let mut outputs: HashMap<MetricInstrumentSpec, Vec<MetricInstance>> = HashMap::new();
    for metric in metrics {
        for fragment in &fragments {
            let values = metric_values(metric, fragment);
            let labels = metric_labels(metric, fragment);
            let spec = instrument_spec(metric, &config.context_labels_from_input);
            outputs
                .entry(spec)
                .or_default()
                .push(MetricInstance { values, labels });
        }
    }
    outputs
}

/// Compute the context labels carried from a request payload to the response
/// phase of the same request. Context only flows forward: the response phase
/// contributes none.
pub fn context_labels(
    config: &SidecarConfig,
    payload: &Value,
    phase: Phase,
) -> Vec<(String, String)> {
    if phase != Phase::Request {
        return Vec::new();
    }

    let fragments = filtered_fragments(&config.input_content_filter, payload);

    let mut labels = Vec::new();
    for label_config in &config.context_labels_from_input {
        for fragment in &fragments {
            labels.extend(labels_for_config(label_config, fragment));
        }
    }
    labels
}

/// An empty filter passes the whole payload through as the only fragment;
/// anything else selects the filter's matches.
fn filtered_fragments<'a>(filter: &str, payload: &'a Value) -> Vec<&'a Value> {
    if filter.is_empty() {
        vec![payload]
    } else {
        path::resolve(filter, payload)
    }
}

fn metric_values(metric: &MetricConfig, fragment: &Value) -> Vec<TypedValue> {
    match &metric.kind {
        Some(MetricKind::SimpleCounter(_)) | None => vec![TypedValue::Integer(1)],
        Some(MetricKind::Value(value)) => extract_values(value.value.as_ref(), fragment),
    }
}
