//! Instrument identity derivation.
//!
//! An instrument's identity depends only on configuration, never on payload
//! content: the same `MetricConfig` must derive a byte-for-byte identical
//! spec at startup (registry construction) and during request processing
//! (instance grouping).

use crate::config::schema::{LabelConfig, MetricConfig, MetricKind, SidecarConfig};
use crate::rules::labels::label_keys;

/// Traffic phase an extraction runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The request body, before the upstream handler runs.
    Request,
    /// The response body, after the upstream handler completes.
    Response,
}

/// The type of instrument backing a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonically increasing count.
    Counter,
    /// Value distribution (histogram).
    Distribution,
}

/// The primitive type an instrument records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricValueType {
    Integer,
    Float,
}

/// Canonical identity of a metric instrument.
///
/// Equal specs compare equal and hash identically regardless of construction
/// path; the instrument registry and the instance generator both key on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricInstrumentSpec {
    pub kind: InstrumentKind,
    pub value_type: MetricValueType,
    pub name: String,
    pub label_names: Vec<String>,
}

/// Derive the ordered instrument specs for one phase of a configuration.
///
/// Duplicate definitions are not collapsed here; collapsing happens where the
/// spec is used as a map key.
pub fn instrument_specs(config: &SidecarConfig, phase: Phase) -> Vec<MetricInstrumentSpec> {
    let metrics = match phase {
        Phase::Request => &config.input_metrics,
        Phase::Response => &config.output_metrics,
    };
    metrics
        .iter()
        .map(|metric| instrument_spec(metric, &config.context_labels_from_input))
        .collect()
}

/// Derive the spec for one metric definition. Context label names are
/// appended after the metric's own label names for both phases, since context
/// labels attach to response metrics and to the request metrics they were
/// computed alongside.
pub fn instrument_spec(
    metric: &MetricConfig,
    context_labels: &[LabelConfig],
) -> MetricInstrumentSpec {
    let (kind, value_type) = match &metric.kind {
        Some(MetricKind::SimpleCounter(_)) | None => {
            (InstrumentKind::Counter, MetricValueType::Integer)
        }
        Some(MetricKind::Value(_)) => (InstrumentKind::Distribution, MetricValueType::Float),
    };

    let mut label_names = label_keys(&metric.labels);
    label_names.extend(label_keys(context_labels));

    MetricInstrumentSpec {
        kind,
        value_type,
        name: metric.name.clone(),
        label_names,
    }
}
