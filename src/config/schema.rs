//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sidecar.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the sidecar process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Listener configuration (bind address, body cap).
    pub listener: ListenerConfig,

    /// Upstream service the sidecar fronts.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Metric extraction rules, flattened so the rule tables sit at the
    /// top level of the config file.
    #[serde(flatten)]
    pub rules: SidecarConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered body size in bytes (requests and responses).
    pub max_body_size: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Upstream (instrumented service) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:8501").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8501".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the metrics scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics scrape endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Metric extraction rules.
///
/// Holds the ordered metric definitions for each traffic phase, the context
/// labels carried from request to response, and the per-phase content
/// filters. Consumed read-only by the extraction engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SidecarConfig {
    /// Metrics extracted from request bodies.
    pub input_metrics: Vec<MetricConfig>,

    /// Metrics extracted from response bodies.
    pub output_metrics: Vec<MetricConfig>,

    /// Labels computed from the request body and attached to the metrics of
    /// both phases of the same request.
    pub context_labels_from_input: Vec<LabelConfig>,

    /// Path expression selecting request-body fragments to process
    /// independently. Empty = whole payload.
    pub input_content_filter: String,

    /// Path expression selecting response-body fragments to process
    /// independently. Empty = whole payload.
    pub output_content_filter: String,
}

/// One metric definition.
///
/// `name` is the instrument identity together with the derived label-name
/// set; two definitions that derive the identical spec share one instrument.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricConfig {
    /// Instrument name (Prometheus metric name).
    pub name: String,

    /// Metric kind. Absent = simple counter.
    #[serde(flatten)]
    pub kind: Option<MetricKind>,

    /// Ordered label definitions for this metric.
    #[serde(default)]
    pub labels: Vec<LabelConfig>,
}

/// The kind of observation a metric records.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Every instance records a count of 1.
    SimpleCounter(SimpleCounter),

    /// Each instance records values extracted from the payload.
    Value(ValueMetric),
}

/// Marker table for `simple_counter = {}` in config files.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SimpleCounter {}

/// Configuration of a value-distribution metric.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ValueMetric {
    /// Where the recorded value comes from.
    pub value: Option<ValueConfig>,
}

/// One label definition: a key expression paired with a value expression.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LabelConfig {
    /// Expression yielding the label name(s).
    pub label_key: Option<ValueConfig>,

    /// Expression yielding the label value(s).
    pub label_value: Option<ValueConfig>,
}

/// A value source: either a literal or a typed payload extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueConfig {
    /// A literal, independent of any payload.
    StaticValue(StaticValue),

    /// A path expression evaluated against the payload.
    ParsedValue(ParsedValue),
}

/// A static literal value.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StaticValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A payload extraction: path expression plus target primitive type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParsedValue {
    /// Dot/bracket path into the JSON payload (e.g. ".prediction[0][0]").
    pub field_path: String,

    /// Primitive type each match is coerced to.
    pub parsed_type: ParsedType,
}

/// Target type for parsed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedType {
    Float,
    Integer,
    String,
}
