//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check metric names are valid Prometheus identifiers
//! - Check every configured path expression parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::{
    AgentConfig, LabelConfig, MetricConfig, MetricKind, ValueConfig,
};
use crate::rules::path::PathExpr;

/// A single semantic validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("metric name {name:?} is not a valid instrument name")]
    InvalidMetricName { name: String },

    #[error("metric {metric:?}: path expression {expr:?} does not parse")]
    InvalidPath { metric: String, expr: String },

    #[error("content filter {expr:?} does not parse")]
    InvalidContentFilter { expr: String },

    #[error("upstream address must not be empty")]
    EmptyUpstreamAddress,
}

/// Validate semantic constraints over a parsed configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.address.is_empty() {
        errors.push(ValidationError::EmptyUpstreamAddress);
    }

    check_filter(&config.rules.input_content_filter, &mut errors);
    check_filter(&config.rules.output_content_filter, &mut errors);

    for metric in config
        .rules
        .input_metrics
        .iter()
        .chain(config.rules.output_metrics.iter())
    {
        check_metric(metric, &mut errors);
    }
    check_labels("context_labels_from_input", &config.rules.context_labels_from_input, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_metric(metric: &MetricConfig, errors: &mut Vec<ValidationError>) {
    if !is_valid_metric_name(&metric.name) {
        errors.push(ValidationError::InvalidMetricName {
            name: metric.name.clone(),
        });
    }
    if let Some(MetricKind::Value(value)) = &metric.kind {
        check_value_config(&metric.name, value.value.as_ref(), errors);
    }
    check_labels(&metric.name, &metric.labels, errors);
}

fn check_labels(owner: &str, labels: &[LabelConfig], errors: &mut Vec<ValidationError>) {
    for label in labels {
        check_value_config(owner, label.label_key.as_ref(), errors);
        check_value_config(owner, label.label_value.as_ref(), errors);
    }
}

fn check_value_config(
    owner: &str,
    value: Option<&ValueConfig>,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(ValueConfig::ParsedValue(parsed)) = value {
        if PathExpr::parse(&parsed.field_path).is_none() {
            errors.push(ValidationError::InvalidPath {
                metric: owner.to_string(),
                expr: parsed.field_path.clone(),
            });
        }
    }
}

fn check_filter(expr: &str, errors: &mut Vec<ValidationError>) {
    // An empty filter means "whole payload" and never reaches the resolver.
    if !expr.is_empty() && PathExpr::parse(expr).is_none() {
        errors.push(ValidationError::InvalidContentFilter {
            expr: expr.to_string(),
        });
    }
}

/// Prometheus metric name charset: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
