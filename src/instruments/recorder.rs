//! Recording of metrics for request and response payloads.
//!
//! The functions here sit between the HTTP layer and the extraction engine:
//! they parse body bytes, run the rules, look instruments up by spec, and
//! apply the context-label merge policy. A body that is not JSON records
//! nothing and returns silently; instrumentation never surfaces an error to
//! the request path.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::schema::SidecarConfig;
use crate::instruments::registry::{Instrument, InstrumentRegistry};
use crate::rules::instance::{context_labels, metric_instances};
use crate::rules::spec::Phase;

/// Record metrics for a request payload and return the context labels to
/// carry to the response phase (empty when the body is not parseable).
pub fn record_request_metrics(
    rules: &SidecarConfig,
    instruments: &InstrumentRegistry,
    request_body: &[u8],
) -> Vec<(String, String)> {
    let payload: Value = match serde_json::from_slice(request_body) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::debug!(error = %error, "Request body is not JSON; no metrics recorded");
            return Vec::new();
        }
    };
    let context = context_labels(rules, &payload, Phase::Request);
    record_phase(rules, instruments, &payload, Phase::Request, &context);
    context
}

/// Record metrics for a response payload, attaching the context labels
/// retrieved for the same request.
pub fn record_response_metrics(
    rules: &SidecarConfig,
    instruments: &InstrumentRegistry,
    response_body: &[u8],
    context: &[(String, String)],
) {
    let payload: Value = match serde_json::from_slice(response_body) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::debug!(error = %error, "Response body is not JSON; no metrics recorded");
            return;
        }
    };
    record_phase(rules, instruments, &payload, Phase::Response, context);
}

fn record_phase(
    rules: &SidecarConfig,
    instruments: &InstrumentRegistry,
    payload: &Value,
    phase: Phase,
    context: &[(String, String)],
) {
    let noop = Instrument::noop();
    for (spec, instances) in metric_instances(rules, payload, phase) {
        let instrument = instruments.get(&spec).unwrap_or_else(|| {
            // Unreachable if the registry was built from the same config.
            tracing::warn!(metric = %spec.name, "No instrument registered for derived spec");
            &noop
        });
        for instance in instances {
            let labels = merge_labels(&instance.labels, context);
            for value in &instance.values {
                instrument.record(value, &labels);
            }
        }
    }
}

/// Instance-local labels take precedence; context labels fill only the names
/// the instance did not set. Repeated instance keys collapse to their last
/// pair, matching label semantics of the backing instruments.
fn merge_labels(
    instance: &[(String, String)],
    context: &[(String, String)],
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = instance.iter().cloned().collect();
    for (key, value) in context {
        merged
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_from_toml(toml: &str) -> SidecarConfig {
        toml::from_str(toml).unwrap()
    }

    fn counter_value(instruments: &InstrumentRegistry, name: &str) -> f64 {
        instruments
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| {
                family
                    .get_metric()
                    .iter()
                    .map(|m| m.get_counter().get_value())
                    .sum()
            })
            .unwrap_or(0.0)
    }

    #[test]
    fn test_request_counter_records_one() {
        let rules = rules_from_toml(
            r#"
            [[input_metrics]]
            name = "request_count"
            simple_counter = {}
            "#,
        );
        let instruments = InstrumentRegistry::from_config(&rules);

        let context = record_request_metrics(&rules, &instruments, b"{}");

        assert!(context.is_empty());
        assert_eq!(counter_value(&instruments, "request_count"), 1.0);
    }

    #[test]
    fn test_malformed_body_records_nothing() {
        let rules = rules_from_toml(
            r#"
            [[input_metrics]]
            name = "request_count"
            simple_counter = {}
            "#,
        );
        let instruments = InstrumentRegistry::from_config(&rules);

        let context = record_request_metrics(&rules, &instruments, b"{\"truncated");

        assert!(context.is_empty());
        assert_eq!(counter_value(&instruments, "request_count"), 0.0);
    }

    #[test]
    fn test_response_value_with_context_label() {
        let rules = rules_from_toml(
            r#"
            [[context_labels_from_input]]
            label_key = { static_value = "Model" }
            label_value = { parsed_value = { field_path = ".model", parsed_type = "string" } }

            [[output_metrics]]
            name = "output_values"
            value = { value = { parsed_value = { field_path = ".prediction[0][0]", parsed_type = "float" } } }
            "#,
        );
        let instruments = InstrumentRegistry::from_config(&rules);

        let context =
            record_request_metrics(&rules, &instruments, br#"{"model": "toxicity_v3"}"#);
        assert_eq!(
            context,
            vec![("Model".to_string(), "toxicity_v3".to_string())]
        );

        record_response_metrics(
            &rules,
            &instruments,
            br#"{"prediction": [[0.495]]}"#,
            &context,
        );

        let families = instruments.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "output_values")
            .unwrap();
        let metric = &family.get_metric()[0];
        let histogram = metric.get_histogram();
        assert_eq!(histogram.get_sample_count(), 1);
        assert!((histogram.get_sample_sum() - 0.495).abs() < 1e-9);

        let labels: Vec<(&str, &str)> = metric
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();
        assert_eq!(labels, vec![("Model", "toxicity_v3")]);
    }

    #[test]
    fn test_instance_labels_beat_context_labels() {
        let instance = vec![("Model".to_string(), "own".to_string())];
        let context = vec![
            ("Model".to_string(), "ctx".to_string()),
            ("Extra".to_string(), "filled".to_string()),
        ];
        let merged = merge_labels(&instance, &context);
        assert_eq!(merged.get("Model").map(String::as_str), Some("own"));
        assert_eq!(merged.get("Extra").map(String::as_str), Some("filled"));
    }

    #[test]
    fn test_filtered_request_counts_per_fragment() {
        let rules = rules_from_toml(
            r#"
            input_content_filter = ".instances[*]"

            [[input_metrics]]
            name = "instance_count"
            simple_counter = {}
            "#,
        );
        let instruments = InstrumentRegistry::from_config(&rules);

        record_request_metrics(
            &rules,
            &instruments,
            br#"{"instances": [{"a": 1}, {"a": 2}]}"#,
        );

        assert_eq!(counter_value(&instruments, "instance_count"), 2.0);
    }

    #[test]
    fn test_empty_rules_record_nothing() {
        let rules = SidecarConfig::default();
        let instruments = InstrumentRegistry::from_config(&rules);
        let context = record_request_metrics(&rules, &instruments, b"{}");
        assert!(context.is_empty());
        assert!(instruments.gather().is_empty());
    }
}
