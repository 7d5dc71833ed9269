//! Instrument creation and the spec-keyed registry.
//!
//! # Design Decisions
//! - One explicitly owned `prometheus::Registry` per sidecar; no global state
//! - Instruments are created once at startup and looked up (never re-derived)
//!   during request processing
//! - Anything that fails at instrument creation degrades to a no-op
//!   instrument: the metrics path must never fail the proxied request

use std::collections::HashMap;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::config::schema::SidecarConfig;
use crate::rules::spec::{instrument_specs, InstrumentKind, MetricInstrumentSpec, Phase};
use crate::rules::value::TypedValue;

enum Backend {
    Counter(IntCounterVec),
    Distribution(HistogramVec),
    Noop,
}

/// A live recording target for one instrument spec.
pub struct Instrument {
    label_names: Vec<String>,
    backend: Backend,
}

impl Instrument {
    pub fn noop() -> Self {
        Self {
            label_names: Vec::new(),
            backend: Backend::Noop,
        }
    }

    /// Record one value. Label values are picked out of `labels` in the
    /// instrument's label-name order; names absent from the map record as the
    /// empty string.
    pub fn record(&self, value: &TypedValue, labels: &HashMap<String, String>) {
        let ordered: Vec<&str> = self
            .label_names
            .iter()
            .map(|name| labels.get(name).map(String::as_str).unwrap_or(""))
            .collect();
        match &self.backend {
            Backend::Counter(counter) => {
                counter.with_label_values(&ordered).inc_by(value.as_increment());
            }
            Backend::Distribution(histogram) => match value.as_f64() {
                Some(v) => histogram.with_label_values(&ordered).observe(v),
                None => tracing::debug!(
                    value = %value,
                    "Dropping non-numeric distribution observation"
                ),
            },
            Backend::Noop => {}
        }
    }
}

/// Owned mapping from instrument spec to live instrument, plus the Prometheus
/// registry backing the scrape endpoint.
pub struct InstrumentRegistry {
    registry: Registry,
    instruments: HashMap<MetricInstrumentSpec, Instrument>,
}

impl InstrumentRegistry {
    /// Create every instrument the configuration calls for. Specs derived
    /// identically from both phases collapse into one instrument.
    pub fn from_config(rules: &SidecarConfig) -> Self {
        let registry = Registry::new();
        let mut instruments = HashMap::new();
        for phase in [Phase::Request, Phase::Response] {
            for spec in instrument_specs(rules, phase) {
                if !instruments.contains_key(&spec) {
                    let instrument = initialize_instrument(&spec, &registry);
                    instruments.insert(spec, instrument);
                }
            }
        }
        tracing::info!(count = instruments.len(), "Instrument registry initialized");
        Self {
            registry,
            instruments,
        }
    }

    pub fn get(&self, spec: &MetricInstrumentSpec) -> Option<&Instrument> {
        self.instruments.get(spec)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Current accumulated state in the Prometheus text exposition format.
    pub fn encode_text(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(error) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %error, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Raw metric families, for assertions in tests.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

fn initialize_instrument(spec: &MetricInstrumentSpec, registry: &Registry) -> Instrument {
    // Repeated keys across label configs collapse to one Prometheus label.
    let mut label_names: Vec<String> = Vec::new();
    for name in &spec.label_names {
        if !label_names.contains(name) {
            label_names.push(name.clone());
        }
    }
    let name_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
    let help = format!("Values recorded for rule '{}'", spec.name);

    let backend = match spec.kind {
        InstrumentKind::Counter => {
            match IntCounterVec::new(Opts::new(spec.name.clone(), help), &name_refs) {
                Ok(counter) => {
                    register(registry, Box::new(counter.clone()), &spec.name);
                    Backend::Counter(counter)
                }
                Err(error) => {
                    tracing::warn!(metric = %spec.name, error = %error, "Failed to create counter");
                    Backend::Noop
                }
            }
        }
        InstrumentKind::Distribution => {
            match HistogramVec::new(HistogramOpts::new(spec.name.clone(), help), &name_refs) {
                Ok(histogram) => {
                    register(registry, Box::new(histogram.clone()), &spec.name);
                    Backend::Distribution(histogram)
                }
                Err(error) => {
                    tracing::warn!(metric = %spec.name, error = %error, "Failed to create histogram");
                    Backend::Noop
                }
            }
        }
    };

    Instrument {
        label_names,
        backend,
    }
}

fn register(registry: &Registry, collector: Box<dyn prometheus::core::Collector>, name: &str) {
    if let Err(error) = registry.register(collector) {
        tracing::warn!(
            metric = %name,
            error = %error,
            "Failed to register instrument; its observations will not be exported"
        );
    }
}
