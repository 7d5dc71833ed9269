//! Rule-driven metric extraction engine.
//!
//! # Data Flow
//! ```text
//! SidecarConfig (immutable)
//!     → spec.rs      (derive instrument identities, payload-independent)
//!     → instance.rs  (per payload + phase: filter fragments, extract
//!                     values and labels, group instances by spec)
//!         → path.rs   (path-expression matches over the JSON tree)
//!         → value.rs  (typed scalar extraction and coercion)
//!         → labels.rs (key/value pairing with modulo wrap)
//! ```
//!
//! # Design Decisions
//! - Every function here is pure with respect to configuration and payload;
//!   nothing blocks, allocates shared state, or returns errors to callers
//! - Extraction failures degrade per element: a bad coercion drops that one
//!   value, an unresolvable path yields no matches, a non-JSON body yields no
//!   metrics for that phase

pub mod instance;
pub mod labels;
pub mod path;
pub mod spec;
pub mod value;

pub use instance::{context_labels, metric_instances, MetricInstance};
pub use spec::{instrument_specs, InstrumentKind, MetricInstrumentSpec, MetricValueType, Phase};
pub use value::TypedValue;
