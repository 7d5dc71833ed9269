//! Instrument registry and payload recorders.
//!
//! # Data Flow
//! ```text
//! SidecarConfig
//!     → registry.rs (derive specs → create backing Prometheus collectors,
//!                    once, at startup)
//! request/response body bytes
//!     → recorder.rs (parse JSON → rules engine → look up instrument by
//!                    spec → record values with merged labels)
//! ```

pub mod recorder;
pub mod registry;

pub use recorder::{record_request_metrics, record_response_metrics};
pub use registry::{Instrument, InstrumentRegistry};
