//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → shared via Arc to the proxy and the extraction engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the extraction engine only ever reads it
//! - All fields have defaults so an absent or empty file yields a working
//!   (all-empty-rules) sidecar
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AgentConfig, LabelConfig, ListenerConfig, MetricConfig, MetricKind, ObservabilityConfig,
    ParsedType, ParsedValue, SidecarConfig, StaticValue, UpstreamConfig, ValueConfig, ValueMetric,
};
