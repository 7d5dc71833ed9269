//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; level configurable via config and
//!   environment
//! - Metrics exposition is a separate application on its own address so the
//!   scrape path never mixes with proxied traffic

pub mod exposition;
pub mod logging;
