//! Rule-driven metric extraction sidecar.
//!
//! A buffering reverse proxy that sits in front of a served model endpoint,
//! inspects JSON request and response payloads, and records configured fields
//! as named, labeled Prometheus observations.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                METRIC SIDECAR                │
//!                   │                                              │
//!   Client Request  │  ┌────────┐   ┌─────────┐   ┌─────────────┐ │
//!   ────────────────┼─▶│  http  │──▶│  rules  │──▶│ instruments │ │
//!                   │  │ server │   │ REQUEST │   │  registry   │ │
//!                   │  └───┬────┘   └────┬────┘   └─────────────┘ │
//!                   │      │ forward     │ context labels         │
//!                   │      ▼             ▼                        │
//!                   │  ┌────────┐   ┌───────────┐                 │
//!                   │  │upstream│   │ correlate │                 │
//!                   │  │ client │   │ (per-req) │                 │
//!                   │  └───┬────┘   └─────┬─────┘                 │
//!   Client Response │      │              │                       │
//!   ◀───────────────┼──────┴─▶ rules RESPONSE ─▶ instruments      │
//!                   │                                              │
//!                   │  /metrics scrape app ◀── prometheus registry │
//!                   └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod instruments;
pub mod rules;

// Cross-cutting concerns
pub mod correlate;
pub mod observability;

pub use config::schema::{AgentConfig, SidecarConfig};
pub use correlate::ContextCorrelator;
pub use http::SidecarServer;
pub use instruments::InstrumentRegistry;
