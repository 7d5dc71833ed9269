//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (buffer request body, REQUEST-phase recording)
//!     → upstream client (forward request unchanged)
//!     → server.rs (buffer response body, RESPONSE-phase recording)
//!     → Send to client
//! ```

pub mod server;

pub use server::SidecarServer;
