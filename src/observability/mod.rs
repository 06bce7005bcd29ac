//! Observability.
//!
//! # Data Flow
//! ```text
//! every subsystem → tracing events (structured fields)
//!     → logging.rs subscriber (JSON in prod, text otherwise)
//! requests → access log middleware (status, business code, latency)
//! ```

pub mod logging;

pub use logging::{subscriber, subscriber_with_writer};
