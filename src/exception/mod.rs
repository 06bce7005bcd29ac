//! Failure handling at the request boundary.
//!
//! # Data Flow
//! ```text
//! handler Err(E) ──?──→ AppError (classify + backtrace) ──→ PendingFailure
//! handler panic ──→ CatchPanicLayer ──→ PendingFailure
//! PendingFailure ──→ translate_failures ──→ one envelope
//! ```
//!
//! # Design Decisions
//! - Business failures keep their code and message on the wire
//! - Anything else is logged in full and answered with the generic 50000
//!   envelope; details never reach the client

pub mod business;
pub mod error;
pub mod translator;

pub use business::BusinessFailure;
pub use error::{AppError, Failure};
pub use translator::{exception_translator, translate};
