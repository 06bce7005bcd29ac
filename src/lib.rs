//! Service Shell Library
//!
//! Runtime shell around an axum HTTP service: ordered lifecycle events,
//! a predicate-gated interceptor chain, failure-to-envelope translation and
//! pooled response envelopes.

pub mod config;
pub mod exception;
pub mod http;
pub mod lifecycle;
pub mod listener;
pub mod observability;
pub mod resp;

pub use crate::config::AppConfig;
pub use crate::exception::{AppError, BusinessFailure};
pub use crate::http::{Exchange, MethodInterceptor, Middleware};
pub use crate::lifecycle::{Application, LifecycleError, ServerHandle, ServerState, Shutdown};
pub use crate::listener::{ApplicationEventListener, ConfigListener, Listeners};
pub use crate::resp::{Envelope, EnvelopePool, Responder};
