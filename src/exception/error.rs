//! Handler error type and failure classification.
//!
//! Panics are classified by payload. A `BusinessFailure` payload keeps its
//! code and message, an `anyhow::Error` payload is classified like a returned
//! error, and anything else (including `panic!("...")` strings) is a generic
//! 50000 failure. Use `std::panic::panic_any(BusinessFailure::new(..))` for a
//! panic the client should see.

use std::any::Any;
use std::backtrace::Backtrace;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::exception::business::BusinessFailure;

/// A failure recovered while handling a request, already classified.
#[derive(Debug)]
pub enum Failure {
    /// Client-facing failure; its code and message go on the wire.
    Business {
        failure: BusinessFailure,
        backtrace: Backtrace,
    },
    /// Any other error. Only logged.
    Error {
        error: anyhow::Error,
        backtrace: Backtrace,
    },
    /// Panic payload that is neither of the above, rendered as text.
    Panic { payload: String },
}

impl Failure {
    /// Business if a `BusinessFailure` sits anywhere in the error chain.
    pub fn classify(error: anyhow::Error, backtrace: Backtrace) -> Self {
        let business = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<BusinessFailure>())
            .cloned();
        match business {
            Some(failure) => Failure::Business { failure, backtrace },
            None => Failure::Error { error, backtrace },
        }
    }

    /// Classify a panic payload caught at the request boundary.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let payload = match payload.downcast::<BusinessFailure>() {
            Ok(failure) => {
                return Failure::Business {
                    failure: *failure,
                    backtrace: Backtrace::force_capture(),
                }
            }
            Err(other) => other,
        };
        let payload = match payload.downcast::<anyhow::Error>() {
            Ok(error) => return Failure::classify(*error, Backtrace::force_capture()),
            Err(other) => other,
        };

        let payload = if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else {
            "non-string panic payload".to_string()
        };
        Failure::Panic { payload }
    }

    /// The business failure, if this is one.
    pub fn business(&self) -> Option<&BusinessFailure> {
        match self {
            Failure::Business { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Business { failure, .. } => write!(f, "{} ({})", failure.message, failure.code),
            Failure::Error { error, .. } => write!(f, "{error:#}"),
            Failure::Panic { payload } => write!(f, "panic: {payload}"),
        }
    }
}

/// Error type for handlers.
///
/// Anything convertible to `anyhow::Error` converts into it, so `?` works on
/// every error. Classification and backtrace capture happen at conversion
/// time, which is as close to the failure site as the boundary can get.
#[derive(Debug)]
pub struct AppError {
    failure: Failure,
}

impl AppError {
    /// Business failure with an explicit code, e.g. `codes::FORBIDDEN`.
    pub fn business(code: i32, message: impl Into<String>) -> Self {
        BusinessFailure::with_code(code, message).into()
    }

    pub(crate) fn from_failure(failure: Failure) -> Self {
        Self { failure }
    }

    /// The classified failure.
    pub fn failure(&self) -> &Failure {
        &self.failure
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            failure: Failure::classify(err.into(), Backtrace::force_capture()),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.failure.fmt(f)
    }
}

/// Failure waiting for the exception translator, carried in the response
/// extensions.
#[derive(Debug, Clone)]
pub(crate) struct PendingFailure(pub(crate) Arc<Failure>);

impl IntoResponse for AppError {
    /// Placeholder only. The exception translator replaces it with an
    /// envelope; without the translator the client sees a bare 500.
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(PendingFailure(Arc::new(self.failure)));
        response
    }
}
