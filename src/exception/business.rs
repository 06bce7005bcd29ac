//! Business failures.

use axum::http::StatusCode;
use thiserror::Error;

use crate::resp::codes;

/// A client-facing failure with an application-defined code.
///
/// Return it (through `?` and [`AppError`](crate::exception::AppError)) from
/// a handler; the exception translator turns it into
/// `{"err_code": code, "err_msg": message}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BusinessFailure {
    pub code: i32,
    pub message: String,
}

impl BusinessFailure {
    /// Failure with the generic bad-request code (40000).
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(codes::BAD_REQUEST, message)
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Transport status for this failure.
    pub fn status(&self) -> StatusCode {
        codes::http_status(self.code)
    }
}
