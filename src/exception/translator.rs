//! Failure → envelope translation.
//!
//! ```text
//! translate_failures (from_fn)              placeholder → envelope
//!   └─ CatchPanicLayer(panic_response)      middleware/interceptor panics
//!        └─ ... CORS, interceptors ...      headers land on the placeholder
//!             └─ capture_context (from_fn)  request context → placeholder
//!                  └─ CatchPanicLayer       handler panics
//!                       └─ handler → Err(AppError) → PendingFailure
//! ```
//!
//! `translate` is the only place a failure becomes a wire response. The
//! envelope is bound to the request context as the handler saw it and keeps
//! every header inner layers put on the placeholder.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};

use axum::extract::Request;
use axum::http::{header, HeaderMap};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::exception::error::{AppError, Failure, PendingFailure};
use crate::http::middleware::Middleware;
use crate::resp::{RequestContext, Responder};

/// Frames shown for business failures.
const EXCERPT_FRAMES: usize = 2;

/// Frames from these paths are plumbing, not the failure site.
const PLUMBING: [&str; 10] = [
    "std::",
    "core::",
    "alloc::",
    "anyhow::",
    "<std::",
    "<core::",
    "<alloc::",
    "<anyhow::",
    "service_shell::exception::",
    "<service_shell::exception::",
];

/// Write exactly one envelope for `failure`.
pub fn translate(failure: &Failure, responder: &Responder) -> Response {
    match failure {
        Failure::Business { failure, backtrace } => {
            tracing::warn!(
                code = failure.code,
                message = %failure.message,
                at = %excerpt(backtrace, EXCERPT_FRAMES),
                "Business failure"
            );
            responder
                .envelope()
                .with_result(failure.code, &failure.message, None)
                .send_with(failure.status())
        }
        Failure::Error { error, backtrace } => {
            tracing::error!(error = ?error, backtrace = %backtrace, "Request failed");
            responder.server_error(None)
        }
        Failure::Panic { payload } => {
            tracing::error!(panic = %payload, "Request panicked");
            responder.server_error(None)
        }
    }
}

/// Middleware replacing failure placeholders with envelopes.
pub async fn translate_failures(request: Request, next: Next) -> Response {
    let responder = Responder::from_extensions(request.extensions());
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let Some(PendingFailure(failure)) = parts.extensions.remove::<PendingFailure>() else {
        return Response::from_parts(parts, body);
    };
    let responder = match parts.extensions.remove::<RequestContext>() {
        Some(context) => responder.with_context(context),
        None => responder,
    };

    let mut translated = translate(&failure, &responder);
    carry_headers(&parts.headers, translated.headers_mut());
    translated
}

/// Copy placeholder headers the envelope does not set itself.
fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for name in from.keys() {
        if *name == header::CONTENT_TYPE || *name == header::CONTENT_LENGTH || to.contains_key(name) {
            continue;
        }
        for value in from.get_all(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Attach the request context to failure placeholders.
///
/// Runs next to the handler, so a trace id set by an interceptor or an inner
/// layer is the one the failure envelope carries.
pub async fn capture_context(request: Request, next: Next) -> Response {
    let context = RequestContext::from_extensions(request.extensions());
    let mut response = next.run(request).await;
    if response.extensions().get::<PendingFailure>().is_some() {
        response.extensions_mut().insert(context);
    }
    response
}

/// Innermost half of the failure boundary, installed around the routes.
pub(crate) fn failure_context() -> Middleware {
    Middleware::new("failure_context", |router| {
        router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(capture_context))
    })
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    AppError::from_failure(Failure::from_panic(payload)).into_response()
}

/// The failure boundary: panic catcher wrapped by the translator.
pub fn exception_translator() -> Middleware {
    Middleware::new("exception_translator", |router| {
        router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(translate_failures))
    })
}

/// First `frames` frames outside std and this module, one line.
fn excerpt(backtrace: &Backtrace, frames: usize) -> String {
    if backtrace.status() != BacktraceStatus::Captured {
        return String::new();
    }

    let rendered = backtrace.to_string();
    let mut lines = rendered.lines().peekable();
    let mut picked = Vec::with_capacity(frames);
    while let Some(line) = lines.next() {
        let Some((index, symbol)) = line.trim_start().split_once(": ") else {
            continue;
        };
        if !index.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let location = lines
            .next_if(|l| l.trim_start().starts_with("at "))
            .map(str::trim);
        if PLUMBING.iter().any(|p| symbol.starts_with(p)) {
            continue;
        }
        picked.push(match location {
            Some(at) => format!("{symbol} {at}"),
            None => symbol.to_string(),
        });
        if picked.len() == frames {
            break;
        }
    }
    picked.join(" <- ")
}
