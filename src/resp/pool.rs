//! Envelope pool.
//!
//! ```text
//! acquire(ctx) ──▶ PooledEnvelope ──with_result──▶ send ──▶ Response
//!      ▲                                            │
//!      └────────────── reset + release ◀────── Drop ┘
//! ```
//!
//! `PooledEnvelope` is move-only, so an instance has exactly one holder
//! between acquire and release. Release happens in `Drop`: the envelope goes
//! back blank even when serialization fails or the guard is never sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde_json::Value;

use crate::resp::context::RequestContext;
use crate::resp::envelope::{Envelope, ResponseBody};

/// Idle envelopes kept beyond this are dropped instead of pooled.
const MAX_IDLE: usize = 1024;

const FALLBACK_BODY: &str =
    r#"{"err_code":50000,"err_msg":"server error, please contact the administrator"}"#;

type Factory = dyn Fn() -> Box<dyn ResponseBody> + Send + Sync;

/// Business code of the envelope a response carries.
///
/// Attached to the response extensions so outer layers (access log) can see
/// it without parsing the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCode(pub i32);

/// Shared free list of response bodies.
#[derive(Clone)]
pub struct EnvelopePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<Box<dyn ResponseBody>>>,
    factory: Box<Factory>,
    created: AtomicUsize,
}

impl EnvelopePool {
    /// Pool producing the default [`Envelope`].
    pub fn new() -> Self {
        Self::with_factory(Envelope::default)
    }

    /// Pool producing a custom body type. The factory must return blank
    /// bodies.
    pub fn with_factory<F, B>(factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: ResponseBody,
    {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                factory: Box::new(move || Box::new(factory()) as Box<dyn ResponseBody>),
                created: AtomicUsize::new(0),
            }),
        }
    }

    /// Take an envelope and bind it to the request context.
    pub fn acquire(&self, context: &RequestContext) -> PooledEnvelope {
        let recycled = self.inner.free.lock().pop();
        let body = recycled.unwrap_or_else(|| {
            self.inner.created.fetch_add(1, Ordering::Relaxed);
            (self.inner.factory)()
        });
        debug_assert!(body.is_blank(), "envelope handed out with stale fields");

        PooledEnvelope {
            body: Some(body),
            context: context.clone(),
            pool: self.clone(),
        }
    }

    fn release(&self, mut body: Box<dyn ResponseBody>) {
        body.reset();
        let mut free = self.inner.free.lock();
        if free.len() < MAX_IDLE {
            free.push(body);
        }
    }

    /// Envelopes currently waiting in the free list.
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Envelopes allocated by the factory so far.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }
}

impl Default for EnvelopePool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EnvelopePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopePool")
            .field("idle", &self.idle())
            .field("created", &self.created())
            .finish()
    }
}

/// An envelope on loan from the pool.
pub struct PooledEnvelope {
    // Always `Some` until drop.
    body: Option<Box<dyn ResponseBody>>,
    context: RequestContext,
    pool: EnvelopePool,
}

impl PooledEnvelope {
    pub fn with_result(mut self, code: i32, message: &str, data: Option<Value>) -> Self {
        if let Some(body) = self.body.as_mut() {
            body.set_result(code, message, data);
        }
        self
    }

    pub fn is_blank(&self) -> bool {
        self.body.as_ref().map_or(true, |b| b.is_blank())
    }

    /// Write with 200 OK.
    pub fn send(self) -> Response {
        self.send_with(StatusCode::OK)
    }

    /// Serialize with the request's trace id, then recycle.
    pub fn send_with(mut self, status: StatusCode) -> Response {
        let Some(body) = self.body.as_mut() else {
            return fallback_response();
        };
        body.set_trace_id(self.context.trace_id());
        let code = body.code();

        let mut response = match body.to_json() {
            Ok(bytes) => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                bytes,
            )
                .into_response(),
            Err(err) => {
                tracing::error!(error = %err, code, "Failed to serialize response envelope");
                fallback_response()
            }
        };
        response.extensions_mut().insert(BusinessCode(code));
        response
    }
}

impl Drop for PooledEnvelope {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            self.pool.release(body);
        }
    }
}

fn fallback_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        FALLBACK_BODY,
    )
        .into_response()
}
