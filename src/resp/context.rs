//! Request context an envelope is bound to.

use axum::http::Extensions;
use tower_http::request_id::RequestId;

/// Trace identifier set explicitly by a handler or interceptor.
///
/// Takes precedence over the `x-request-id` generated by
/// [`trace_ids`](crate::http::middleware::trace_ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Per-request data an envelope needs at send time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    trace_id: Option<String>,
}

impl RequestContext {
    pub fn new(trace_id: Option<String>) -> Self {
        Self { trace_id }
    }

    /// Read `TraceId`, else the tower-http `RequestId`.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        let trace_id = extensions
            .get::<TraceId>()
            .map(|t| t.0.clone())
            .or_else(|| {
                extensions
                    .get::<RequestId>()
                    .and_then(|id| id.header_value().to_str().ok())
                    .map(str::to_owned)
            });
        Self { trace_id }
    }

    /// Trace id, or the empty string when the request has none.
    pub fn trace_id(&self) -> &str {
        self.trace_id.as_deref().unwrap_or_default()
    }
}
