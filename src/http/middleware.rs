//! Global middleware.
//!
//! A `Middleware` is a named router transformation. The application applies
//! the supplied list in reverse at finalize, so the first entry is the
//! outermost layer.

use std::borrow::Cow;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::Route;
use axum::Router;
use tower::{Layer, Service};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::resp::BusinessCode;

type Apply = Box<dyn FnOnce(Router) -> Router + Send>;

pub struct Middleware {
    name: Cow<'static, str>,
    apply: Apply,
}

impl Middleware {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, apply: F) -> Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        Self {
            name: name.into(),
            apply: Box::new(apply),
        }
    }

    /// Wrap a single tower layer.
    pub fn layer<L>(name: impl Into<Cow<'static, str>>, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(name, move |router| router.layer(layer))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(self, router: Router) -> Router {
        (self.apply)(router)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}

/// Permissive CORS: any origin (mirrored), credentials allowed.
pub fn cors() -> Middleware {
    let layer = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::GET,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([header::ORIGIN, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_LENGTH]);
    Middleware::layer("cors", layer)
}

/// One log line per request with status, business code and latency.
pub fn access_log() -> Middleware {
    let layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        })
        .on_response(|response: &Response, latency: Duration, _span: &Span| {
            let code = response.extensions().get::<BusinessCode>().map(|c| c.0);
            tracing::info!(
                status = response.status().as_u16(),
                code = ?code,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        });
    Middleware::layer("access_log", layer)
}

/// Random v4 UUID, 32 hex digits without hyphens.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTraceId;

impl MakeRequestId for MakeTraceId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().simple().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Generate `x-request-id` when absent and echo it on the response. The id
/// becomes the envelope's `trace_id`.
pub fn trace_ids() -> Middleware {
    Middleware::new("trace_ids", |router| {
        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeTraceId))
    })
}

/// Body size limit and per-request timeout from the server settings.
#[allow(deprecated)]
pub(crate) fn limits(server: &ServerConfig) -> Middleware {
    let max_body = server.max_file_size;
    let write_timeout = server.write_timeout();
    Middleware::new("limits", move |router| {
        let router = router.layer(DefaultBodyLimit::max(max_body));
        match write_timeout {
            Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
            None => router,
        }
    })
}

/// Access log, exception translator, CORS; outermost first.
pub fn defaults() -> Vec<Middleware> {
    vec![
        access_log(),
        crate::exception::exception_translator(),
        cors(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new().route("/", get(|| async { "hi" }))
    }

    #[tokio::test]
    async fn cors_mirrors_origin() {
        let app = cors().apply(router());
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://app.example"))
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );
    }

    #[tokio::test]
    async fn trace_ids_are_generated_and_kept() {
        let app = trace_ids().apply(router());
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_eq!(generated.len(), 32);
        assert!(generated.chars().all(|c| c.is_ascii_hexdigit()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "caller-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "caller-id");
    }

    #[tokio::test]
    async fn body_limit_applies() {
        let server = ServerConfig {
            max_file_size: 4,
            ..ServerConfig::default()
        };
        let app = limits(&server).apply(
            Router::new().route("/", axum::routing::post(|body: String| async move { body })),
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from("too long"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn defaults_order() {
        let names: Vec<_> = defaults().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["access_log", "exception_translator", "cors"]);
    }
}
