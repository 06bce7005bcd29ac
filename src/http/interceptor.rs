//! Predicate-gated interceptor chain.
//!
//! ```text
//! for each interceptor (registration order):
//!     predicate? → selected, pre_handle
//!     aborted?   → return exchange response (empty 200 if none)
//! handler
//! for each selected (selection order):
//!     post_handle; aborted? → stop
//! return exchange response
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};

use crate::http::middleware::Middleware;
use crate::resp::Responder;

/// A hook around request handling.
///
/// Interceptors are shared across requests and must not keep per-request
/// state; everything request-scoped lives on the [`Exchange`].
pub trait MethodInterceptor: Send + Sync + 'static {
    /// Whether this interceptor applies to the request.
    fn predicate(&self, exchange: &Exchange) -> bool;

    /// Before the handler, in registration order. Aborting skips the
    /// handler and every post handle.
    fn pre_handle(&self, _exchange: &mut Exchange) {}

    /// After the handler, with its response on the exchange.
    fn post_handle(&self, _exchange: &mut Exchange) {}
}

/// Request head and (after the handler) response, as seen by interceptors.
#[derive(Debug)]
pub struct Exchange {
    parts: Parts,
    response: Option<Response>,
    aborted: bool,
}

impl Exchange {
    /// Exchange for a request head, before any response exists.
    pub fn new(parts: Parts) -> Self {
        Self {
            parts,
            response: None,
            aborted: false,
        }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Full request URI, query included.
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Request path, used by most predicates.
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header changes made in `pre_handle` reach the handler.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Request extensions.
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Values inserted here before the handler runs are visible to it.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Envelope helpers bound to this request.
    pub fn responder(&self) -> Responder {
        Responder::from_extensions(&self.parts.extensions)
    }

    /// Stop the chain. Without a written response the client gets an empty
    /// 200.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Stop the chain and answer with `response`.
    pub fn abort_with(&mut self, response: Response) {
        self.response = Some(response);
        self.aborted = true;
    }

    /// Whether an interceptor stopped the chain.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// The handler's response; `None` during `pre_handle`.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Edit the handler's response in place.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Replace the response without aborting.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// The response to send; an empty 200 when none was written.
    pub fn into_response(self) -> Response {
        self.response
            .unwrap_or_else(|| StatusCode::OK.into_response())
    }

    /// A copy of the head for the downstream request; the exchange keeps the
    /// original for post handles.
    fn head(&self) -> Parts {
        let (mut head, ()) = Request::new(()).into_parts();
        head.method = self.parts.method.clone();
        head.uri = self.parts.uri.clone();
        head.version = self.parts.version;
        head.headers = self.parts.headers.clone();
        head.extensions = self.parts.extensions.clone();
        head
    }
}

/// Registered interceptors, in order.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn MethodInterceptor>]>,
}

impl InterceptorChain {
    /// Chain running `interceptors` in the given order.
    pub fn new(interceptors: Vec<Arc<dyn MethodInterceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain around `downstream`.
    pub async fn handle<F, Fut>(&self, request: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (parts, body) = request.into_parts();
        let mut exchange = Exchange::new(parts);
        let mut selected = Vec::with_capacity(self.interceptors.len());

        for interceptor in self.interceptors.iter() {
            if interceptor.predicate(&exchange) {
                selected.push(interceptor);
                interceptor.pre_handle(&mut exchange);
            }
            if exchange.aborted {
                return exchange.into_response();
            }
        }

        if selected.is_empty() {
            return downstream(Request::from_parts(exchange.parts, body)).await;
        }

        let response = downstream(Request::from_parts(exchange.head(), body)).await;
        exchange.response = Some(response);

        for interceptor in selected {
            interceptor.post_handle(&mut exchange);
            if exchange.aborted {
                break;
            }
        }
        exchange.into_response()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// `from_fn_with_state` adapter for [`InterceptorChain::handle`].
pub async fn intercept(State(chain): State<InterceptorChain>, request: Request, next: Next) -> Response {
    chain.handle(request, |request| next.run(request)).await
}

/// The chain as one middleware.
pub fn interceptor_chain(chain: InterceptorChain) -> Middleware {
    Middleware::new("interceptors", move |router| {
        router.layer(middleware::from_fn_with_state(chain, intercept))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        prefix: &'static str,
        log: Log,
        abort_pre: bool,
        abort_post: bool,
    }

    impl Recorder {
        fn new(name: &'static str, prefix: &'static str, log: &Log) -> Self {
            Self {
                name,
                prefix,
                log: log.clone(),
                abort_pre: false,
                abort_post: false,
            }
        }
    }

    impl MethodInterceptor for Recorder {
        fn predicate(&self, exchange: &Exchange) -> bool {
            exchange.path().starts_with(self.prefix)
        }

        fn pre_handle(&self, exchange: &mut Exchange) {
            self.log.lock().push(format!("pre:{}", self.name));
            if self.abort_pre {
                let responder = exchange.responder();
                exchange.abort_with(responder.no_login(None));
            }
        }

        fn post_handle(&self, exchange: &mut Exchange) {
            self.log.lock().push(format!("post:{}", self.name));
            if self.abort_post {
                exchange.abort();
            }
        }
    }

    async fn run(chain: &InterceptorChain, path: &str, log: &Log) -> Response {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let log = log.clone();
        chain
            .handle(request, |_| async move {
                log.lock().push("handler".into());
                "done".into_response()
            })
            .await
    }

    fn chain(interceptors: Vec<Recorder>) -> InterceptorChain {
        InterceptorChain::new(
            interceptors
                .into_iter()
                .map(|i| Arc::new(i) as Arc<dyn MethodInterceptor>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn post_handles_run_forward_for_selected_only() {
        let log = Log::default();
        let chain = chain(vec![
            Recorder::new("a", "/", &log),
            Recorder::new("b", "/admin", &log),
            Recorder::new("c", "/api", &log),
        ]);

        run(&chain, "/api/users", &log).await;
        assert_eq!(*log.lock(), ["pre:a", "pre:c", "handler", "post:a", "post:c"]);
    }

    #[tokio::test]
    async fn pre_abort_skips_handler_and_post() {
        let log = Log::default();
        let mut guard = Recorder::new("guard", "/admin", &log);
        guard.abort_pre = true;
        let chain = chain(vec![
            Recorder::new("a", "/", &log),
            guard,
            Recorder::new("c", "/", &log),
        ]);

        let response = run(&chain, "/admin/panel", &log).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(*log.lock(), ["pre:a", "pre:guard"]);
    }

    #[tokio::test]
    async fn post_abort_stops_remaining_posts() {
        let log = Log::default();
        let mut first = Recorder::new("a", "/", &log);
        first.abort_post = true;
        let chain = chain(vec![first, Recorder::new("b", "/", &log)]);

        let response = run(&chain, "/", &log).await;
        assert_eq!(*log.lock(), ["pre:a", "pre:b", "handler", "post:a"]);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"done");
    }

    #[tokio::test]
    async fn bare_abort_yields_empty_200() {
        struct Stop;
        impl MethodInterceptor for Stop {
            fn predicate(&self, _: &Exchange) -> bool {
                true
            }
            fn pre_handle(&self, exchange: &mut Exchange) {
                exchange.abort();
            }
        }

        let log = Log::default();
        let chain = InterceptorChain::new(vec![Arc::new(Stop) as Arc<dyn MethodInterceptor>]);
        let response = run(&chain, "/", &log).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn extensions_reach_the_handler() {
        #[derive(Clone)]
        struct User(&'static str);
        struct Auth;
        impl MethodInterceptor for Auth {
            fn predicate(&self, _: &Exchange) -> bool {
                true
            }
            fn pre_handle(&self, exchange: &mut Exchange) {
                exchange.extensions_mut().insert(User("ada"));
            }
        }

        let chain = InterceptorChain::new(vec![Arc::new(Auth) as Arc<dyn MethodInterceptor>]);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = chain
            .handle(request, |request| async move {
                request.extensions().get::<User>().map(|u| u.0).unwrap_or("nobody").into_response()
            })
            .await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ada");
    }
}
