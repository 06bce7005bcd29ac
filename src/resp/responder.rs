//! Response helpers.
//!
//! `Responder` is an axum extractor: it carries the pool and the request
//! context, so handlers answer with one call.
//!
//! ```rust,ignore
//! async fn get_user(r: Responder, Path(id): Path<u64>) -> Response {
//!     match load(id) {
//!         Some(user) => r.json(user),
//!         None => r.bad_request(Some("no such user")),
//!     }
//! }
//! ```

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Extensions, StatusCode};
use axum::response::Response;
use serde::Serialize;

use crate::exception::{translate, AppError};
use crate::resp::codes;
use crate::resp::context::RequestContext;
use crate::resp::pool::{EnvelopePool, PooledEnvelope};

/// Envelope helpers bound to one request.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    pool: EnvelopePool,
    context: RequestContext,
}

impl Responder {
    pub fn new(pool: EnvelopePool, context: RequestContext) -> Self {
        Self { pool, context }
    }

    /// Pool and trace id from the request extensions. Falls back to a
    /// private pool when the application pool layer is missing.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        let pool = extensions.get::<EnvelopePool>().cloned().unwrap_or_default();
        Self::new(pool, RequestContext::from_extensions(extensions))
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Same pool, bound to `context` instead.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// A blank envelope bound to this request.
    pub fn envelope(&self) -> PooledEnvelope {
        self.pool.acquire(&self.context)
    }

    /// Success without data.
    pub fn ok(&self) -> Response {
        self.envelope().send()
    }

    /// Success carrying `data` in `ret`.
    pub fn json<T: Serialize>(&self, data: T) -> Response {
        match serde_json::to_value(data) {
            Ok(value) => self
                .envelope()
                .with_result(codes::SUCCESS, codes::OK_MSG, Some(value))
                .send(),
            Err(err) => self.error(err),
        }
    }

    /// Business error (40000).
    pub fn bad_request(&self, message: Option<&str>) -> Response {
        self.with_code(codes::BAD_REQUEST, message.unwrap_or(codes::BAD_REQUEST_MSG))
    }

    /// Invalid parameters (40010).
    pub fn param_invalid(&self, message: Option<&str>) -> Response {
        self.with_code(codes::PARAM_VALIDATION, message.unwrap_or(codes::PARAM_INVALID_MSG))
    }

    /// Insufficient permission (40003).
    pub fn forbidden(&self, message: Option<&str>) -> Response {
        self.with_code(codes::FORBIDDEN, message.unwrap_or(codes::FORBIDDEN_MSG))
    }

    /// Not logged in (40001, HTTP 401).
    pub fn no_login(&self, message: Option<&str>) -> Response {
        self.with_code(codes::NOT_LOGGED_IN, message.unwrap_or(codes::NOT_LOGGED_IN_MSG))
    }

    /// Login expired (40002, HTTP 401).
    pub fn login_expired(&self, message: Option<&str>) -> Response {
        self.with_code(codes::TOKEN_EXPIRED, message.unwrap_or(codes::TOKEN_EXPIRED_MSG))
    }

    /// Server error (50000).
    pub fn server_error(&self, message: Option<&str>) -> Response {
        self.with_code(codes::SYSTEM_ERROR, message.unwrap_or(codes::SERVER_ERROR_MSG))
    }

    /// Custom business code; the transport status follows the code.
    pub fn with_code(&self, code: i32, message: &str) -> Response {
        self.envelope()
            .with_result(code, message, None)
            .send_with(codes::http_status(code))
    }

    /// Explicit status, whatever the code.
    pub fn with_status(&self, status: StatusCode, code: i32, message: &str) -> Response {
        self.envelope().with_result(code, message, None).send_with(status)
    }

    /// Answer with an error the way the exception translator would.
    pub fn error(&self, err: impl Into<AppError>) -> Response {
        let err: AppError = err.into();
        translate(err.failure(), self)
    }
}

impl<S> FromRequestParts<S> for Responder
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::BusinessFailure;
    use serde_json::{json, Value};

    async fn read(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn responder() -> Responder {
        Responder::new(EnvelopePool::new(), RequestContext::new(Some("t-9".into())))
    }

    #[tokio::test]
    async fn helpers_use_default_messages() {
        let r = responder();
        assert_eq!(
            read(r.bad_request(None)).await,
            (StatusCode::OK, json!({"err_code": 40000, "trace_id": "t-9", "err_msg": "operation failed"}))
        );
        assert_eq!(read(r.forbidden(Some("admins only"))).await.1["err_msg"], "admins only");
        assert_eq!(read(r.param_invalid(None)).await.1["err_code"], 40010);
        assert_eq!(read(r.server_error(None)).await.1["err_code"], 50000);
    }

    #[tokio::test]
    async fn auth_helpers_answer_401() {
        let r = responder();
        let (status, body) = read(r.no_login(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["err_code"], 40001);

        let (status, body) = read(r.login_expired(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["err_code"], 40002);
    }

    #[tokio::test]
    async fn json_and_ok() {
        let r = responder();
        assert_eq!(
            read(r.json(vec![1, 2, 3])).await.1,
            json!({"err_code": 0, "trace_id": "t-9", "err_msg": "ok", "ret": [1, 2, 3]})
        );
        assert_eq!(read(r.ok()).await.1, json!({"err_code": 0, "trace_id": "t-9", "err_msg": ""}));
    }

    #[tokio::test]
    async fn error_classifies_business_and_generic() {
        let r = responder();
        let (_, body) = read(r.error(BusinessFailure::with_code(40003, "read only"))).await;
        assert_eq!(body["err_code"], 40003);
        assert_eq!(body["err_msg"], "read only");

        let (_, body) = read(r.error(std::io::Error::other("socket reset"))).await;
        assert_eq!(body["err_code"], 50000);
        assert_eq!(body["err_msg"], codes::SERVER_ERROR_MSG);
    }

    #[test]
    fn extractor_falls_back_to_private_pool() {
        let r = Responder::from_extensions(&Extensions::new());
        assert_eq!(r.context().trace_id(), "");
        drop(r.ok());
    }
}
