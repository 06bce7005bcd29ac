//! HTTP request handling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util, HTTP/1.1 + HTTP/2, graceful drain)
//!     → global middleware (middleware.rs: access log → translator → CORS)
//!     → interceptor.rs (predicate-gated pre/post hooks)
//!     → handler
//! ```

pub mod interceptor;
pub mod middleware;
pub mod server;

pub use interceptor::{Exchange, InterceptorChain, MethodInterceptor};
pub use middleware::Middleware;
pub use server::{HttpServer, ShutdownReport};
