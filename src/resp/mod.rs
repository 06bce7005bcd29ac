//! Response envelopes.
//!
//! # Data Flow
//! ```text
//! handler / interceptor / exception translator
//!     → Responder (pool + request context)
//!     → pool.rs (acquire, bind trace id)
//!     → envelope.rs (err_code / trace_id / err_msg / ret)
//!     → send: serialize, reset, release
//! ```
//!
//! # Design Decisions
//! - One fixed wire shape for every answer, failures included
//! - Envelopes are recycled; a released envelope is always blank
//! - Business codes travel in the body; only auth failures change the status

pub mod codes;
pub mod context;
pub mod envelope;
pub mod pool;
pub mod responder;

pub use context::{RequestContext, TraceId};
pub use envelope::{Envelope, PaginationResult, ResponseBody};
pub use pool::{BusinessCode, EnvelopePool, PooledEnvelope};
pub use responder::Responder;
