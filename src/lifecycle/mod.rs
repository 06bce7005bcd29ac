//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Application (application.rs)
//!     build: Listeners + middleware → config → Configured
//!     run:   events + router composition → HttpServer → Serving
//!
//! Signals (signals.rs) / ServerHandle (resources.rs)
//!     SIGINT/SIGTERM or handle.shutdown() → ShuttingDown
//!
//! Shutdown (shutdown.rs)
//!     latched stop request → stop accepting → drain until exit_delay → abort rest → Stopped
//! ```
//!
//! # Design Decisions
//! - Listener events fire in registration order and are never caught
//! - Shutdown has a deadline: connections still open after it are aborted
//! - State only moves forward; `run` consumes the application

pub mod application;
pub mod resources;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use application::{Application, LifecycleError, DEFAULT_EXIT_DELAY};
pub use resources::{Resources, ServerHandle};
pub use shutdown::Shutdown;
pub use state::ServerState;
