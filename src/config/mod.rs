//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (server.port = 4006, ...)
//!     → app.yml (or whatever the config listener supplies)
//!     → environment variables (SERVER__PORT=8080)
//!     → loader.rs (merge & deserialize)
//!     → AppConfig (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - A config listener replaces the file source, never the defaults or the
//!   environment layer

pub mod loader;
pub mod schema;

pub use loader::{load, ConfigError, ConfigSource, StartupArgs, DEFAULT_CONFIG_FILE};
pub use schema::{AppConfig, Env, ServerConfig};
