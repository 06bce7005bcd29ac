//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config sources.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration of the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Dev,
    Test,
    Prod,
}

impl Env {
    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Test => "test",
            Env::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,

    /// Deployment environment (dev, test, prod).
    pub env: Env,

    /// Maximum request body size in bytes.
    pub max_file_size: usize,

    /// Request head read timeout in seconds (0 = unbounded).
    pub read_timeout: u64,

    /// Request processing timeout in seconds (0 = unbounded).
    pub write_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4006,
            env: Env::Dev,
            max_file_size: 100 * 1024 * 1024, // 100MB
            read_timeout: 0,
            write_timeout: 0,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.write_timeout)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeouts_are_unbounded() {
        let mut server = ServerConfig::default();
        assert_eq!(server.read_timeout(), None);
        assert_eq!(server.write_timeout(), None);

        server.read_timeout = 5;
        assert_eq!(server.read_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn env_deserializes_lowercase() {
        let env: Env = serde_json::from_str("\"prod\"").unwrap();
        assert_eq!(env, Env::Prod);
        assert!(serde_json::from_str::<Env>("\"staging\"").is_err());
    }
}
