//! Configuration loading.

use std::path::{Path, PathBuf};

use clap::Parser;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, Value};
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::listener::ConfigListener;

/// Configuration file read when no config listener is supplied.
pub const DEFAULT_CONFIG_FILE: &str = "app.yml";

/// Level separator for environment overrides (`SERVER__PORT` → `server.port`).
const ENV_SEPARATOR: &str = "__";

/// Startup flags.
#[derive(Debug, Clone, Parser)]
#[command(name = "service-shell", about = "HTTP service runtime shell", long_about = None)]
pub struct StartupArgs {
    /// Path to the project configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config error: {0}")]
    Read(#[source] config::ConfigError),

    #[error("parse config error: {0}")]
    Parse(#[source] config::ConfigError),

    #[error("config listener failed: {0}")]
    Listener(String),
}

impl ConfigError {
    /// Failure reported by a config listener.
    pub fn listener(message: impl Into<String>) -> Self {
        ConfigError::Listener(message.into())
    }
}

/// Mutable key-value source handed to a config listener.
///
/// Layers, lowest precedence first: built-in defaults, whatever the listener
/// adds, environment variables. Values passed to [`ConfigSource::set`] are
/// explicit overrides and win over everything.
pub struct ConfigSource {
    builder: ConfigBuilder<DefaultState>,
}

impl ConfigSource {
    /// A source holding only the built-in defaults.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default().server;
        let builder = Config::builder()
            .set_default("server.port", i64::from(defaults.port))
            .and_then(|b| b.set_default("server.env", defaults.env.as_str()))
            .and_then(|b| b.set_default("server.max_file_size", defaults.max_file_size as i64))
            .and_then(|b| b.set_default("server.read_timeout", defaults.read_timeout as i64))
            .and_then(|b| b.set_default("server.write_timeout", defaults.write_timeout as i64))
            .map_err(ConfigError::Read)?;
        Ok(Self { builder })
    }

    /// Add a configuration file; the format follows the extension.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let file = File::from(path.as_ref()).required(true);
        self.map(|b| b.add_source(file))
    }

    /// Add an inline YAML document.
    pub fn add_yaml(&mut self, yaml: &str) -> &mut Self {
        let doc = File::from_str(yaml, FileFormat::Yaml);
        self.map(|b| b.add_source(doc))
    }

    /// Change the default of a key.
    pub fn set_default(
        &mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ConfigError> {
        let builder = std::mem::take(&mut self.builder);
        self.builder = builder.set_default(key, value).map_err(ConfigError::Read)?;
        Ok(self)
    }

    /// Pin a key to an explicit value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self, ConfigError> {
        let builder = std::mem::take(&mut self.builder);
        self.builder = builder.set_override(key, value).map_err(ConfigError::Read)?;
        Ok(self)
    }

    fn map(
        &mut self,
        f: impl FnOnce(ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState>,
    ) -> &mut Self {
        let builder = std::mem::take(&mut self.builder);
        self.builder = f(builder);
        self
    }

    /// Merge every layer, environment last.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.builder
            .add_source(
                Environment::default()
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::Read)
    }
}

/// Load the application configuration.
///
/// When `listener` is present it fills the source and `default_file` is not
/// read. Returns the typed config together with the merged raw source so
/// callers can deserialize their own sections out of it.
pub fn load(
    default_file: &Path,
    listener: Option<&dyn ConfigListener>,
) -> Result<(AppConfig, Config), ConfigError> {
    let mut source = ConfigSource::with_defaults()?;
    match listener {
        Some(listener) => listener.read(&mut source)?,
        None => {
            source.add_file(default_file);
        }
    }

    let raw = source.build()?;
    let config: AppConfig = raw.clone().try_deserialize().map_err(ConfigError::Parse)?;

    tracing::debug!(
        port = config.server.port,
        env = %config.server.env,
        max_file_size = config.server.max_file_size,
        "Configuration loaded"
    );

    Ok((config, raw))
}
