//! Store configuration
//!
//! Defaults, then the first config file found, then `DOCSTORE__*` environment
//! variables (e.g. `DOCSTORE__URI`, `DOCSTORE__POOL__MAX_POOL_SIZE`).

use crate::error::{Result, StoreError};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DOCSTORE";

const CONFIG_PATHS: [&str; 2] = ["docstore.toml", "config/docstore.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URI
    pub uri: String,
    /// Default deadline for contexts handed out by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_timeout_ms: Option<u64>,
    /// Connection pool options forwarded to the driver
    pub pool: PoolOptions,
    pub log: LogConfig,
}

/// Driver connection pool options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    pub connect_timeout_ms: u64,
    pub server_selection_timeout_ms: u64,
    /// Maximum connection idle time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_time_ms: Option<u64>,
    /// Application name reported to the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            min_pool_size: 5,
            connect_timeout_ms: 10_000,
            server_selection_timeout_ms: 30_000,
            max_idle_time_ms: Some(600_000),
            app_name: Some("docstore-rs".to_string()),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            operation_timeout_ms: None,
            pool: PoolOptions::default(),
            log: LogConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Create configuration for a URI with default pool options
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Load from the first existing config file and the environment
    pub fn load() -> Result<Self> {
        let file = CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.exists());

        Self::build(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load one explicit file, still overridable from the environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(
            Some(path.as_ref()),
            config::Environment::with_prefix(ENV_PREFIX),
        )
    }

    pub(crate) fn build(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&StoreConfig::default()).map_err(config_error)?);

        if let Some(path) = file {
            debug!("Loading configuration file: {}", path.display());
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(env.separator("__").try_parsing(true));

        let loaded: StoreConfig = settings
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.uri.is_empty() {
            return Err(StoreError::Configuration(
                "MongoDB URI cannot be empty".to_string(),
            ));
        }
        if !(self.uri.starts_with("mongodb://") || self.uri.starts_with("mongodb+srv://")) {
            return Err(StoreError::Configuration(format!(
                "Unsupported URI scheme: {}",
                self.uri.split("://").next().unwrap_or_default()
            )));
        }
        if self.pool.max_pool_size == 0 {
            return Err(StoreError::Configuration(
                "max_pool_size must be positive".to_string(),
            ));
        }
        if self.pool.min_pool_size > self.pool.max_pool_size {
            return Err(StoreError::Configuration(format!(
                "min_pool_size ({}) exceeds max_pool_size ({})",
                self.pool.min_pool_size, self.pool.max_pool_size
            )));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Sample configuration file contents
    pub fn to_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        Ok(format!(
            "# docstore-rs configuration\n\
             # Save as docstore.toml; DOCSTORE__<SECTION>__<KEY> environment variables override it.\n\n{}",
            body
        ))
    }
}

fn config_error(err: config::ConfigError) -> StoreError {
    StoreError::Configuration(err.to_string())
}
