//! Process configuration
//!
//! Resolved once at startup: built-in defaults, then an optional TOML file,
//! then `SOIL__SECTION__KEY` environment variables.

use ::config::{Config, Environment, File};
use ingestion::RetentionPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::StoreConfig;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SOIL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "soil.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sensor_data.db"),
            busy_timeout_ms: 5000,
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Seconds between sensor polls
    pub poll_interval_secs: u64,
    /// Maximum age of stored readings
    pub retention_days: u32,
    pub sensor_timeout_ms: u64,
    /// Seed for the simulated probe
    pub simulation_seed: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            retention_days: ingestion::DEFAULT_RETENTION_DAYS,
            sensor_timeout_ms: 2000,
            simulation_seed: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("latest_reading.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// All named options of the process
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub snapshot: SnapshotConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load from `$SOIL_CONFIG` (default `soil.toml`, optional) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SOIL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "ingest.poll_interval_secs must be positive".into(),
            ));
        }
        if self.ingest.retention_days == 0 {
            return Err(ConfigError::Invalid(
                "ingest.retention_days must be positive".into(),
            ));
        }
        if self.ingest.sensor_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ingest.sensor_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.database.path.clone(),
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            max_connections: self.database.max_connections,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.ingest.retention_days)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.ingest.poll_interval_secs)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest.sensor_timeout_ms)
    }
}
