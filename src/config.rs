//! Configuration loading

use crate::index::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file
    pub database: PathBuf,
    pub pipeline: PipelineConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker tasks in the local queue
    pub workers: usize,
    /// Minimum chunk size for batch dispatch
    pub floor_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Attempts per search engine operation (first try included)
    pub retry_attempts: u32,
    /// Backoff before the first retry, doubling per retry
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            pipeline: PipelineConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            floor_chunk_size: 10,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

impl IndexConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Default database path (`<data dir>/citegraph/citegraph.db`)
pub fn default_database_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("citegraph").join("citegraph.db")
}
