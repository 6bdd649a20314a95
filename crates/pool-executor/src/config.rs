//! Executor configuration
//!
//! `ExecutorConfig` can be:
//! - Built directly with the `with_*` builder methods
//! - Loaded from the environment via [`ExecutorConfig::from_env`]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default number of worker loops
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Pool executor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Name used in log fields (generated if not provided)
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of worker loops spawned by `start`
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Queue capacity (0 = unbounded)
    #[serde(default)]
    pub max_queue_size: usize,
}

fn default_name() -> String {
    format!("pool-{}", Uuid::now_v7())
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_workers: DEFAULT_MAX_WORKERS,
            max_queue_size: 0,
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment
    ///
    /// Reads `POOL_NAME`, `POOL_MAX_WORKERS` and `POOL_MAX_QUEUE_SIZE`.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = lookup("POOL_NAME") {
            config = config.with_name(name);
        }
        if let Some(workers) = parse_var(&lookup, "POOL_MAX_WORKERS")? {
            config = config.with_max_workers(workers);
        }
        if let Some(size) = parse_var(&lookup, "POOL_MAX_QUEUE_SIZE")? {
            config = config.with_max_queue_size(size);
        }

        Ok(config)
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of workers (0 falls back to the default)
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = if max == 0 { DEFAULT_MAX_WORKERS } else { max };
        self
    }

    /// Set the queue capacity (0 = unbounded)
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Number of workers actually spawned
    pub fn worker_count(&self) -> usize {
        if self.max_workers == 0 {
            DEFAULT_MAX_WORKERS
        } else {
            self.max_workers
        }
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
