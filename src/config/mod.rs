//! Configuration module
//!
//! Handles loading and managing dispatcher and run configuration.

pub mod env;
pub mod file;

pub use env::EnvConfig;
pub use file::{ConfigFile, ConfigFormat};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::dispatch::default_concurrency;
use crate::utils::logger::LogLevel;

/// Dispatcher configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running items (defaults to available parallelism)
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Reject batches larger than this
    #[serde(default)]
    pub max_batch_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: None,
            max_batch_size: None,
            log_level: default_log_level(),
        }
    }
}

impl DispatchConfig {
    /// Lane limit applied when a batch does not set its own
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent.unwrap_or_else(default_concurrency)
    }

    /// Configured level, or `None` if the string is not a known level
    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::from_str(&self.log_level)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == Some(0) {
            anyhow::bail!("max_concurrent must be at least 1");
        }
        if self.log_level().is_none() {
            anyhow::bail!("Unknown log level: {}", self.log_level);
        }
        Ok(())
    }
}

/// Defaults for the `run` command's simulated batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of items per batch
    pub items: usize,

    /// Base execution time per item in milliseconds
    pub delay_ms: u64,

    /// Random extra time per item, up to this many milliseconds
    #[serde(default)]
    pub jitter_ms: u64,

    /// Fail every Nth item (0 disables failures)
    #[serde(default)]
    pub fail_every: usize,

    /// Output format
    pub format: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            items: 16,
            delay_ms: 5,
            jitter_ms: 0,
            fail_every: 0,
            format: "table".to_string(),
        }
    }
}
