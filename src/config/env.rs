//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::ConfigFile;

/// Environment variable prefix
const ENV_PREFIX: &str = "BATCH_DISPATCH";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Lane limit from BATCH_DISPATCH_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// Batch size limit from BATCH_DISPATCH_MAX_BATCH_SIZE
    pub max_batch_size: Option<usize>,
    /// Log level from BATCH_DISPATCH_LOG_LEVEL
    pub log_level: Option<String>,
    /// Output format from BATCH_DISPATCH_FORMAT
    pub format: Option<String>,
    /// Config file from BATCH_DISPATCH_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}"));
        let get_parse = |name: &str| get(name).and_then(|v| v.trim().parse().ok());

        Self {
            max_concurrent: get_parse("MAX_CONCURRENT"),
            max_batch_size: get_parse("MAX_BATCH_SIZE"),
            log_level: get("LOG_LEVEL"),
            format: get("FORMAT"),
            config_file: get("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.max_concurrent.is_some()
            || self.max_batch_size.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
            || self.config_file.is_some()
    }

    /// Overlay these values on a loaded configuration
    pub fn apply_to(&self, config: &mut ConfigFile) {
        if let Some(n) = self.max_concurrent {
            config.dispatch.max_concurrent = Some(n);
        }
        if let Some(n) = self.max_batch_size {
            config.dispatch.max_batch_size = Some(n);
        }
        if let Some(level) = &self.log_level {
            config.dispatch.log_level = level.clone();
        }
        if let Some(format) = &self.format {
            config.run.format = format.clone();
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_MAX_CONCURRENT:  {:?}", ENV_PREFIX, self.max_concurrent);
        println!("  {}_MAX_BATCH_SIZE:  {:?}", ENV_PREFIX, self.max_batch_size);
        println!("  {}_LOG_LEVEL:       {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_FORMAT:          {:?}", ENV_PREFIX, self.format);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
    }
}

/// Print all BATCH_DISPATCH environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_MAX_CONCURRENT   Maximum concurrently running items");
    println!("  {ENV_PREFIX}_MAX_BATCH_SIZE   Reject batches larger than this");
    println!("  {ENV_PREFIX}_LOG_LEVEL        Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_FORMAT           Output format (table, json, csv, summary)");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_MAX_CONCURRENT=4");
    println!("  batch-dispatch run --items 100");
}
