//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{DispatchConfig, RunConfig};
use crate::output::OutputFormat;

/// Configuration files looked up in the working directory, in order
const LOCAL_CONFIG_NAMES: &[&str] = &[
    "batch-dispatch.yaml",
    "batch-dispatch.yml",
    "batch-dispatch.json",
    ".batch-dispatch.yaml",
];

/// On-disk encoding of a configuration file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.yaml` and `.yml` are YAML, anything else is JSON
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML config"),
            ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON config"),
        }
    }

    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            ConfigFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize config"),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize config")
            }
        }
    }
}

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Defaults for simulated runs
    #[serde(default)]
    pub run: RunConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            dispatch: DispatchConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl ConfigFile {
    /// First existing file among the local names, then the user config dir
    pub fn find() -> Option<PathBuf> {
        candidate_paths().into_iter().find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a configuration file; a leading `~` is expanded
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_path(path.as_ref());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = ConfigFormat::of(&path)
            .parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = expand_path(path.as_ref());
        let content = ConfigFormat::of(&path).render(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        self.dispatch.validate()?;

        if OutputFormat::from_str(&self.run.format).is_none() {
            anyhow::bail!("Unknown output format: {}", self.run.format);
        }
        if self.run.items == 0 {
            anyhow::bail!("run.items must be at least 1");
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            dispatch: DispatchConfig {
                max_concurrent: Some(8),
                max_batch_size: Some(10_000),
                log_level: "info".to_string(),
            },
            run: RunConfig {
                items: 32,
                delay_ms: 10,
                jitter_ms: 5,
                fail_every: 0,
                format: "table".to_string(),
            },
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = LOCAL_CONFIG_NAMES.iter().map(PathBuf::from).collect();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("batch-dispatch").join("config.yaml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".batch-dispatch.yaml"));
    }
    paths
}

/// Replace a leading `~` component with the home directory
fn expand_path(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
