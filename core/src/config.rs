//! Configuration management for Relay
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags (--max-commands, etc.)
//! 2. Environment variables (RELAY__MAX_COMMAND_CHAIN_LENGTH, etc.)
//! 3. Config file (relay.toml in the working directory, or RELAY_CONFIG_PATH)
//! 4. Built-in defaults
//!
//! # Example Config File (relay.toml)
//!
//! ```toml
//! max_command_chain_length = 65536
//! max_command_fork_count = 65536
//! trace_dir = "traces"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! # Environment Variables
//!
//! Every key can be set with the RELAY__ prefix, nested keys joined by `__`:
//! - RELAY__MAX_COMMAND_CHAIN_LENGTH
//! - RELAY__TRACE_DIR
//! - RELAY__LOGGING__LEVEL

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Commands, calls and modifier applications allowed per dispatch
    #[serde(default = "default_max_command_chain_length")]
    pub max_command_chain_length: usize,

    /// Derived sources allowed per redirect stage
    #[serde(default = "default_max_command_fork_count")]
    pub max_command_fork_count: usize,

    /// Directory receiving `debug function` trace files
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default value functions for serde
fn default_max_command_chain_length() -> usize {
    65536
}
fn default_max_command_fork_count() -> usize {
    65536
}
fn default_trace_dir() -> PathBuf {
    PathBuf::from("traces")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_command_chain_length: default_max_command_chain_length(),
            max_command_fork_count: default_max_command_fork_count(),
            trace_dir: default_trace_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with the full priority chain
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Load configuration from a specific TOML file, without env overlay
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for constructing EngineConfig with optional overrides
#[derive(Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_command_chain_length: Option<usize>,
    max_command_fork_count: Option<usize>,
    trace_dir: Option<PathBuf>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Override the config file path
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn max_command_chain_length(mut self, max: Option<usize>) -> Self {
        self.max_command_chain_length = max;
        self
    }

    pub fn max_command_fork_count(mut self, max: Option<usize>) -> Self {
        self.max_command_fork_count = max;
        self
    }

    pub fn trace_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.trace_dir = dir;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Build the final config by applying the priority chain
    pub fn build(self) -> Result<EngineConfig> {
        let mut layers = Config::builder();

        if let Some(path) = self.locate_config_file()? {
            layers = layers.add_source(File::from(path.as_path()));
        }

        layers = layers.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: EngineConfig = layers
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        self.apply_overrides(&mut config);

        if config.max_command_chain_length == 0 {
            anyhow::bail!("max_command_chain_length must be at least 1");
        }
        if config.max_command_fork_count == 0 {
            anyhow::bail!("max_command_fork_count must be at least 1");
        }

        Ok(config)
    }

    /// Explicit path, then RELAY_CONFIG_PATH, then ./relay.toml
    fn locate_config_file(&self) -> Result<Option<PathBuf>> {
        let explicit = match &self.config_path {
            Some(path) => Some(path.clone()),
            None => env::var_os("RELAY_CONFIG_PATH").map(PathBuf::from),
        };

        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            return Ok(Some(path));
        }

        let project_config = PathBuf::from("relay.toml");
        Ok(project_config.exists().then_some(project_config))
    }

    /// Apply CLI overrides (highest priority)
    fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(max) = self.max_command_chain_length {
            config.max_command_chain_length = max;
        }

        if let Some(max) = self.max_command_fork_count {
            config.max_command_fork_count = max;
        }

        if let Some(dir) = &self.trace_dir {
            config.trace_dir = dir.clone();
        }

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
