//! Configuration Model

use config::builder::DefaultState;
use config::{
    Config as ConfigRaw,
    ConfigBuilder,
    ConfigError,
    Environment,
    File,
    FileFormat,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub log_format: LogFormat,
    #[serde(default)]
    pub prometheus_address: Option<String>,
    pub prometheus_port: u16,
}

/// The options spec.md §6 recognises for the kill-service core. Everything
/// else here (`main`) is launcher-only and the core never sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct KillServiceConfig {
    /// Maximum concurrent in-flight kills.
    pub kill_chunk_size: usize,
    /// Minimum age (seconds) before an in-flight entry is retried.
    pub kill_retry_timeout_s: u64,
    /// Attempt budget before force-expunge. Zero means "absent" (unbounded),
    /// since TOML has no native way to omit an integer only conditionally.
    #[serde(default)]
    pub kill_retry_max: u32,
}

impl KillServiceConfig {
    pub fn retry_max(&self) -> Option<u32> {
        match self.kill_retry_max {
            0 => None,
            n => Some(n),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub main: MainConfig,
    pub kill_service: KillServiceConfig,
}

#[derive(Debug)]
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
}

impl ConfigLoader {
    /// Loads a fresh copy of the configuration from source.
    pub fn load(&self) -> Result<Config, ConfigError> {
        Self::deserialize(self.builder.build_cloned()?)
    }

    /// Creates a new loader configured to load the default and overlay the
    /// user supplied config (if supplied).
    ///
    /// * `config_file`: The path of the configuration file to load.
    pub fn from_path(path: &Option<String>) -> ConfigLoader {
        let raw = include_str!("default.toml");
        let mut builder = ConfigRaw::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("ITSD")
                    .try_parsing(true)
                    .separator("__"),
            );
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        ConfigLoader { builder }
    }

    fn deserialize(config: ConfigRaw) -> Result<Config, ConfigError> {
        config.try_deserialize()
    }
}
