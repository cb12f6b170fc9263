//! Configuration loading and resolution
//!
//! Every setting resolves in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by clap in each binary; this module covers
//! locating and parsing the TOML file and supplying the defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Largest accepted `expansion.effect_cap`
pub const MAX_EFFECT_CAP: usize = 1000;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FEATSCOPE_CONFIG";

/// Complete explorer configuration as stored in `featscope.toml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub viewer: ViewerConfig,
    pub search: SearchConfig,
    pub expansion: ExpansionConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Sessions with no live event stream are dropped after this long without a request
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5790,
            session_idle_secs: 1800,
        }
    }
}

/// Feature Data Service location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL, no trailing slash required
    pub origin: String,
    /// Transport timeout for every request
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Coordinates of the third-party embed viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub host: String,
    pub model: String,
    pub layer: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: "neuronpedia.org".to_string(),
            model: "gemma-2b".to_string(),
            layer: "6-res-jb".to_string(),
        }
    }
}

/// Search box behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a request is issued
    pub debounce_ms: u64,
    /// Queries shorter than this (after trimming) never reach the service
    pub min_query_len: usize,
    /// Results kept from one search response
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_len: 2,
            max_results: 40,
        }
    }
}

/// Drill-down behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Acceptance bound of the effect filter (accepts while `len <= effect_cap`)
    pub effect_cap: usize,
    /// Drop expansion results whose feature changed while the fetch was in flight
    pub discard_stale: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            effect_cap: 10,
            discard_stale: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.service.origin.trim().is_empty() {
            return Err(Error::Config("service.origin must not be empty".to_string()));
        }
        if !(self.service.origin.starts_with("http://") || self.service.origin.starts_with("https://")) {
            return Err(Error::Config(format!(
                "service.origin must be an http(s) URL: {}",
                self.service.origin
            )));
        }
        if self.service.timeout_secs == 0 {
            return Err(Error::Config("service.timeout_secs must be at least 1".to_string()));
        }
        if self.expansion.effect_cap > MAX_EFFECT_CAP {
            return Err(Error::Config(format!(
                "expansion.effect_cap must be at most {}: {}",
                MAX_EFFECT_CAP, self.expansion.effect_cap
            )));
        }
        if self.server.session_idle_secs == 0 {
            return Err(Error::Config("server.session_idle_secs must be at least 1".to_string()));
        }
        if self.search.max_results == 0 {
            return Err(Error::Config("search.max_results must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Locate the configuration file
///
/// 1. Explicit path from the command line
/// 2. `FEATSCOPE_CONFIG` environment variable
/// 3. `<config_dir>/featscope/config.toml` if it exists
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config location (`~/.config/featscope/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("featscope").join("config.toml"))
}

/// Load configuration with graceful degradation
///
/// A missing file logs a warning and yields the compiled defaults. A file
/// that exists but fails to parse or validate is an error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let config = TomlConfig::from_file(&path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
