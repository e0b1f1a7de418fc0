//! Bootstrap configuration loading
//!
//! Configuration file location priority:
//! 1. Command-line argument (highest priority)
//! 2. `CPZ_CONFIG` environment variable
//! 3. `cpz.toml` in the working directory
//!
//! A missing file is not fatal: built-in defaults are used and a warning is
//! logged. A file that exists but cannot be parsed is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "CPZ_CONFIG";

/// Configuration file used when neither CLI nor environment names one
pub const DEFAULT_CONFIG_FILE: &str = "cpz.toml";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative or absolute)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Migration step settings
    #[serde(default)]
    pub migration: MigrationSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[migration]` table
///
/// Every field is optional so that CLI flags and environment variables can
/// fill the gaps; defaults are applied by the migration crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationSection {
    /// Canonical GeoJSON file to load
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Skip the whole run when a completed run exists for the file
    #[serde(default)]
    pub skip_if_exists: Option<bool>,

    /// Replace colliding records instead of skipping them
    #[serde(default)]
    pub replace_existing: Option<bool>,

    /// Records per storage transaction
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            migration: MigrationSection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cpz.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which configuration file to read
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load configuration, falling back to defaults when the file is absent
///
/// Logging is usually not initialized yet when this runs (the logging level
/// itself comes from this file), so the returned flag tells the caller
/// whether defaults were used and it should warn once logging is up.
pub fn load_toml_config(path: &Path) -> Result<(TomlConfig, bool)> {
    if !path.exists() {
        return Ok((TomlConfig::default(), true));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok((config, false))
}

/// Log where configuration came from (call after logging is initialized)
pub fn report_config_source(path: &Path, used_defaults: bool) {
    if used_defaults {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
    } else {
        info!("Loaded configuration from {}", path.display());
    }
}
