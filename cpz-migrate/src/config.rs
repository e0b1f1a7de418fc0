//! Configuration resolution for cpz-migrate
//!
//! Every setting resolves with the same priority:
//! CLI flag → environment variable → TOML file → built-in default.
//! clap merges the first two (`env = ...` on each argument), so this module
//! only layers the result over the TOML file and validates it.

use cpz_common::config::TomlConfig;
use cpz_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Records per storage transaction unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Conflict policy and batching for one migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Skip the whole run when a completed run exists for the source file
    pub skip_if_exists: bool,
    /// Replace colliding records instead of leaving them untouched
    pub replace_existing: bool,
    /// Maximum records per storage transaction
    pub batch_size: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            skip_if_exists: true,
            replace_existing: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl MigrationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Settings supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct MigrationOverrides {
    pub database_path: Option<PathBuf>,
    pub file_path: Option<PathBuf>,
    pub skip_if_exists: Option<bool>,
    pub replace_existing: Option<bool>,
    pub batch_size: Option<usize>,
}

/// Fully resolved, validated settings for one invocation
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database_path: PathBuf,
    pub file_path: PathBuf,
    pub options: MigrationOptions,
}

/// Layer overrides over the TOML file and validate the result
///
/// Fails with `Error::Config` when no source file is configured, when it
/// does not exist, or when `batch_size` is 0. Nothing touches storage before
/// this succeeds.
pub fn resolve_config(overrides: &MigrationOverrides, toml: &TomlConfig) -> Result<ResolvedConfig> {
    let defaults = MigrationOptions::default();
    let section = &toml.migration;

    let file_path = overrides
        .file_path
        .clone()
        .or_else(|| section.file_path.clone())
        .ok_or_else(|| {
            Error::Config(
                "No source file configured (use --file, CPZ_FILE_PATH or [migration] file_path)".to_string(),
            )
        })?;
    validate_source_path(&file_path)?;

    let options = MigrationOptions {
        skip_if_exists: overrides
            .skip_if_exists
            .or(section.skip_if_exists)
            .unwrap_or(defaults.skip_if_exists),
        replace_existing: overrides
            .replace_existing
            .or(section.replace_existing)
            .unwrap_or(defaults.replace_existing),
        batch_size: overrides
            .batch_size
            .or(section.batch_size)
            .unwrap_or(defaults.batch_size),
    };
    options.validate()?;

    let database_path = overrides
        .database_path
        .clone()
        .unwrap_or_else(|| toml.database_path.clone());

    Ok(ResolvedConfig {
        database_path,
        file_path,
        options,
    })
}

fn validate_source_path(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::Config(format!("Source file not found: {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("merged.geojson");
        std::fs::write(&path, r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let options = MigrationOptions::default();
        assert!(options.skip_if_exists);
        assert!(!options.replace_existing);
        assert_eq!(options.batch_size, 500);
    }

    #[test]
    fn test_toml_fills_missing_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut toml = TomlConfig::default();
        toml.migration.file_path = Some(source_file(&dir));
        toml.migration.batch_size = Some(50);
        toml.migration.skip_if_exists = Some(false);

        let resolved = resolve_config(&MigrationOverrides::default(), &toml).unwrap();

        assert_eq!(resolved.options.batch_size, 50);
        assert!(!resolved.options.skip_if_exists);
        assert!(!resolved.options.replace_existing);
        assert_eq!(resolved.database_path, PathBuf::from("cpz.db"));
    }

    #[test]
    fn test_overrides_win_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut toml = TomlConfig::default();
        toml.migration.file_path = Some(dir.path().join("absent.geojson"));
        toml.migration.batch_size = Some(50);

        let overrides = MigrationOverrides {
            database_path: Some(dir.path().join("override.db")),
            file_path: Some(source_file(&dir)),
            replace_existing: Some(true),
            batch_size: Some(10),
            ..Default::default()
        };
        let resolved = resolve_config(&overrides, &toml).unwrap();

        assert_eq!(resolved.options.batch_size, 10);
        assert!(resolved.options.replace_existing);
        assert_eq!(resolved.database_path, dir.path().join("override.db"));
        assert!(resolved.file_path.ends_with("merged.geojson"));
    }

    #[test]
    fn test_missing_source_is_config_error() {
        let err = resolve_config(&MigrationOverrides::default(), &TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let overrides = MigrationOverrides {
            file_path: Some(PathBuf::from("/nonexistent/merged.geojson")),
            ..Default::default()
        };
        let err = resolve_config(&overrides, &TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = MigrationOverrides {
            file_path: Some(source_file(&dir)),
            batch_size: Some(0),
            ..Default::default()
        };

        let err = resolve_config(&overrides, &TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
