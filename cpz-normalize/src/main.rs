//! cpz-normalize - council export normalizer and merger
//!
//! `normalize` converts one raw council GeoJSON export into the canonical
//! schema; `merge` combines every canonical file in a directory into one
//! collection ready for `cpz-migrate`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpz_common::config::{load_toml_config, report_config_source, resolve_config_path};
use cpz_common::logging::init_logging;
use cpz_normalize::merge::{default_merged_path, merge_directory};
use cpz_normalize::normalizer::{normalize_file, DEFAULT_OUT_DIR};
use tracing::info;

/// Command-line arguments for cpz-normalize
#[derive(Parser, Debug)]
#[command(name = "cpz-normalize")]
#[command(about = "Normalize and merge council parking-zone GeoJSON exports")]
#[command(version)]
struct Args {
    /// Configuration file (logging settings only)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long, global = true, env = "CPZ_LOG_LEVEL")]
    log_level: Option<String>,

    /// Append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize one raw council file
    Normalize {
        /// Raw council GeoJSON export
        input: PathBuf,

        /// Council identifier selecting the extraction rules
        #[arg(long)]
        council: String,

        /// Directory receiving `<name>_normalized.geojson`
        #[arg(long, default_value = DEFAULT_OUT_DIR)]
        out_dir: PathBuf,
    },

    /// Merge every normalized file in a directory
    Merge {
        /// Directory holding `*_normalized.geojson` files
        #[arg(long, default_value = DEFAULT_OUT_DIR)]
        dir: PathBuf,

        /// Combined output file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (mut config, used_defaults) = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(file) = args.log_file {
        config.logging.file = Some(file);
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;
    report_config_source(&config_path, used_defaults);

    info!("Starting cpz-normalize v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Normalize {
            input,
            council,
            out_dir,
        } => {
            let report = normalize_file(&input, &council, &out_dir)
                .with_context(|| format!("Failed to normalize {}", input.display()))?;
            info!(
                "Normalized {} features from {} ({} rules) to {}",
                report.features,
                report.source,
                report.rule_set,
                report.output.display()
            );
        }
        Command::Merge { dir, output } => {
            let output = output.unwrap_or_else(default_merged_path);
            let report = merge_directory(&dir, &output)
                .with_context(|| format!("Failed to merge {}", dir.display()))?;
            info!(
                "Merged {} features from {} files to {} ({:.2} MB)",
                report.total_features,
                report.files.len(),
                report.output.display(),
                report.bytes_written as f64 / 1024.0 / 1024.0
            );
        }
    }

    Ok(())
}
