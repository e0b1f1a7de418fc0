//! cpz-migrate - canonical parking-zone loader
//!
//! Loads one canonical GeoJSON collection into the SQLite store, honoring
//! the skip/replace policy, and exits. Ctrl+C or SIGTERM stops the run at
//! the next batch boundary with status CANCELLED.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cpz_common::config::{load_toml_config, report_config_source, resolve_config_path};
use cpz_common::db::init_database;
use cpz_common::logging::init_logging;
use cpz_migrate::config::{resolve_config, MigrationOverrides};
use cpz_migrate::db::runs::cleanup_stale_runs;
use cpz_migrate::{MigrationOrchestrator, RunStatus};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for cpz-migrate
#[derive(Parser, Debug)]
#[command(name = "cpz-migrate")]
#[command(about = "Load canonical parking-zone GeoJSON into the zone store")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Canonical GeoJSON file to load
    #[arg(short, long, env = "CPZ_FILE_PATH")]
    file: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, env = "CPZ_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Skip the run when this file was already migrated (true/false)
    #[arg(long, env = "CPZ_SKIP_IF_EXISTS")]
    skip_if_exists: Option<bool>,

    /// Replace records that already exist (true/false)
    #[arg(long, env = "CPZ_REPLACE_EXISTING")]
    replace_existing: Option<bool>,

    /// Records per storage transaction
    #[arg(long, env = "CPZ_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "CPZ_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (mut toml_config, used_defaults) = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    if let Some(level) = &args.log_level {
        toml_config.logging.level = level.clone();
    }
    init_logging(&toml_config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting cpz-migrate v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("CPZ_GIT_HASH"),
        env!("CPZ_BUILD_TIMESTAMP"),
        env!("CPZ_BUILD_PROFILE")
    );
    report_config_source(&config_path, used_defaults);

    let overrides = MigrationOverrides {
        database_path: args.database,
        file_path: args.file,
        skip_if_exists: args.skip_if_exists,
        replace_existing: args.replace_existing,
        batch_size: args.batch_size,
    };
    let resolved = resolve_config(&overrides, &toml_config).context("Invalid configuration")?;

    info!("Source file: {}", resolved.file_path.display());
    info!("Database: {}", resolved.database_path.display());

    let pool = init_database(&resolved.database_path)
        .await
        .context("Failed to initialize database")?;

    let stale = cleanup_stale_runs(&pool).await?;
    if stale > 0 {
        warn!("Marked {} interrupted run(s) as CANCELLED", stale);
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel_token.clone()));

    let orchestrator = MigrationOrchestrator::new(pool.clone(), resolved.options)?.with_batch_observer(|batch| {
        info!(
            "Batch {}/{}: {} inserted, {} skipped, {} replaced, {} failed",
            batch.index + 1,
            batch.batch_count,
            batch.counts.inserted,
            batch.counts.skipped,
            batch.counts.replaced,
            batch.counts.failed
        );
    });

    let run = orchestrator
        .migrate(&resolved.file_path, cancel_token)
        .await
        .with_context(|| format!("Migration of {} failed", resolved.file_path.display()))?;

    info!(
        "Run {} {}: {} features, {} inserted, {} skipped, {} replaced, {} failed ({} ms)",
        run.run_id,
        run.status,
        run.total_features,
        run.counts.inserted,
        run.counts.skipped,
        run.counts.replaced,
        run.counts.failed,
        run.duration_ms()
    );

    pool.close().await;

    if run.status == RunStatus::CompletedWithErrors {
        bail!(
            "{} record(s) failed; re-run with --skip-if-exists false --replace-existing true to retry",
            run.counts.failed
        );
    }

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping after the current batch");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping after the current batch");
        },
    }

    token.cancel();
}
