//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and ensures the
//! `parking_zones` and `migration_runs` tables exist. Safe to call on every
//! startup: all statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// SQLite busy timeout applied to every connection
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    // One writer at a time: batches are strictly sequential, the extra
    // connections only serve run-log lookups
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets run-log readers proceed while a batch transaction is open
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create all pipeline tables and indexes (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_parking_zones_table(pool).await?;
    create_migration_runs_table(pool).await?;

    info!("Database tables initialized (parking_zones, migration_runs)");
    Ok(())
}

/// Create the parking_zones table
///
/// One row per persisted canonical record. `(source_file, feature_key)` is
/// the natural key; `id` is the system-assigned identity. The bounding box
/// columns index the geometry for spatial pre-filtering.
pub async fn create_parking_zones_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parking_zones (
            id TEXT PRIMARY KEY,
            source_file TEXT NOT NULL,
            feature_key TEXT NOT NULL,
            source_index INTEGER NOT NULL,
            name TEXT NOT NULL,
            zone_type TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            hours TEXT NOT NULL DEFAULT '',
            hours_monday_friday TEXT,
            hours_saturday TEXT,
            hours_sunday TEXT,
            restriction TEXT NOT NULL DEFAULT '',
            tariff TEXT NOT NULL DEFAULT '',
            bays INTEGER NOT NULL DEFAULT 0 CHECK (bays >= 0),
            council TEXT NOT NULL,
            source TEXT NOT NULL,
            extensions TEXT NOT NULL DEFAULT '{}',
            geometry TEXT,
            geometry_type TEXT,
            min_lon REAL,
            min_lat REAL,
            max_lon REAL,
            max_lat REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(source_file, feature_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_parking_zones_bbox ON parking_zones(min_lon, max_lon, min_lat, max_lat)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parking_zones_council ON parking_zones(council)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the migration_runs table
///
/// One row per migration invocation, keyed by run id and looked up by
/// source file.
pub async fn create_migration_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migration_runs (
            run_id TEXT PRIMARY KEY,
            source_file TEXT NOT NULL,
            status TEXT NOT NULL,
            total_features INTEGER NOT NULL DEFAULT 0,
            inserted INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            replaced INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_migration_runs_source ON migration_runs(source_file, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
