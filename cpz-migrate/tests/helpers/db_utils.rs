//! Database Test Utilities

use anyhow::Result;
use cpz_common::db::init_database;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary database with all tables
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("test_cpz.db")).await?;
    Ok((temp_dir, pool))
}

/// Make every insert of a zone named `name` fail, forcing its batch to roll back
pub async fn poison_inserts(pool: &SqlitePool, name: &str) -> Result<()> {
    let sql = format!(
        "CREATE TRIGGER poison_{0} BEFORE INSERT ON parking_zones \
         WHEN NEW.name = '{0}' BEGIN SELECT RAISE(ABORT, 'poisoned record'); END",
        name
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

/// Names of stored zones in insertion order
pub async fn zone_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM parking_zones ORDER BY rowid")
        .fetch_all(pool)
        .await?;
    Ok(names)
}
