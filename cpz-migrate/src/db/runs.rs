//! Migration run log database operations

use chrono::{DateTime, SecondsFormat, Utc};
use cpz_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{MigrationRun, RecordCounts, RunStatus};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const RUN_COLUMNS: &str = "run_id, source_file, status, total_features, inserted, skipped, replaced, \
                           failed, error_message, started_at, ended_at";

/// Fixed-width UTC timestamps so `started_at` orders correctly as text
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

/// Insert or update a run log entry
///
/// Retries on lock contention so a busy database cannot lose the run log.
pub async fn save_run(pool: &SqlitePool, run: &MigrationRun) -> Result<()> {
    // Prepare all data before acquiring a connection
    let run_id = run.run_id.to_string();
    let status = run.status.as_str();
    let started_at = timestamp(&run.started_at);
    let ended_at = run.ended_at.as_ref().map(timestamp);
    let counts = run.counts;
    let total = run.total_features as i64;

    retry_on_lock("save_run", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO migration_runs (
                run_id, source_file, status, total_features,
                inserted, skipped, replaced, failed,
                error_message, started_at, ended_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                status = excluded.status,
                total_features = excluded.total_features,
                inserted = excluded.inserted,
                skipped = excluded.skipped,
                replaced = excluded.replaced,
                failed = excluded.failed,
                error_message = excluded.error_message,
                ended_at = excluded.ended_at
            "#,
        )
        .bind(&run_id)
        .bind(&run.source_file)
        .bind(status)
        .bind(total)
        .bind(counts.inserted as i64)
        .bind(counts.skipped as i64)
        .bind(counts.replaced as i64)
        .bind(counts.failed as i64)
        .bind(&run.error_message)
        .bind(&started_at)
        .bind(&ended_at)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

fn run_from_row(row: &SqliteRow) -> Result<MigrationRun> {
    let run_id: String = row.get("run_id");
    let run_id = Uuid::parse_str(&run_id)
        .map_err(|e| Error::Internal(format!("Failed to parse run_id: {}", e)))?;

    let status: String = row.get("status");
    let started_at: String = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(MigrationRun {
        run_id,
        source_file: row.get("source_file"),
        status: status.parse()?,
        total_features: row.get::<i64, _>("total_features") as usize,
        counts: RecordCounts {
            inserted: row.get::<i64, _>("inserted") as usize,
            skipped: row.get::<i64, _>("skipped") as usize,
            replaced: row.get::<i64, _>("replaced") as usize,
            failed: row.get::<i64, _>("failed") as usize,
        },
        error_message: row.get("error_message"),
        started_at: parse_timestamp("started_at", &started_at)?,
        ended_at: ended_at
            .map(|s| parse_timestamp("ended_at", &s))
            .transpose()?,
    })
}

/// Load a run log entry by id
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<MigrationRun>> {
    let row = sqlx::query(&format!("SELECT {} FROM migration_runs WHERE run_id = ?", RUN_COLUMNS))
        .bind(run_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(run_from_row).transpose()
}

/// Most recent `Completed`/`CompletedWithErrors` run for a source file
pub async fn latest_completed_run(pool: &SqlitePool, source_file: &str) -> Result<Option<MigrationRun>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM migration_runs WHERE source_file = ? AND status IN (?, ?) \
         ORDER BY started_at DESC, rowid DESC LIMIT 1",
        RUN_COLUMNS
    ))
    .bind(source_file)
    .bind(RunStatus::Completed.as_str())
    .bind(RunStatus::CompletedWithErrors.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(run_from_row).transpose()
}

/// Every run for a source file, oldest first
pub async fn runs_for_source(pool: &SqlitePool, source_file: &str) -> Result<Vec<MigrationRun>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM migration_runs WHERE source_file = ? ORDER BY started_at, rowid",
        RUN_COLUMNS
    ))
    .bind(source_file)
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

/// Mark runs left `Running` by an interrupted process as `Cancelled`
///
/// Call at startup, before any new run begins.
pub async fn cleanup_stale_runs(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE migration_runs
        SET status = ?,
            ended_at = ?,
            error_message = 'Run interrupted - cpz-migrate was restarted'
        WHERE status = ?
        "#,
    )
    .bind(RunStatus::Cancelled.as_str())
    .bind(timestamp(&Utc::now()))
    .bind(RunStatus::Running.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
