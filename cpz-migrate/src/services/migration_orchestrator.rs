//! Migration Orchestrator
//!
//! Loads one canonical collection into storage in sequential batch
//! transactions and keeps a run log for it.
//!
//! - A prior completed run plus `skip_if_exists` skips the source entirely.
//! - Each batch commits or rolls back as a unit; a rolled-back batch marks
//!   all its records failed and the run carries on with the next batch.
//! - Cancellation is honored only between batches.
//! - An unreadable or invalid source file fails before any run log is written.

use std::path::Path;
use std::time::Instant;

use cpz_common::geojson::{read_json, CanonicalCollection};
use cpz_common::{CanonicalFeature, Error, Result};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MigrationOptions;
use crate::db::{runs, zones};
use crate::models::{
    assign_feature_keys, BatchReport, MigrationRun, RecordCounts, RecordOutcome, RunStatus, ZoneRow,
};
use crate::utils::begin_monitored;

/// Progress callback invoked after every batch
pub type BatchObserver = Box<dyn Fn(&BatchReport) + Send + Sync>;

/// Migration orchestrator service
pub struct MigrationOrchestrator {
    db: SqlitePool,
    options: MigrationOptions,
    observer: Option<BatchObserver>,
}

impl MigrationOrchestrator {
    /// Create a new orchestrator; fails on invalid options
    pub fn new(db: SqlitePool, options: MigrationOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            db,
            options,
            observer: None,
        })
    }

    /// Receive a [`BatchReport`] after every batch
    pub fn with_batch_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&BatchReport) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Migrate one canonical file
    ///
    /// Returns the finalized run log entry. Errors are reserved for fatal
    /// conditions: unreadable or invalid source file, or a run log that
    /// cannot be written.
    pub async fn migrate(&self, path: &Path, cancel_token: CancellationToken) -> Result<MigrationRun> {
        let start_time = Instant::now();
        let source_file = source_identifier(path)?;

        if !path.is_file() {
            return Err(Error::InvalidInput(format!("{}: file not found", path.display())));
        }

        if self.options.skip_if_exists {
            if let Some(prior) = runs::latest_completed_run(&self.db, &source_file).await? {
                info!(
                    source_file = %source_file,
                    prior_run = %prior.run_id,
                    prior_status = %prior.status,
                    "Source already migrated, skipping"
                );
                let run = MigrationRun::skipped(&source_file);
                runs::save_run(&self.db, &run).await?;
                return Ok(run);
            }
        }

        let collection: CanonicalCollection = read_json(path)?;
        let mut run = MigrationRun::new(&source_file, collection.len());

        info!(
            run_id = %run.run_id,
            source_file = %source_file,
            features = collection.len(),
            batch_size = self.options.batch_size,
            replace_existing = self.options.replace_existing,
            "Starting migration run"
        );

        runs::save_run(&self.db, &run).await?;

        self.process_batches(&mut run, &collection.features, &cancel_token).await;

        if let Err(e) = runs::save_run(&self.db, &run).await {
            error!(run_id = %run.run_id, error = %e, "Failed to finalize run log");
            run.error_message = Some(e.to_string());
            run.transition_to(RunStatus::Failed);
            if let Err(e2) = runs::save_run(&self.db, &run).await {
                warn!(run_id = %run.run_id, error = %e2, "Failed to record run failure");
            }
            return Err(e);
        }

        if !self.options.replace_existing && run.counts.skipped > 0 {
            warn!(
                run_id = %run.run_id,
                skipped = run.counts.skipped,
                "Records already present were left untouched (replace_existing=false)"
            );
        }

        info!(
            run_id = %run.run_id,
            status = %run.status,
            total = run.total_features,
            inserted = run.counts.inserted,
            skipped = run.counts.skipped,
            replaced = run.counts.replaced,
            failed = run.counts.failed,
            duration_ms = start_time.elapsed().as_millis(),
            "Migration run finished"
        );

        Ok(run)
    }

    /// Run every batch in order, folding outcomes into `run`
    async fn process_batches(
        &self,
        run: &mut MigrationRun,
        features: &[CanonicalFeature],
        cancel_token: &CancellationToken,
    ) {
        let batch_size = self.options.batch_size;
        let batch_count = features.len().div_ceil(batch_size);
        let keys = assign_feature_keys(features);
        let mut failed_batches = 0usize;

        for (index, chunk) in features.chunks(batch_size).enumerate() {
            if cancel_token.is_cancelled() {
                info!(
                    run_id = %run.run_id,
                    completed_batches = index,
                    batch_count,
                    "Migration cancelled at batch boundary"
                );
                run.transition_to(RunStatus::Cancelled);
                return;
            }

            let offset = index * batch_size;
            let chunk_keys = &keys[offset..offset + chunk.len()];
            let report = self
                .persist_batch(&run.source_file, index, batch_count, offset, chunk, chunk_keys)
                .await;

            if !report.committed() {
                failed_batches += 1;
            }
            run.counts.add(&report.counts);

            if let Some(observer) = &self.observer {
                observer(&report);
            }

            // Progress only; the final save is the one that must succeed
            if let Err(e) = runs::save_run(&self.db, run).await {
                warn!(run_id = %run.run_id, error = %e, "Failed to update run progress");
            }
        }

        let status = if failed_batches == 0 {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        };
        run.transition_to(status);
    }

    /// Write one batch; storage errors become a rolled-back, all-failed report
    async fn persist_batch(
        &self,
        source_file: &str,
        index: usize,
        batch_count: usize,
        offset: usize,
        chunk: &[CanonicalFeature],
        keys: &[String],
    ) -> BatchReport {
        let started = Instant::now();

        let (counts, error) = match self.write_batch(source_file, offset, chunk, keys).await {
            Ok(counts) => (counts, None),
            Err(e) => {
                error!(
                    batch = index + 1,
                    batch_count,
                    records = chunk.len(),
                    error = %e,
                    "Batch rolled back, records marked failed"
                );
                let counts = RecordCounts {
                    failed: chunk.len(),
                    ..Default::default()
                };
                (counts, Some(e.to_string()))
            }
        };

        debug!(
            batch = index + 1,
            batch_count,
            inserted = counts.inserted,
            skipped = counts.skipped,
            replaced = counts.replaced,
            failed = counts.failed,
            elapsed_ms = started.elapsed().as_millis(),
            "Batch processed"
        );

        BatchReport {
            index,
            batch_count,
            records: chunk.len(),
            counts,
            error,
        }
    }

    async fn write_batch(
        &self,
        source_file: &str,
        offset: usize,
        chunk: &[CanonicalFeature],
        keys: &[String],
    ) -> Result<RecordCounts> {
        let mut tx = begin_monitored(&self.db, "migration_orchestrator::write_batch").await?;
        let mut counts = RecordCounts::default();

        for (i, (feature, key)) in chunk.iter().zip(keys).enumerate() {
            let applied = match ZoneRow::new(source_file, key, offset + i, feature) {
                Ok(zone) => self.apply_record(&mut tx, &zone).await,
                Err(e) => Err(e),
            };

            match applied {
                Ok(outcome) => counts.record(outcome),
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback failed");
                    }
                    return Err(Error::Internal(format!("record {} ({}): {}", offset + i, key, e)));
                }
            }
        }

        tx.commit().await?;
        Ok(counts)
    }

    /// Insert, skip or replace one record per the conflict policy
    async fn apply_record(
        &self,
        tx: &mut crate::utils::MonitoredTransaction<'_>,
        zone: &ZoneRow<'_>,
    ) -> Result<RecordOutcome> {
        let conn = tx.conn()?;
        match zones::find_zone_id(&mut *conn, zone.source_file, zone.feature_key).await? {
            Some(id) if self.options.replace_existing => {
                zones::replace_zone(conn, &id, zone).await?;
                Ok(RecordOutcome::Replaced)
            }
            Some(_) => Ok(RecordOutcome::Skipped),
            None => {
                zones::insert_zone(conn, zone).await?;
                Ok(RecordOutcome::Inserted)
            }
        }
    }
}

/// Run-log identifier for a canonical file: its base name
pub fn source_identifier(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| Error::Config(format!("Source path has no file name: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_identifier_is_base_name() {
        let id = source_identifier(Path::new("normalized/all_councils_merged.geojson")).unwrap();
        assert_eq!(id, "all_councils_merged.geojson");
        assert!(source_identifier(Path::new("/")).is_err());
    }
}
