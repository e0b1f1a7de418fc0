//! Migration run log
//!
//! One [`MigrationRun`] per invocation: created `Running` at start, updated
//! as batches complete, finalized with a terminal status.

use chrono::{DateTime, Utc};
use cpz_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Batches in progress
    Running,
    /// Every batch committed
    Completed,
    /// At least one batch rolled back
    CompletedWithErrors,
    /// Source already migrated, storage untouched
    Skipped,
    /// Stopped at a batch boundary by external signal
    Cancelled,
    /// Fatal error after the run log was created
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            RunStatus::Skipped => "SKIPPED",
            RunStatus::Cancelled => "CANCELLED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Runs that count as "this source has been migrated"
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::CompletedWithErrors)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(RunStatus::Running),
            "COMPLETED" => Ok(RunStatus::Completed),
            "COMPLETED_WITH_ERRORS" => Ok(RunStatus::CompletedWithErrors),
            "SKIPPED" => Ok(RunStatus::Skipped),
            "CANCELLED" => Ok(RunStatus::Cancelled),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(Error::Internal(format!("Unknown run status: {}", other))),
        }
    }
}

/// Per-record outcome within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Skipped,
    Replaced,
    Failed,
}

/// Record outcome tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub inserted: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub failed: usize,
}

impl RecordCounts {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted => self.inserted += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Replaced => self.replaced += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }

    pub fn add(&mut self, other: &RecordCounts) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.replaced += other.replaced;
        self.failed += other.failed;
    }

    /// Records with any outcome
    pub fn processed(&self) -> usize {
        self.inserted + self.skipped + self.replaced + self.failed
    }
}

/// Outcome of one batch transaction, handed to the batch observer
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Zero-based batch position
    pub index: usize,
    pub batch_count: usize,
    /// Records in this batch
    pub records: usize,
    pub counts: RecordCounts,
    /// Storage error that rolled the batch back
    pub error: Option<String>,
}

impl BatchReport {
    pub fn committed(&self) -> bool {
        self.error.is_none()
    }
}

/// Run log entry for one migration invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub run_id: Uuid,

    /// Canonical file base name
    pub source_file: String,

    pub status: RunStatus,

    /// Features read from the source file
    pub total_features: usize,

    pub counts: RecordCounts,

    pub error_message: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Set when the run reaches a terminal status
    pub ended_at: Option<DateTime<Utc>>,
}

impl MigrationRun {
    /// New `Running` entry
    pub fn new(source_file: &str, total_features: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_file: source_file.to_string(),
            status: RunStatus::Running,
            total_features,
            counts: RecordCounts::default(),
            error_message: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Terminal entry recording a skipped run with zero processed records
    pub fn skipped(source_file: &str) -> Self {
        let mut run = Self::new(source_file, 0);
        run.transition_to(RunStatus::Skipped);
        run
    }

    pub fn transition_to(&mut self, status: RunStatus) {
        tracing::debug!(
            run_id = %self.run_id,
            old_status = %self.status,
            new_status = %status,
            "Run status transition"
        );
        self.status = status;
        if status.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn duration_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}
