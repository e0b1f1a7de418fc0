//! Data models for cpz-migrate

pub mod migration_run;
pub mod zone;

pub use migration_run::{BatchReport, MigrationRun, RecordCounts, RecordOutcome, RunStatus};
pub use zone::{assign_feature_keys, BoundingBox, ZoneRow};
