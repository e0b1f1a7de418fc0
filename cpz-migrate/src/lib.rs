//! cpz-migrate library interface
//!
//! Loads canonical parking-zone collections into SQLite exactly once per
//! source file, in sequential batch transactions, with a persisted run log.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{MigrationOptions, MigrationOverrides, ResolvedConfig};
pub use models::{BatchReport, MigrationRun, RecordCounts, RunStatus};
pub use services::MigrationOrchestrator;
