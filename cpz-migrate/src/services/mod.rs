//! Services for cpz-migrate

pub mod migration_orchestrator;

pub use migration_orchestrator::{source_identifier, BatchObserver, MigrationOrchestrator};
