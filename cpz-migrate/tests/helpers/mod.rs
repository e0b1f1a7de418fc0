//! Test Helper Utilities
//!
//! Shared utilities for testing cpz-migrate

pub mod db_utils;
pub mod fixtures;

pub use db_utils::{create_test_db, poison_inserts, zone_names};
pub use fixtures::{canonical_feature, write_canonical_file};
