//! Test Helper Utilities
//!
//! Shared fixtures for the normalizer and merger integration tests

pub mod fixtures;

pub use fixtures::{feature_count, read_collection, write_raw_collection, write_text};
