//! # CPZ Common Library
//!
//! Shared code for the parking-zone pipeline crates including:
//! - Error type used across all stages
//! - Configuration file loading
//! - Logging bootstrap
//! - GeoJSON stage-boundary types and file I/O
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod geojson;
pub mod logging;

pub use error::{Error, Result};
pub use geojson::{CanonicalFeature, CanonicalRecord, FeatureCollection};
