//! cpz-normalize library
//!
//! Converts council parking-zone exports into the canonical schema and
//! merges canonical files into one collection.
//!
//! - [`extract`]: free-text label extraction and markup cleaning
//! - [`rules`]: per-field candidate sources and rule sets
//! - [`councils`]: registry of known councils plus the default rule set
//! - [`normalizer`]: feature and file normalization
//! - [`merge`]: collection merging with per-council statistics

pub mod councils;
pub mod extract;
pub mod merge;
pub mod normalizer;
pub mod rules;

pub use councils::CouncilRegistry;
pub use merge::{merge_directory, merge_files, MergeReport};
pub use normalizer::{normalize_file, NormalizeReport, Normalizer};
