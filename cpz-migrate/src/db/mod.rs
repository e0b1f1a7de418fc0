//! Storage operations for cpz-migrate
//!
//! - [`zones`]: parking zone records keyed by `(source_file, feature_key)`
//! - [`runs`]: migration run log

pub mod runs;
pub mod zones;
