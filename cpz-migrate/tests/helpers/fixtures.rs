//! Canonical collection fixtures

use cpz_common::geojson::write_json_atomic;
use cpz_common::{CanonicalFeature, CanonicalRecord, FeatureCollection};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Canonical point feature named `name`
pub fn canonical_feature(name: &str, council: &str) -> CanonicalFeature {
    let mut record = CanonicalRecord::empty(council, &format!("{}.geojson", council.to_lowercase()));
    record.name = name.to_string();
    record.zone_type = "Permit".to_string();
    record.bays = 2;
    CanonicalFeature::new(record, json!({"type": "Point", "coordinates": [-0.14, 51.55]}))
}

/// Write `features` as a canonical collection named `file_name`
pub fn write_canonical_file(dir: &Path, file_name: &str, features: Vec<CanonicalFeature>) -> PathBuf {
    let path = dir.join(file_name);
    write_json_atomic(&path, &FeatureCollection::new(features)).unwrap();
    path
}
