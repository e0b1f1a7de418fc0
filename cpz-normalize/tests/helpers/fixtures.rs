//! Raw and canonical GeoJSON fixtures

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Write a raw feature collection built from `(properties, geometry)` pairs
pub fn write_raw_collection(dir: &Path, name: &str, features: Vec<(Value, Value)>) -> PathBuf {
    let features: Vec<Value> = features
        .into_iter()
        .map(|(properties, geometry)| {
            json!({"type": "Feature", "properties": properties, "geometry": geometry})
        })
        .collect();
    let collection = json!({"type": "FeatureCollection", "features": features});

    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(&collection).unwrap()).unwrap();
    path
}

/// Write arbitrary text (for malformed inputs)
pub fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Parse a written collection as raw JSON
pub fn read_collection(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

pub fn feature_count(path: &Path) -> usize {
    read_collection(path)["features"].as_array().map_or(0, Vec::len)
}
