//! GeoJSON stage-boundary types
//!
//! Every pipeline stage communicates only through canonical GeoJSON files: a
//! `FeatureCollection` whose features carry the canonical parking-zone
//! properties plus council-specific extensions, and a geometry copied
//! verbatim from the source feature.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Canonical fields every record carries; extensions may not reuse these keys
pub const CANONICAL_FIELDS: &[&str] = &[
    "name",
    "type",
    "address",
    "hours",
    "hours_monday_friday",
    "hours_saturday",
    "hours_sunday",
    "restriction",
    "tariff",
    "bays",
    "council",
    "source",
];

/// `"type": "FeatureCollection"` tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    #[default]
    FeatureCollection,
}

/// `"type": "Feature"` tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    #[default]
    Feature,
}

/// A GeoJSON feature collection generic over its feature representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection<F> {
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub features: Vec<F>,
}

impl<F> FeatureCollection<F> {
    pub fn new(features: Vec<F>) -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Canonical parking-zone record (the `properties` of a canonical feature)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Zone name, `"Unknown"` when unresolvable
    pub name: String,

    /// Zone/bay classification in the council's own vocabulary
    #[serde(rename = "type")]
    pub zone_type: String,

    pub address: String,

    /// Base operating hours, always present
    pub hours: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_monday_friday: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_saturday: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_sunday: Option<String>,

    pub restriction: String,

    pub tariff: String,

    /// Bay count, 0 when unknown or not applicable
    #[serde(deserialize_with = "deserialize_bay_count")]
    pub bays: u32,

    /// Council identifier exactly as supplied to the normalizer
    pub council: String,

    /// Base name of the raw file this record came from
    pub source: String,

    /// Council-specific extension fields
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl CanonicalRecord {
    /// Record with every canonical field at its default value
    pub fn empty(council: &str, source: &str) -> Self {
        Self {
            name: "Unknown".to_string(),
            zone_type: String::new(),
            address: String::new(),
            hours: String::new(),
            hours_monday_friday: None,
            hours_saturday: None,
            hours_sunday: None,
            restriction: String::new(),
            tariff: String::new(),
            bays: 0,
            council: council.to_string(),
            source: source.to_string(),
            extensions: Map::new(),
        }
    }

    /// Add an extension field unless the key belongs to a canonical field
    ///
    /// Returns false when the key was rejected.
    pub fn insert_extension(&mut self, key: &str, value: Value) -> bool {
        if CANONICAL_FIELDS.contains(&key) {
            return false;
        }
        self.extensions.insert(key.to_string(), value);
        true
    }

    /// Extension value rendered as text (empty for absent, null or non-scalar values)
    pub fn extension_text(&self, key: &str) -> String {
        match self.extensions.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }
}

/// Canonical GeoJSON feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFeature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub properties: CanonicalRecord,
    /// Geometry copied verbatim from the source feature (`null` if it had none)
    #[serde(default)]
    pub geometry: Value,
}

impl CanonicalFeature {
    pub fn new(properties: CanonicalRecord, geometry: Value) -> Self {
        Self {
            kind: FeatureKind::Feature,
            properties,
            geometry,
        }
    }
}

/// Canonical collection as written by the normalizer and read by the migrator
pub type CanonicalCollection = FeatureCollection<CanonicalFeature>;

/// Accept integer, float, numeric string or null for `bays`
///
/// Older exports wrote `null` where a count failed to parse; those and any
/// negative or non-finite value read as 0.
fn deserialize_bay_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(bay_count_from_value(&value))
}

/// Numeric coercion used for bay counts, 0 when the value is not a count
pub fn bay_count_from_value(value: &Value) -> u32 {
    coerce_count(value).unwrap_or(0)
}

/// Coerce a JSON value to a non-negative whole count
///
/// Integers pass through, floats are truncated, strings are trimmed and
/// parsed as numbers. Negative, non-finite and non-numeric values yield None.
pub fn coerce_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => Some(v.min(u32::MAX as u64) as u32),
            None => n.as_f64().and_then(clamp_count),
        },
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(clamp_count),
        _ => None,
    }
}

fn clamp_count(v: f64) -> Option<u32> {
    if v.is_finite() && v >= 0.0 {
        Some(v.trunc().min(u32::MAX as f64) as u32)
    } else {
        None
    }
}

/// Read and deserialize a JSON file
///
/// Unreadable and unparseable files both surface as `Error::InvalidInput`
/// naming the path.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::input(path, e))?;
    serde_json::from_str(&raw).map_err(|e| Error::input(path, e))
}

/// Serialize `value` as pretty JSON and move it into place atomically
///
/// The document is written to a sibling temporary file first and renamed
/// over `path`, so a failed write never leaves a partial output file.
/// Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<u64> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", path.display(), e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    Ok(body.len() as u64)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}
