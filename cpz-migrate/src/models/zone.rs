//! Persisted zone records and their natural keys

use cpz_common::{CanonicalFeature, Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Extension fields that can identify a feature, in preference order
const IDENTITY_FIELDS: &[&str] = &["identifier", "ref"];

/// Stable per-feature identity within one source file
///
/// `identifier:<v>` or `ref:<v>` when that extension value is non-empty and
/// unique within the collection, otherwise `index:<n>`.
pub fn assign_feature_keys(features: &[CanonicalFeature]) -> Vec<String> {
    let mut occurrences: HashMap<(&str, String), usize> = HashMap::new();
    for feature in features {
        for field in IDENTITY_FIELDS {
            let value = feature.properties.extension_text(field);
            if !value.is_empty() {
                *occurrences.entry((*field, value)).or_insert(0) += 1;
            }
        }
    }

    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            IDENTITY_FIELDS
                .iter()
                .find_map(|field| {
                    let value = feature.properties.extension_text(field);
                    let unique = occurrences.get(&(*field, value.clone())) == Some(&1);
                    (!value.is_empty() && unique).then(|| format!("{}:{}", field, value))
                })
                .unwrap_or_else(|| format!("index:{}", index))
        })
        .collect()
}

/// Axis-aligned bounds of a GeoJSON geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Bounds over every position in `geometry`, None when it has none
    pub fn of_geometry(geometry: &Value) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        visit_positions(geometry, &mut |lon, lat| {
            let b = bbox.get_or_insert(BoundingBox {
                min_lon: lon,
                min_lat: lat,
                max_lon: lon,
                max_lat: lat,
            });
            b.min_lon = b.min_lon.min(lon);
            b.min_lat = b.min_lat.min(lat);
            b.max_lon = b.max_lon.max(lon);
            b.max_lat = b.max_lat.max(lat);
        });
        bbox
    }
}

fn visit_positions(geometry: &Value, visit: &mut impl FnMut(f64, f64)) {
    if let Some(coordinates) = geometry.get("coordinates") {
        visit_coordinates(coordinates, visit);
    }
    if let Some(Value::Array(children)) = geometry.get("geometries") {
        for child in children {
            visit_positions(child, visit);
        }
    }
}

fn visit_coordinates(value: &Value, visit: &mut impl FnMut(f64, f64)) {
    let Value::Array(items) = value else {
        return;
    };

    // A position is an array whose first two members are numbers
    if let (Some(lon), Some(lat)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        visit(lon, lat);
        return;
    }

    for item in items {
        visit_coordinates(item, visit);
    }
}

/// Storage-side representation of one canonical feature
#[derive(Debug, Clone)]
pub struct ZoneRow<'a> {
    pub source_file: &'a str,
    pub feature_key: &'a str,
    pub source_index: usize,
    pub feature: &'a CanonicalFeature,
    /// Extension fields as JSON text
    pub extensions: String,
    /// Geometry as GeoJSON text, None for a null geometry
    pub geometry: Option<String>,
    pub geometry_type: Option<String>,
    pub bbox: Option<BoundingBox>,
}

impl<'a> ZoneRow<'a> {
    pub fn new(
        source_file: &'a str,
        feature_key: &'a str,
        source_index: usize,
        feature: &'a CanonicalFeature,
    ) -> Result<Self> {
        let extensions = serde_json::to_string(&feature.properties.extensions)
            .map_err(|e| Error::Internal(format!("Failed to serialize extensions: {}", e)))?;

        let geometry = match &feature.geometry {
            Value::Null => None,
            value => Some(
                serde_json::to_string(value)
                    .map_err(|e| Error::Internal(format!("Failed to serialize geometry: {}", e)))?,
            ),
        };

        let geometry_type = feature
            .geometry
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            source_file,
            feature_key,
            source_index,
            feature,
            extensions,
            geometry,
            geometry_type,
            bbox: BoundingBox::of_geometry(&feature.geometry),
        })
    }
}
