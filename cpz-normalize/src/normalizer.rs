//! Field Normalizer
//!
//! Maps one raw council feature onto the canonical parking-zone record using
//! the council's rule set. Per-feature gaps never fail: missing properties or
//! geometry resolve to defaults. Only an unreadable or invalid source file is
//! fatal, and then no output file is written.

use crate::councils::CouncilRegistry;
use crate::rules::{FeatureContext, RuleSet};
use cpz_common::geojson::{read_json, write_json_atomic, CanonicalCollection, CanonicalRecord};
use cpz_common::{CanonicalFeature, Error, FeatureCollection, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of files written by [`normalize_file`]
pub const NORMALIZED_SUFFIX: &str = "_normalized.geojson";

/// Default output directory for normalized files
pub const DEFAULT_OUT_DIR: &str = "normalized";

const DESCRIPTION_KEYS: &[&str] = &["description", "Description"];

/// Raw council export; only the feature list is required
#[derive(Debug, Deserialize)]
struct RawCollection {
    features: Vec<Value>,
}

/// Outcome of normalizing one file
#[derive(Debug, Clone)]
pub struct NormalizeReport {
    /// Council identifier as supplied
    pub council: String,
    /// Rule set the identifier resolved to
    pub rule_set: String,
    /// Base name of the raw file
    pub source: String,
    pub features: usize,
    pub missing_geometry: usize,
    pub missing_properties: usize,
    pub output: PathBuf,
    pub bytes_written: u64,
}

/// Per-council normalizer over a rule-set registry
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'r> {
    registry: &'r CouncilRegistry,
}

impl Default for Normalizer<'static> {
    fn default() -> Self {
        Self::new(CouncilRegistry::builtin())
    }
}

impl<'r> Normalizer<'r> {
    pub fn new(registry: &'r CouncilRegistry) -> Self {
        Self { registry }
    }

    pub fn rules_for(&self, council: &str) -> &'r RuleSet {
        self.registry.lookup(council)
    }

    /// Normalize one raw feature
    ///
    /// `properties` is None when the source feature had no property object;
    /// the geometry is copied through untouched.
    pub fn normalize_feature(
        &self,
        council: &str,
        properties: Option<&Map<String, Value>>,
        geometry: Value,
        source: &str,
    ) -> CanonicalFeature {
        let rules = self.rules_for(council);
        let empty = Map::new();
        let properties = properties.unwrap_or(&empty);
        let description = description_of(properties);
        let ctx = FeatureContext::new(properties, description);

        let mut record = CanonicalRecord::empty(council, source);
        record.name = ctx.resolve_name(rules);
        record.zone_type = ctx.resolve_or_empty(&rules.zone_type);
        record.address = ctx.resolve_or_empty(&rules.address);
        record.hours = ctx.resolve_or_empty(&rules.hours);
        record.hours_monday_friday = rules.hours_monday_friday.as_deref().map(|s| ctx.resolve_or_empty(s));
        record.hours_saturday = rules.hours_saturday.as_deref().map(|s| ctx.resolve_or_empty(s));
        record.hours_sunday = rules.hours_sunday.as_deref().map(|s| ctx.resolve_or_empty(s));
        record.restriction = ctx.resolve_or_empty(&rules.restriction);
        record.tariff = ctx.resolve_or_empty(&rules.tariff);
        record.bays = ctx.resolve_bays(&rules.bays, &record.name);

        for ext in &rules.extensions {
            let value = ctx
                .property_value(ext.property)
                .unwrap_or_else(|| Value::String(String::new()));
            if !record.insert_extension(ext.key, value) {
                debug!(council = rules.id, key = ext.key, "Extension shadows a canonical field, ignored");
            }
        }

        CanonicalFeature::new(record, geometry)
    }

    /// Normalize every feature of a parsed raw collection, preserving order
    pub fn normalize_features(&self, council: &str, features: &[Value], source: &str) -> CanonicalCollection {
        let normalized = features
            .iter()
            .map(|feature| {
                let properties = feature.get("properties").and_then(Value::as_object);
                let geometry = feature.get("geometry").cloned().unwrap_or(Value::Null);
                self.normalize_feature(council, properties, geometry, source)
            })
            .collect();
        FeatureCollection::new(normalized)
    }
}

fn description_of(properties: &Map<String, Value>) -> &str {
    DESCRIPTION_KEYS
        .iter()
        .find_map(|key| properties.get(*key).and_then(Value::as_str))
        .unwrap_or("")
}

/// Output path for a raw input: `<out_dir>/<stem>_normalized.geojson`
pub fn output_path_for(input: &Path, out_dir: &Path) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::Config(format!("Input path has no file name: {}", input.display())))?;
    let stem = file_name.strip_suffix(".geojson").unwrap_or(&file_name);
    Ok(out_dir.join(format!("{}{}", stem, NORMALIZED_SUFFIX)))
}

/// Normalize one raw council file into `out_dir`
pub fn normalize_file(input: &Path, council: &str, out_dir: &Path) -> Result<NormalizeReport> {
    normalize_file_with(&Normalizer::default(), input, council, out_dir)
}

/// [`normalize_file`] with an explicit normalizer
pub fn normalize_file_with(
    normalizer: &Normalizer<'_>,
    input: &Path,
    council: &str,
    out_dir: &Path,
) -> Result<NormalizeReport> {
    let output = output_path_for(input, out_dir)?;
    let source = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let rules = normalizer.rules_for(council);

    info!(
        input = %input.display(),
        council = council,
        rule_set = rules.id,
        "Normalizing council file"
    );

    let raw: RawCollection = read_json(input)?;

    let missing_geometry = raw
        .features
        .iter()
        .filter(|f| f.get("geometry").map_or(true, Value::is_null))
        .count();
    let missing_properties = raw
        .features
        .iter()
        .filter(|f| f.get("properties").and_then(Value::as_object).is_none())
        .count();
    if missing_geometry > 0 || missing_properties > 0 {
        warn!(
            missing_geometry,
            missing_properties,
            source = %source,
            "Features with gaps normalized with default values"
        );
    }

    let collection = normalizer.normalize_features(council, &raw.features, &source);
    let bytes_written = write_json_atomic(&output, &collection)?;

    info!(
        features = collection.len(),
        output = %output.display(),
        bytes = bytes_written,
        "Normalized file written"
    );

    Ok(NormalizeReport {
        council: council.to_string(),
        rule_set: rules.id.to_string(),
        source,
        features: collection.len(),
        missing_geometry,
        missing_properties,
        output,
        bytes_written,
    })
}
