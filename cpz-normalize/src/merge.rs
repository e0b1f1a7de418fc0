//! Collection Merger
//!
//! Concatenates canonical per-council files into one collection. Features are
//! carried as raw JSON values so field values pass through untouched. Every
//! input is read before anything is written; one unparseable input aborts the
//! merge and leaves no output behind.

use crate::normalizer::{DEFAULT_OUT_DIR, NORMALIZED_SUFFIX};
use cpz_common::geojson::{read_json, write_json_atomic};
use cpz_common::{Error, FeatureCollection, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the combined collection
pub const MERGED_FILE_NAME: &str = "all_councils_merged.geojson";

/// Council name used for features without a string `council` property
pub const UNKNOWN_COUNCIL: &str = "Unknown";

/// Default merge output, `normalized/all_councils_merged.geojson`
pub fn default_merged_path() -> PathBuf {
    Path::new(DEFAULT_OUT_DIR).join(MERGED_FILE_NAME)
}

/// Features contributed by one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCount {
    pub path: PathBuf,
    pub features: usize,
}

/// Features attributed to one council
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilCount {
    pub council: String,
    pub features: usize,
}

/// Outcome of a merge
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub output: PathBuf,
    /// Inputs in merge order
    pub files: Vec<FileCount>,
    pub total_features: usize,
    /// Sorted by count descending, ties in first-seen order
    pub councils: Vec<CouncilCount>,
    pub bytes_written: u64,
}

/// Canonical files in `dir`, sorted by file name
///
/// `exclude` (typically the merge output) is never returned.
pub fn discover_normalized_files(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::input(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_normalized = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.ends_with(NORMALIZED_SUFFIX));
        if !is_normalized || !path.is_file() {
            continue;
        }
        if exclude.map_or(false, |ex| same_file(ex, &path)) {
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Merge every `*_normalized.geojson` file in `dir` into `output`
pub fn merge_directory(dir: &Path, output: &Path) -> Result<MergeReport> {
    let files = discover_normalized_files(dir, Some(output))?;

    info!(dir = %dir.display(), files = files.len(), "Found normalized files to merge");
    for file in &files {
        info!(file = %file.display(), "  input");
    }

    merge_files(&files, output)
}

/// Merge `inputs` in the given order into `output`
pub fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<MergeReport> {
    if inputs.is_empty() {
        warn!(output = %output.display(), "No inputs to merge, writing an empty collection");
    }

    let mut features: Vec<Value> = Vec::new();
    let mut files = Vec::with_capacity(inputs.len());

    for path in inputs {
        let collection: FeatureCollection<Value> = read_json(path)?;
        info!(file = %path.display(), features = collection.len(), "Added features");
        files.push(FileCount {
            path: path.clone(),
            features: collection.len(),
        });
        features.extend(collection.features);
    }

    let councils = council_breakdown(&features);
    let merged = FeatureCollection::new(features);
    let bytes_written = write_json_atomic(output, &merged)?;

    info!(
        features = merged.len(),
        files = files.len(),
        output = %output.display(),
        bytes = bytes_written,
        "Merged collection written"
    );
    for entry in &councils {
        info!(council = %entry.council, features = entry.features, "Council breakdown");
    }

    Ok(MergeReport {
        output: output.to_path_buf(),
        files,
        total_features: merged.len(),
        councils,
        bytes_written,
    })
}

/// Per-council feature counts, largest first
pub fn council_breakdown(features: &[Value]) -> Vec<CouncilCount> {
    let mut counts: Vec<CouncilCount> = Vec::new();

    for feature in features {
        let council = feature
            .get("properties")
            .and_then(|p| p.get("council"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_COUNCIL);

        match counts.iter_mut().find(|c| c.council == council) {
            Some(entry) => entry.features += 1,
            None => counts.push(CouncilCount {
                council: council.to_string(),
                features: 1,
            }),
        }
    }

    // Stable sort keeps first-seen order for ties
    counts.sort_by(|a, b| b.features.cmp(&a.features));
    counts
}
