//! File-level normalization tests

mod helpers;

use cpz_common::Error;
use cpz_normalize::normalizer::normalize_file;
use helpers::{read_collection, write_raw_collection, write_text};
use serde_json::{json, Value};
use tempfile::TempDir;

#[test]
fn test_normalize_file_writes_canonical_collection() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_collection(
        dir.path(),
        "barnet.geojson",
        vec![
            (
                json!({"description": "Hours: Mon-Fri 8am-6pm<br>Type: Disabled"}),
                json!({"type": "Point", "coordinates": [-0.2, 51.65]}),
            ),
            (
                json!({"Name": "Brick Street - 3 bays"}),
                json!({"type": "LineString", "coordinates": [[-0.2, 51.6], [-0.21, 51.61]]}),
            ),
        ],
    );
    let out_dir = dir.path().join("normalized");

    let report = normalize_file(&input, "Barnet", &out_dir).unwrap();

    assert_eq!(report.features, 2);
    assert_eq!(report.rule_set, "Default");
    assert_eq!(report.source, "barnet.geojson");
    assert_eq!(report.output, out_dir.join("barnet_normalized.geojson"));
    assert!(report.bytes_written > 0);

    let written = read_collection(&report.output);
    assert_eq!(written["type"], "FeatureCollection");

    let first = &written["features"][0];
    assert_eq!(first["type"], "Feature");
    assert_eq!(first["properties"]["hours"], "Mon-Fri 8am-6pm");
    assert_eq!(first["properties"]["type"], "Disabled");
    assert_eq!(first["properties"]["name"], "Unknown");
    assert_eq!(first["properties"]["council"], "Barnet");
    assert_eq!(first["properties"]["source"], "barnet.geojson");
    assert_eq!(first["geometry"], json!({"type": "Point", "coordinates": [-0.2, 51.65]}));

    let second = &written["features"][1];
    assert_eq!(second["properties"]["bays"], 3);
    assert_eq!(second["geometry"]["type"], "LineString");
}

#[test]
fn test_canonical_fields_always_present() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_collection(dir.path(), "empty_props.geojson", vec![(json!({}), Value::Null)]);

    let report = normalize_file(&input, "Barnet", dir.path()).unwrap();
    let written = read_collection(&report.output);
    let properties = written["features"][0]["properties"].as_object().unwrap();

    for field in [
        "name", "type", "address", "hours", "restriction", "tariff", "bays", "council", "source",
    ] {
        assert!(properties.contains_key(field), "missing {field}");
    }
    assert_eq!(properties["bays"], 0);
    assert!(written["features"][0]["geometry"].is_null());
}

#[test]
fn test_malformed_features_do_not_abort() {
    let dir = TempDir::new().unwrap();
    let input = write_text(
        dir.path(),
        "gaps.geojson",
        r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature"},
                {"type": "Feature", "properties": null, "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {"type": "Feature", "properties": {"Name": "Kept"}, "geometry": null}
            ]
        }"#,
    );

    let report = normalize_file(&input, "Manchester", dir.path()).unwrap();

    assert_eq!(report.features, 3);
    assert_eq!(report.missing_geometry, 2);
    assert_eq!(report.missing_properties, 2);

    let written = read_collection(&report.output);
    assert_eq!(written["features"][0]["properties"]["name"], "Unknown");
    assert_eq!(written["features"][1]["geometry"]["type"], "Point");
    assert_eq!(written["features"][2]["properties"]["name"], "Kept");
}

#[test]
fn test_invalid_file_is_fatal_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().join("normalized");
    let input = write_text(dir.path(), "broken.geojson", r#"{"type": "FeatureCollection", "features": ["#);

    let err = normalize_file(&input, "Camden", &out_dir).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(!out_dir.join("broken_normalized.geojson").exists());
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = normalize_file(&dir.path().join("absent.geojson"), "Camden", dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_structured_properties_never_fall_through_to_labels() {
    let description = "Name: FromLabel<br>Type: FromLabel<br>Address: FromLabel<br>\
                       Hours: FromLabel<br>Opening hours: FromLabel<br>Restriction: FromLabel<br>\
                       Tariff: FromLabel<br>No_of_Bays: 99";

    let cases = [
        (
            "Manchester",
            json!({"Name": "N", "Type": "T", "Address": "A", "Opening_hours": "H", "description": description}),
        ),
        (
            "RKBC",
            json!({
                "Street_Name": "N", "Type_of_Bay": "T", "Hours_of_Operation": "H",
                "Restriction": "R", "Tariff": "F", "No_of_Bays": 2, "description": description
            }),
        ),
        (
            "Barnet",
            json!({
                "Name": "N", "Type": "T", "Address": "A", "Hours_of_Operation": "H",
                "Restriction": "R", "Tariff": "F", "No_of_Bays": 2, "description": description
            }),
        ),
    ];

    let dir = TempDir::new().unwrap();
    for (council, properties) in cases {
        let input = write_raw_collection(
            dir.path(),
            &format!("{}.geojson", council.to_lowercase()),
            vec![(properties, Value::Null)],
        );
        let report = normalize_file(&input, council, dir.path()).unwrap();
        let record = &read_collection(&report.output)["features"][0]["properties"];

        for field in ["name", "type", "address", "hours", "restriction", "tariff"] {
            assert_ne!(record[field], "FromLabel", "{council}: {field} fell through to label");
        }
        assert_ne!(record["bays"], 99, "{council}: bays fell through to label");
    }
}

#[test]
fn test_rerun_overwrites_previous_output() {
    let dir = TempDir::new().unwrap();
    let input = write_raw_collection(dir.path(), "camden.geojson", vec![(json!({}), Value::Null)]);
    normalize_file(&input, "Camden", dir.path()).unwrap();

    let input = write_raw_collection(
        dir.path(),
        "camden.geojson",
        vec![(json!({}), Value::Null), (json!({}), Value::Null)],
    );
    let report = normalize_file(&input, "Camden", dir.path()).unwrap();

    assert_eq!(helpers::feature_count(&report.output), 2);
}
