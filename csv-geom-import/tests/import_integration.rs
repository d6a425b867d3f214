//! Tests d'intégration: import de fichiers CSV complets
//!
//! Chaque test écrit son CSV dans un répertoire temporaire dédié et relit
//! les couches produites.

use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use csv_geom_import::export::report_layers::{invalid_layer_path, null_layer_path};
use csv_geom_import::{run_import, ImportConfig, ImportStatus};
use serde_json::Value;

/// Une ligne par format, une ligne vide, deux lignes invalides
const MIXED: &str = "id,geometry,name
1,POINT(2.35 48.85),a
2,SRID=2154;POINT(652000 6862000),b
3,0101000000000000000000F03F0000000000000040,c
4,\"{\"\"type\"\":\"\"Point\"\",\"\"coordinates\"\":[1,2]}\",d
5,\"ee.Geometry.Point([1, 2])\",e
6,\"<Point><coordinates>1,2</coordinates></Point>\",f
7,,g
8,POINT(30 10,h
9,hello,i
";

fn setup(name: &str, content: &[u8]) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("csv_geom_import_it_{}", name));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join(format!("{}.csv", name));
    std::fs::write(&input, content).unwrap();
    (input, dir.join("out"))
}

fn read_layer(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn features(layer: &Value) -> &Vec<Value> {
    layer["features"].as_array().unwrap()
}

#[test]
fn test_import_mixed_formats() {
    let (input, out) = setup("mixed", MIXED.as_bytes());
    let report = run_import(&input, &out, &ImportConfig::default()).unwrap();

    assert_eq!(report.layer, "mixed");
    assert_eq!(report.geometry_columns, "geometry");
    assert_eq!(report.rows_total, 9);
    assert_eq!(report.valid, 6);
    assert_eq!(report.null, 1);
    assert_eq!(report.invalid, 2);
    assert_eq!(report.emitted, 7);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.status, ImportStatus::PartialSuccess);

    for format in ["WKT", "EWKT", "WKB", "GeoJSON", "Earth Engine", "KML"] {
        assert_eq!(report.by_format.get(format), Some(&1), "{}", format);
    }
    assert_eq!(report.by_type.get("Point"), Some(&6));

    let layer = read_layer(&out.join("mixed.geojson"));
    assert_eq!(layer["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");

    let features = features(&layer);
    assert_eq!(features.len(), 7);

    let first = &features[0];
    assert_eq!(first["geometry"]["type"], "Point");
    assert_eq!(first["geometry"]["coordinates"][0].as_f64(), Some(2.35));
    assert_eq!(first["properties"]["id"], "1");
    assert_eq!(first["properties"]["name"], "a");
    assert!(first["properties"].get("geometry").is_none());

    // SRID embarqué différent de celui de la couche
    assert_eq!(features[1]["properties"]["_srid"], 2154);

    // ligne vide: géométrie nulle
    let null_row = features.iter().find(|f| f["id"] == 7).unwrap();
    assert!(null_row["geometry"].is_null());

    // lignes invalides omises
    assert!(features.iter().all(|f| f["id"] != 8 && f["id"] != 9));

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_detailed_report() {
    let (input, out) = setup("detailed", MIXED.as_bytes());
    let config = ImportConfig {
        detailed_report: true,
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();
    assert_eq!(report.outputs.len(), 3);

    let null = std::fs::read_to_string(null_layer_path(&out, "detailed")).unwrap();
    assert_eq!(null, "row_number,id,geometry,name\n7,7,,g\n");

    let invalid = std::fs::read_to_string(invalid_layer_path(&out, "detailed")).unwrap();
    let lines: Vec<&str> = invalid.lines().collect();
    assert_eq!(lines[0], "row_number,id,geometry,name,raw_geometry");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("8,8,"));
    assert!(lines[2].ends_with("hello,i,hello"));

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_keep_invalid() {
    let (input, out) = setup("keep_invalid", MIXED.as_bytes());
    let config = ImportConfig {
        skip_invalid: false,
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();
    assert_eq!(report.emitted, 9);
    assert_eq!(report.skipped, 0);

    let layer = read_layer(&out.join("keep_invalid.geojson"));
    let invalid = features(&layer).iter().find(|f| f["id"] == 9).unwrap();
    assert!(invalid["geometry"].is_null());
    assert_eq!(invalid["properties"]["name"], "i");

    // pas de rapport détaillé demandé
    assert!(!invalid_layer_path(&out, "keep_invalid").exists());

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_xy_columns() {
    let (input, out) = setup("xy", b"name;lat;lon\na;48.85;2.35\nb;;\nc;abc;1\nd;47.2;\n");
    let config = ImportConfig {
        delimiter: ';',
        layer_name: Some("points".to_string()),
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();

    assert_eq!(report.geometry_columns, "lon / lat");
    assert_eq!(report.valid, 1);
    assert_eq!(report.null, 1);
    assert_eq!(report.invalid, 2);
    assert_eq!(report.by_format.get("X-Y Coordinates"), Some(&1));

    let layer = read_layer(&out.join("points.geojson"));
    let features = features(&layer);
    assert_eq!(features.len(), 2);
    let coordinates = &features[0]["geometry"]["coordinates"];
    assert_relative_eq!(coordinates[0].as_f64().unwrap(), 2.35, epsilon = 1e-12);
    assert_relative_eq!(coordinates[1].as_f64().unwrap(), 48.85, epsilon = 1e-12);
    assert_eq!(features[0]["properties"]["name"], "a");
    assert!(features[0]["properties"].get("lat").is_none());

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_latin1() {
    let (input, out) = setup("latin1", b"nom,wkt\nOrl\xE9ans,POINT(1.9 47.9)\n");
    let config = ImportConfig {
        encoding: "latin1".to_string(),
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();
    assert_eq!(report.valid, 1);

    let layer = read_layer(&out.join("latin1.geojson"));
    assert_eq!(features(&layer)[0]["properties"]["nom"], "Orléans");

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_small_batches() {
    let (input, out) = setup("batches", MIXED.as_bytes());
    let config = ImportConfig {
        batch_size: 2,
        skip_invalid: false,
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();
    assert_eq!(report.valid, 6);
    assert_eq!(report.null, 1);
    assert_eq!(report.invalid, 2);

    let layer = read_layer(&out.join("batches.geojson"));
    let ids: Vec<u64> = features(&layer)
        .iter()
        .map(|f| f["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, (1..=9).collect::<Vec<u64>>());

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_streams_past_sample_prefix() {
    // plus de lignes que l'échantillon de tête, lots qui le chevauchent
    let mut content = String::from("id,geometry\n");
    for i in 1..=2500 {
        if i % 500 == 0 {
            content.push_str(&format!("{},\n", i));
        } else {
            content.push_str(&format!("{},POINT({} {})\n", i, i, -i));
        }
    }
    let (input, out) = setup("streaming", content.as_bytes());
    let config = ImportConfig {
        batch_size: 300,
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();
    assert_eq!(report.rows_total, 2500);
    assert_eq!(report.valid, 2495);
    assert_eq!(report.null, 5);
    assert_eq!(report.emitted, 2500);

    let layer = read_layer(&out.join("streaming.geojson"));
    let features = features(&layer);
    for (i, feature) in features.iter().enumerate() {
        assert_eq!(feature["id"].as_u64(), Some(i as u64 + 1));
        assert_eq!(feature["properties"]["id"], (i + 1).to_string());
    }
    assert_eq!(features[1998]["geometry"]["coordinates"][0].as_f64(), Some(1999.0));
    assert!(features[1999]["geometry"].is_null());

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_non_finite_wkb_is_invalid() {
    // x = NaN dans un point WKB
    let (input, out) = setup(
        "non_finite",
        b"id,geom\n1,POINT(1 2)\n2,0101000000000000000000F87F0000000000002440\n",
    );
    let report = run_import(&input, &out, &ImportConfig::default()).unwrap();
    assert_eq!(report.valid, 1);
    assert_eq!(report.invalid, 1);

    // la couche reste du JSON valide
    let layer = read_layer(&out.join("non_finite.geojson"));
    assert_eq!(features(&layer).len(), 1);

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_colliding_headers() {
    let (input, out) = setup(
        "colliding",
        b"_row,geometry,name,name\nx,POINT(1 2),a,b\n",
    );
    run_import(&input, &out, &ImportConfig::default()).unwrap();

    let layer = read_layer(&out.join("colliding.geojson"));
    let properties = &features(&layer)[0]["properties"];
    assert_eq!(properties["_row"], 1);
    assert_eq!(properties["_row_2"], "x");
    assert_eq!(properties["name"], "a");
    assert_eq!(properties["name_2"], "b");

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_forced_format() {
    let (input, out) = setup("forced", MIXED.as_bytes());
    let config = ImportConfig {
        format: "wkt".to_string(),
        ..Default::default()
    };
    let report = run_import(&input, &out, &config).unwrap();

    // le parseur WKT accepte aussi le préfixe SRID
    assert_eq!(report.valid, 2);
    assert_eq!(report.null, 1);
    assert_eq!(report.invalid, 6);
    assert_eq!(report.by_format.get("WKT"), Some(&2));
    assert_eq!(report.by_format.len(), 1);

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_all_invalid() {
    let (input, out) = setup("all_invalid", b"id,geom\n1,nope\n2,POLYGON((0 0\n");
    let report = run_import(&input, &out, &ImportConfig::default()).unwrap();
    assert_eq!(report.status, ImportStatus::Failed);
    assert_eq!(report.emitted, 0);
    assert_eq!(report.warnings.len(), 1);

    let layer = read_layer(&out.join("all_invalid.geojson"));
    assert!(features(&layer).is_empty());

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_no_geometry_column() {
    let (input, out) = setup("no_geometry", b"a,b\nhello,world\n");
    let err = run_import(&input, &out, &ImportConfig::default()).unwrap_err();
    assert!(err.to_string().contains("No geometry column found"));

    std::fs::remove_dir_all(input.parent().unwrap()).ok();
}

#[test]
fn test_import_missing_file() {
    let dir = std::env::temp_dir().join("csv_geom_import_it_missing");
    let err = run_import(&dir.join("nope.csv"), &dir, &ImportConfig::default()).unwrap_err();
    assert!(err.to_string().contains("Failed to read input file"));
}
