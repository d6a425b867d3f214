//! Écriture de la couche principale en GeoJSON avec geozero (streaming)

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use geomsniff::Srid;

/// Écrit une FeatureCollection feature par feature
pub struct LayerWriter<W: Write> {
    writer: W,
    srid: Srid,
    count: usize,
}

impl LayerWriter<BufWriter<File>> {
    /// Crée le fichier de la couche
    pub fn create(path: &Path, srid: Srid) -> Result<Self> {
        let file =
            File::create(path).context(format!("Failed to create file: {}", path.display()))?;
        Self::new(BufWriter::new(file), srid)
    }
}

impl<W: Write> LayerWriter<W> {
    /// Écrit l'en-tête FeatureCollection avec le CRS de la couche
    pub fn new(mut writer: W, srid: Srid) -> Result<Self> {
        write!(
            writer,
            r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
            srid
        )?;
        Ok(Self {
            writer,
            srid,
            count: 0,
        })
    }

    /// SRID déclaré dans l'en-tête
    pub fn srid(&self) -> Srid {
        self.srid
    }

    /// Nombre de features écrites
    pub fn count(&self) -> usize {
        self.count
    }

    /// Écrit une feature
    ///
    /// `geometry` à `None` donne `"geometry":null` (ligne nulle, ou invalide
    /// conservée). `srid` est celui de la ligne, ajouté en propriété `_srid`
    /// s'il diffère de celui de la couche.
    ///
    /// Une clé déjà utilisée (`_row`, `_srid` ou colonne en double) reçoit
    /// un suffixe `_2`, `_3`...
    pub fn write_feature(
        &mut self,
        row_number: usize,
        geometry: Option<&geo::Geometry<f64>>,
        srid: Option<Srid>,
        properties: &[(&str, &str)],
    ) -> Result<()> {
        if self.count > 0 {
            write!(self.writer, ",")?;
        }

        write!(self.writer, r#"{{"type":"Feature","id":{},"#, row_number)?;

        write!(self.writer, r#""geometry":"#)?;
        match geometry {
            Some(geometry) => {
                let mut geom_buf = Vec::new();
                let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
                geometry.process_geom(&mut geom_writer)?;
                self.writer.write_all(&geom_buf)?;
            }
            None => write!(self.writer, "null")?,
        }

        write!(self.writer, r#","properties":{{"_row":{}"#, row_number)?;
        if let Some(srid) = srid.filter(|s| *s != self.srid) {
            write!(self.writer, r#","_srid":{}"#, srid)?;
        }
        let mut used: HashSet<String> = RESERVED_KEYS.iter().map(|k| k.to_string()).collect();
        for (key, value) in properties {
            let key = unique_key(key, &mut used);
            write!(
                self.writer,
                r#","{}":"{}""#,
                escape_json(&key),
                escape_json(value)
            )?;
        }
        write!(self.writer, "}}}}")?;

        self.count += 1;
        Ok(())
    }

    /// Ferme la collection et vide le buffer
    pub fn finish(mut self) -> Result<W> {
        write!(self.writer, "]}}")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Chemin de la couche principale
pub fn layer_path(output_dir: &Path, layer_name: &str) -> PathBuf {
    output_dir.join(format!("{}.geojson", layer_name))
}

/// Propriétés écrites par la couche elle-même
const RESERVED_KEYS: [&str; 2] = ["_row", "_srid"];

/// Première variante libre de `key`, enregistrée dans `used`
fn unique_key(key: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = key.to_string();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", key, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use serde_json::Value;

    fn write_layer(features: &[(Option<Geometry<f64>>, Option<Srid>)]) -> Value {
        let mut layer = LayerWriter::new(Vec::new(), 4326).unwrap();
        for (i, (geometry, srid)) in features.iter().enumerate() {
            layer
                .write_feature(i + 1, geometry.as_ref(), *srid, &[("name", "a \"quoted\"\nvalue")])
                .unwrap();
        }
        let bytes = layer.finish().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_empty_layer() {
        let json = write_layer(&[]);
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().unwrap().len(), 0);
        assert_eq!(json["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
    }

    #[test]
    fn test_write_features() {
        let json = write_layer(&[
            (Some(Geometry::Point(Point::new(5.0, 47.0))), None),
            (None, None),
            (Some(Geometry::Point(Point::new(1.0, 2.0))), Some(2154)),
        ]);

        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0]["id"], 1);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geometry"]["coordinates"][0].as_f64(), Some(5.0));
        assert_eq!(features[0]["properties"]["name"], "a \"quoted\"\nvalue");
        assert!(features[0]["properties"].get("_srid").is_none());

        assert!(features[1]["geometry"].is_null());
        assert_eq!(features[1]["properties"]["_row"], 2);

        assert_eq!(features[2]["properties"]["_srid"], 2154);
    }

    #[test]
    fn test_colliding_property_keys() {
        let mut layer = LayerWriter::new(Vec::new(), 4326).unwrap();
        layer
            .write_feature(
                7,
                None,
                Some(2154),
                &[("_row", "x"), ("_srid", "y"), ("name", "a"), ("name", "b"), ("name_2", "c")],
            )
            .unwrap();
        let bytes = layer.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();

        let properties = json["features"][0]["properties"].as_object().unwrap();
        assert_eq!(properties.len(), 7);
        assert_eq!(properties["_row"], 7);
        assert_eq!(properties["_srid"], 2154);
        assert_eq!(properties["_row_2"], "x");
        assert_eq!(properties["_srid_2"], "y");
        assert_eq!(properties["name"], "a");
        assert_eq!(properties["name_2"], "b");
        assert_eq!(properties["name_2_2"], "c");
        // aucune clé répétée dans le texte
        assert_eq!(text.matches(r#""name":"#).count(), 1);
    }

    #[test]
    fn test_unique_key() {
        let mut used = HashSet::new();
        assert_eq!(unique_key("a", &mut used), "a");
        assert_eq!(unique_key("a", &mut used), "a_2");
        assert_eq!(unique_key("a", &mut used), "a_3");
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("hello"), "hello");
        assert_eq!(escape_json("hello\"world"), "hello\\\"world");
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_json("\u{1}"), "\\u0001");
    }

    #[test]
    fn test_create_file() {
        let path = std::env::temp_dir().join("csv_geom_import_layer_test.geojson");
        let layer = LayerWriter::create(&path, 3857).unwrap();
        assert_eq!(layer.srid(), 3857);
        assert_eq!(layer.count(), 0);
        layer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("EPSG::3857"));

        std::fs::remove_file(path).ok();
    }
}
