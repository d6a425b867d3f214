//! Couches de rapport détaillé: `<couche>_Null_Geom.csv` et
//! `<couche>_Invalid_Geom.csv`
//!
//! Chaque ligne reprend le numéro de ligne et les colonnes d'origine; la
//! couche invalide ajoute le texte brut de la géométrie.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{StringRecord, Writer};
use tracing::debug;

/// Colonne numéro de ligne
pub const ROW_NUMBER_COLUMN: &str = "row_number";
/// Colonne géométrie brute (couche invalide)
pub const RAW_GEOMETRY_COLUMN: &str = "raw_geometry";

/// Les deux couches de rapport, créées à la première ligne écrite
pub struct ReportLayers {
    null_path: PathBuf,
    invalid_path: PathBuf,
    headers: Vec<String>,
    null: Option<Writer<File>>,
    invalid: Option<Writer<File>>,
    null_count: usize,
    invalid_count: usize,
}

impl ReportLayers {
    pub fn new(output_dir: &Path, layer_name: &str, headers: &[String]) -> Self {
        Self {
            null_path: null_layer_path(output_dir, layer_name),
            invalid_path: invalid_layer_path(output_dir, layer_name),
            headers: headers.to_vec(),
            null: None,
            invalid: None,
            null_count: 0,
            invalid_count: 0,
        }
    }

    /// Ajoute une ligne à géométrie vide
    pub fn write_null(&mut self, row_number: usize, record: &StringRecord) -> Result<()> {
        if self.null.is_none() {
            self.null = Some(open_layer(&self.null_path, &self.headers, false)?);
        }
        if let Some(writer) = self.null.as_mut() {
            writer.write_record(row_fields(row_number, record, &self.headers, None))?;
            self.null_count += 1;
        }
        Ok(())
    }

    /// Ajoute une ligne à géométrie non parsable
    pub fn write_invalid(
        &mut self,
        row_number: usize,
        record: &StringRecord,
        raw_value: &str,
    ) -> Result<()> {
        if self.invalid.is_none() {
            self.invalid = Some(open_layer(&self.invalid_path, &self.headers, true)?);
        }
        if let Some(writer) = self.invalid.as_mut() {
            writer.write_record(row_fields(row_number, record, &self.headers, Some(raw_value)))?;
            self.invalid_count += 1;
        }
        Ok(())
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_count
    }

    /// Vide les buffers; retourne les fichiers écrits
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if let Some(mut writer) = self.null {
            writer.flush()?;
            written.push(self.null_path);
        }
        if let Some(mut writer) = self.invalid {
            writer.flush()?;
            written.push(self.invalid_path);
        }
        Ok(written)
    }
}

pub fn null_layer_path(output_dir: &Path, layer_name: &str) -> PathBuf {
    output_dir.join(format!("{}_Null_Geom.csv", layer_name))
}

pub fn invalid_layer_path(output_dir: &Path, layer_name: &str) -> PathBuf {
    output_dir.join(format!("{}_Invalid_Geom.csv", layer_name))
}

fn open_layer(path: &Path, headers: &[String], with_raw: bool) -> Result<Writer<File>> {
    debug!("Creating report layer {}", path.display());
    let mut writer =
        Writer::from_path(path).context(format!("Failed to create file: {}", path.display()))?;

    let mut header = Vec::with_capacity(headers.len() + 2);
    header.push(ROW_NUMBER_COLUMN);
    header.extend(headers.iter().map(String::as_str));
    if with_raw {
        header.push(RAW_GEOMETRY_COLUMN);
    }
    writer.write_record(&header)?;
    Ok(writer)
}

/// Numéro de ligne, colonnes d'origine (complétées à la largeur de
/// l'en-tête), texte brut éventuel
fn row_fields(
    row_number: usize,
    record: &StringRecord,
    headers: &[String],
    raw_value: Option<&str>,
) -> Vec<String> {
    let width = headers.len().max(record.len());
    let mut fields = Vec::with_capacity(width + 2);
    fields.push(row_number.to_string());
    fields.extend((0..width).map(|i| record.get(i).unwrap_or_default().to_string()));
    if let Some(raw) = raw_value {
        fields.push(raw.to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("csv_geom_import_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_no_rows_no_files() {
        let dir = temp_dir("report_layers_empty");
        let layers = ReportLayers::new(&dir, "empty", &["id".to_string()]);
        assert!(layers.finish().unwrap().is_empty());
        assert!(!null_layer_path(&dir, "empty").exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_write_layers() {
        let dir = temp_dir("report_layers_write");
        let headers = vec!["id".to_string(), "wkt".to_string()];
        let mut layers = ReportLayers::new(&dir, "points", &headers);

        layers
            .write_null(2, &StringRecord::from(vec!["2", ""]))
            .unwrap();
        layers
            .write_invalid(3, &StringRecord::from(vec!["3", "POINT(30 10"]), "POINT(30 10")
            .unwrap();
        layers
            .write_invalid(4, &StringRecord::from(vec!["4"]), "")
            .unwrap();
        assert_eq!(layers.null_count(), 1);
        assert_eq!(layers.invalid_count(), 2);

        let written = layers.finish().unwrap();
        assert_eq!(written.len(), 2);

        let null = std::fs::read_to_string(null_layer_path(&dir, "points")).unwrap();
        assert_eq!(null, "row_number,id,wkt\n2,2,\n");

        let invalid = std::fs::read_to_string(invalid_layer_path(&dir, "points")).unwrap();
        assert_eq!(
            invalid,
            "row_number,id,wkt,raw_geometry\n3,3,POINT(30 10,POINT(30 10\n4,4,,\n"
        );

        std::fs::remove_dir_all(dir).ok();
    }
}
