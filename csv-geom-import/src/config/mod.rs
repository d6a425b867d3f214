//! Configuration de l'import

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use geomsniff::{FormatTag, Srid};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Variable d'environnement: SRID par défaut
pub const ENV_DEFAULT_SRID: &str = "CSVGEOM_DEFAULT_SRID";
/// Variable d'environnement: taille des lots
pub const ENV_BATCH_SIZE: &str = "CSVGEOM_BATCH_SIZE";

/// Configuration d'un import CSV
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Séparateur de champs
    pub delimiter: char,

    /// La première ligne contient les noms de colonnes
    pub has_header: bool,

    /// Encodage du fichier (label WHATWG: utf-8, windows-1252, latin1...)
    pub encoding: String,

    /// Format de géométrie imposé, ou `auto`
    pub format: String,

    /// SRID appliqué aux géométries qui n'en portent pas
    pub default_srid: Srid,

    /// Omettre les lignes invalides de la couche principale
    pub skip_invalid: bool,

    /// Écrire les couches `_Null_Geom` et `_Invalid_Geom`
    pub detailed_report: bool,

    /// Nombre de lignes classées par lot
    pub batch_size: usize,

    /// Colonne géométrie (détectée si absente)
    pub geometry_column: Option<String>,

    /// Colonnes X/Y (format X-Y)
    pub x_column: Option<String>,
    pub y_column: Option<String>,

    /// Nom de la couche (défaut: nom du fichier d'entrée)
    pub layer_name: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            encoding: "utf-8".to_string(),
            format: "auto".to_string(),
            default_srid: env_or(ENV_DEFAULT_SRID, 4326),
            skip_invalid: true,
            detailed_report: false,
            batch_size: env_or(ENV_BATCH_SIZE, 10_000),
            geometry_column: None,
            x_column: None,
            y_column: None,
            layer_name: None,
        }
    }
}

/// Valeur d'une variable d'environnement, sinon la valeur par défaut
fn env_or<T: FromStr>(key: &str, fallback: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid {}={:?}", key, raw);
                fallback
            }
        },
        Err(_) => fallback,
    }
}

impl ImportConfig {
    /// Charge une configuration depuis un fichier JSON
    ///
    /// Les champs absents prennent leur valeur par défaut.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    /// Format imposé; `None` pour la détection automatique
    pub fn format_hint(&self) -> Result<Option<FormatTag>> {
        let tag = FormatTag::from_str(&self.format).map_err(anyhow::Error::msg)?;
        Ok(Some(tag).filter(|t| *t != FormatTag::Unknown))
    }

    /// Séparateur en octet pour le lecteur CSV
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| anyhow::anyhow!("Delimiter must be an ASCII character, got {:?}", self.delimiter))
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;
        let hint = self.format_hint()?;

        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            anyhow::bail!("Unknown encoding: {}", self.encoding);
        }

        if self.x_column.is_some() != self.y_column.is_some() {
            anyhow::bail!("x_column and y_column must be given together");
        }

        if hint == Some(FormatTag::Xy) && self.geometry_column.is_some() {
            warn!("geometry_column is ignored with the X-Y format");
        }

        Ok(())
    }
}
