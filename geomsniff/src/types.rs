//! Types de données pour le crate geomsniff

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::geometry::Geometry;

/// Identifiant de référence spatiale (code EPSG)
pub type Srid = u32;

/// Format d'encodage d'une valeur de géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatTag {
    Wkt,
    Wkb,
    Ewkt,
    Ewkb,
    GeoJson,
    Kml,
    EarthEngine,
    TopoJson,
    Xy,
    Unknown,
}

impl FormatTag {
    /// Les neuf formats supportés (sans `Unknown`)
    pub const SUPPORTED: [FormatTag; 9] = [
        FormatTag::Wkt,
        FormatTag::Wkb,
        FormatTag::Ewkt,
        FormatTag::Ewkb,
        FormatTag::GeoJson,
        FormatTag::Kml,
        FormatTag::EarthEngine,
        FormatTag::TopoJson,
        FormatTag::Xy,
    ];

    /// Nom affiché du format
    pub fn name(self) -> &'static str {
        match self {
            FormatTag::Wkt => "WKT",
            FormatTag::Wkb => "WKB",
            FormatTag::Ewkt => "EWKT",
            FormatTag::Ewkb => "EWKB",
            FormatTag::GeoJson => "GeoJSON",
            FormatTag::Kml => "KML",
            FormatTag::EarthEngine => "Earth Engine",
            FormatTag::TopoJson => "TopoJSON",
            FormatTag::Xy => "X-Y Coordinates",
            FormatTag::Unknown => "Unknown",
        }
    }

    /// Vrai si le format est lu depuis deux colonnes numériques
    pub fn is_coordinate_pair(self) -> bool {
        self == FormatTag::Xy
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "wkt" => Ok(FormatTag::Wkt),
            "wkb" => Ok(FormatTag::Wkb),
            "ewkt" => Ok(FormatTag::Ewkt),
            "ewkb" => Ok(FormatTag::Ewkb),
            "geojson" | "json" => Ok(FormatTag::GeoJson),
            "kml" => Ok(FormatTag::Kml),
            "earth engine" | "earth-engine" | "earthengine" | "ee" => Ok(FormatTag::EarthEngine),
            "topojson" => Ok(FormatTag::TopoJson),
            "x-y coordinates" | "x-y" | "xy" => Ok(FormatTag::Xy),
            "unknown" | "auto" | "auto-detect" => Ok(FormatTag::Unknown),
            _ => Err(format!(
                "Invalid geometry format: {}. Use: wkt, wkb, ewkt, ewkb, geojson, kml, ee, topojson, xy, auto",
                s
            )),
        }
    }
}

/// Résultat d'un codec: géométrie et SRID éventuellement embarqué
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub geometry: Geometry,
    pub srid: Option<Srid>,
}

impl Parsed {
    /// Géométrie sans SRID
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            srid: None,
        }
    }

    /// Géométrie avec SRID optionnel
    pub fn with_srid(geometry: Geometry, srid: Option<Srid>) -> Self {
        Self { geometry, srid }
    }
}

/// Valeurs brutes d'une ligne: cellule géométrie et/ou colonnes X/Y
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowInput<'a> {
    pub raw: Option<&'a str>,
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
}

impl<'a> RowInput<'a> {
    /// Ligne avec une seule cellule géométrie
    pub fn text(raw: &'a str) -> Self {
        Self {
            raw: Some(raw),
            ..Default::default()
        }
    }

    /// Ligne avec deux colonnes de coordonnées
    pub fn pair(x: &'a str, y: &'a str) -> Self {
        Self {
            raw: None,
            x: Some(x),
            y: Some(y),
        }
    }

    /// Cellule géométrie non vide (espaces retirés)
    pub fn raw_trimmed(&self) -> Option<&'a str> {
        self.raw.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Colonne X non vide
    pub fn x_trimmed(&self) -> Option<&'a str> {
        self.x.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Colonne Y non vide
    pub fn y_trimmed(&self) -> Option<&'a str> {
        self.y.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Classification d'une ligne
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Géométrie parsée avec succès
    Valid {
        geometry: Geometry,
        srid: Option<Srid>,
    },
    /// Valeur vide ou absente
    Null,
    /// Valeur non parsable, conservée telle quelle
    Invalid { raw_value: String },
}

impl RowOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, RowOutcome::Valid { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RowOutcome::Null)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, RowOutcome::Invalid { .. })
    }

    /// Géométrie si la ligne est valide
    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            RowOutcome::Valid { geometry, .. } => Some(geometry),
            _ => None,
        }
    }
}

/// Compteurs d'un import (valides, nulles, invalides)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub valid: usize,
    pub null: usize,
    pub invalid: usize,
}

impl DetectionStats {
    /// Enregistre le résultat d'une ligne
    pub fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Valid { .. } => self.valid += 1,
            RowOutcome::Null => self.null += 1,
            RowOutcome::Invalid { .. } => self.invalid += 1,
        }
    }

    /// Fusion additive de deux compteurs partiels
    pub fn merge(self, other: Self) -> Self {
        Self {
            valid: self.valid + other.valid,
            null: self.null + other.null,
            invalid: self.invalid + other.invalid,
        }
    }

    /// Remise à zéro en début d'import
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total(&self) -> usize {
        self.valid + self.null + self.invalid
    }

    /// Message de synthèse de fin d'import
    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} valid, {} null, {} invalid",
            self.total(),
            self.valid,
            self.null,
            self.invalid
        )
    }
}

impl Add for DetectionStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl AddAssign for DetectionStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl Sum for DetectionStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::merge)
    }
}
