//! Codecs: une fonction `parse` pure par format
//!
//! Aucun état partagé, aucune I/O: chaque codec peut être appelé en
//! parallèle sur des lignes différentes.

pub mod earth_engine;
pub mod geojson;
pub mod kml;
pub mod topojson;
pub mod wkb;
pub mod wkt;
pub mod xy;

use serde_json::Value;

use crate::geometry::{Coord, Geometry};
use crate::types::{FormatTag, Parsed};
use crate::ParseError;

/// Profondeur d'imbrication maximale acceptée (collections, MultiGeometry)
pub(crate) const MAX_DEPTH: usize = 64;

/// Dispatch d'une valeur texte vers le codec du format donné
///
/// `FormatTag::Xy` n'a pas de représentation texte: utiliser [`xy::parse`].
/// `FormatTag::Unknown` donne une erreur de syntaxe.
pub fn parse(format: FormatTag, value: &str) -> Result<Parsed, ParseError> {
    let value = value.trim();
    match format {
        FormatTag::Wkt | FormatTag::Ewkt => wkt::parse(value),
        FormatTag::Wkb | FormatTag::Ewkb => wkb::parse(value),
        FormatTag::GeoJson => geojson::parse(value),
        FormatTag::Kml => kml::parse(value),
        FormatTag::EarthEngine => earth_engine::parse(value),
        FormatTag::TopoJson => topojson::parse(value),
        FormatTag::Xy => xy::parse_single(value),
        FormatTag::Unknown => Err(ParseError::syntax(0, "unrecognized geometry format")),
    }
}

/// Parse f64 via fast-float, en refusant NaN et les infinis
#[inline]
pub(crate) fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    let token = token.strip_prefix('+').unwrap_or(token);
    fast_float::parse::<f64, _>(token)
        .ok()
        .filter(|v| v.is_finite())
}

// Helpers partagés par les codecs JSON (GeoJSON, Earth Engine, TopoJSON)

/// Position `[x, y, z?]` depuis une valeur JSON
pub(crate) fn json_position(value: &Value) -> Result<Coord, ParseError> {
    let array = value
        .as_array()
        .ok_or_else(|| ParseError::schema(format!("expected a position array, got {}", kind_of(value))))?;

    if array.len() < 2 {
        return Err(ParseError::schema(format!(
            "position needs at least 2 numbers, got {}",
            array.len()
        )));
    }

    let number = |v: &Value| {
        v.as_f64()
            .ok_or_else(|| ParseError::schema(format!("expected a number, got {}", kind_of(v))))
    };

    let x = number(&array[0])?;
    let y = number(&array[1])?;
    match array.get(2) {
        Some(z) if !z.is_null() => Ok(Coord::xyz(x, y, number(z)?)),
        _ => Ok(Coord::xy(x, y)),
    }
}

/// Liste de positions (LineString, MultiPoint, anneau)
pub(crate) fn json_positions(value: &Value) -> Result<Vec<Coord>, ParseError> {
    json_array(value)?.iter().map(json_position).collect()
}

/// Liste d'anneaux (Polygon, MultiLineString)
pub(crate) fn json_rings(value: &Value) -> Result<Vec<Vec<Coord>>, ParseError> {
    json_array(value)?.iter().map(json_positions).collect()
}

/// Liste de polygones (MultiPolygon)
pub(crate) fn json_polygons(value: &Value) -> Result<Vec<Vec<Vec<Coord>>>, ParseError> {
    json_array(value)?.iter().map(json_rings).collect()
}

pub(crate) fn json_array(value: &Value) -> Result<&Vec<Value>, ParseError> {
    value
        .as_array()
        .ok_or_else(|| ParseError::schema(format!("expected an array, got {}", kind_of(value))))
}

/// Nom du type JSON pour les messages d'erreur
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Regroupe des géométries simples en Multi* si elles sont homogènes,
/// sinon en GeometryCollection
pub(crate) fn collect_parts(parts: Vec<Geometry>) -> Geometry {
    if parts.is_empty() {
        return Geometry::GeometryCollection(parts);
    }

    if parts.iter().all(|g| matches!(g, Geometry::Point(_))) {
        return Geometry::MultiPoint(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::Point(c) => Some(c),
                    _ => None,
                })
                .collect(),
        );
    }

    if parts.iter().all(|g| matches!(g, Geometry::LineString(_))) {
        return Geometry::MultiLineString(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::LineString(l) => Some(l),
                    _ => None,
                })
                .collect(),
        );
    }

    if parts.iter().all(|g| matches!(g, Geometry::Polygon(_))) {
        return Geometry::MultiPolygon(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::Polygon(p) => Some(p),
                    _ => None,
                })
                .collect(),
        );
    }

    Geometry::GeometryCollection(parts)
}
