//! Codec GeoJSON
//!
//! La validation du schéma (présence des champs, profondeur d'imbrication
//! selon le type) est déléguée au crate `geojson`. Le membre `crs` (GeoJSON
//! 2008) est lu avant pour extraire le SRID.

use geojson::GeoJson;
use serde_json::Value;

use crate::codec::MAX_DEPTH;
use crate::geometry::{Coord, Geometry};
use crate::types::{Parsed, Srid};
use crate::ParseError;

/// Types de géométrie GeoJSON
pub const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiPolygon",
    "GeometryCollection",
];

/// Vrai si l'objet JSON ressemble à une géométrie GeoJSON (ou une Feature)
pub fn looks_like_geojson(object: &serde_json::Map<String, Value>) -> bool {
    match object.get("type").and_then(Value::as_str) {
        Some("Feature") => object.get("geometry").is_some_and(Value::is_object),
        Some(kind) => GEOMETRY_TYPES.contains(&kind),
        None => false,
    }
}

/// Parse une géométrie (ou une Feature) GeoJSON
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let json: Value = serde_json::from_str(value)
        .map_err(|e| ParseError::schema(format!("invalid JSON: {}", e)))?;
    parse_value(json)
}

/// Parse une valeur JSON déjà décodée
pub fn parse_value(json: Value) -> Result<Parsed, ParseError> {
    let srid = find_crs(&json).and_then(srid_from_crs);

    let geojson = GeoJson::from_json_value(json).map_err(|e| ParseError::schema(e.to_string()))?;

    let geometry = match geojson {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| ParseError::schema("Feature has no geometry"))?,
        GeoJson::FeatureCollection(_) => {
            return Err(ParseError::schema(
                "FeatureCollection is not a single geometry",
            ))
        }
    };

    Ok(Parsed::with_srid(convert(&geometry.value, 0)?, srid))
}

/// Cherche le membre `crs` sur l'objet ou sur la géométrie d'une Feature
fn find_crs(json: &Value) -> Option<&Value> {
    json.get("crs")
        .or_else(|| json.get("geometry").and_then(|g| g.get("crs")))
        .filter(|crs| !crs.is_null())
}

/// Extrait le code EPSG d'un membre `crs`
///
/// Formes reconnues:
/// - `{"type":"name","properties":{"name":"EPSG:4326"}}`
/// - `{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::4326"}}`
/// - `{"type":"name","properties":{"name":"urn:ogc:def:crs:OGC:1.3:CRS84"}}`
/// - `{"type":"EPSG","properties":{"code":4326}}`
pub fn srid_from_crs(crs: &Value) -> Option<Srid> {
    let properties = crs.get("properties")?;

    if let Some(code) = properties.get("code").and_then(Value::as_u64) {
        return Srid::try_from(code).ok();
    }

    let name = properties.get("name").and_then(Value::as_str)?.to_uppercase();
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    if !name.contains("EPSG") {
        return None;
    }
    name.rsplit(':').next()?.trim().parse().ok()
}

fn convert(value: &geojson::Value, depth: usize) -> Result<Geometry, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::schema("geometry nesting too deep"));
    }

    let geometry = match value {
        geojson::Value::Point(p) => Geometry::Point(position(p)?),
        geojson::Value::MultiPoint(points) => Geometry::MultiPoint(positions(points)?),
        geojson::Value::LineString(line) => Geometry::LineString(positions(line)?),
        geojson::Value::MultiLineString(lines) => Geometry::MultiLineString(
            lines.iter().map(|l| positions(l)).collect::<Result<_, _>>()?,
        ),
        geojson::Value::Polygon(rings) => Geometry::Polygon(
            rings.iter().map(|r| positions(r)).collect::<Result<_, _>>()?,
        ),
        geojson::Value::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings.iter().map(|r| positions(r)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<_, _>>()?,
        ),
        geojson::Value::GeometryCollection(children) => Geometry::GeometryCollection(
            children
                .iter()
                .map(|g| convert(&g.value, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(geometry)
}

fn position(p: &[f64]) -> Result<Coord, ParseError> {
    match p {
        [x, y] => Ok(Coord::xy(*x, *y)),
        [x, y, z, ..] => Ok(Coord::xyz(*x, *y, *z)),
        _ => Err(ParseError::schema(format!(
            "position needs at least 2 numbers, got {}",
            p.len()
        ))),
    }
}

fn positions(points: &[Vec<f64>]) -> Result<Vec<Coord>, ParseError> {
    points.iter().map(|p| position(p)).collect()
}
