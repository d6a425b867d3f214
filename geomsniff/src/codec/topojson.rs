//! Codec TopoJSON
//!
//! Les géométries référencent une table d'arcs partagée. Une référence
//! négative `~i` (soit `-i - 1`) désigne l'arc `i` parcouru à l'envers.

use serde_json::{Map, Value};

use crate::codec::{json_array, json_position, json_positions, kind_of, MAX_DEPTH};
use crate::geometry::{Coord, Geometry};
use crate::types::Parsed;
use crate::ParseError;

/// Vrai si l'objet JSON porte une table d'arcs et des géométries
pub fn looks_like_topojson(object: &Map<String, Value>) -> bool {
    object.contains_key("arcs")
        && (object.contains_key("objects") || object.contains_key("geometries"))
}

/// Quantification: `scale` puis `translate`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

impl Transform {
    fn from_json(value: &Value) -> Result<Self, ParseError> {
        let pair = |key: &str| -> Result<[f64; 2], ParseError> {
            let c = value
                .get(key)
                .ok_or_else(|| ParseError::schema(format!("transform without '{}'", key)))
                .and_then(json_position)?;
            Ok([c.x, c.y])
        };
        Ok(Self {
            scale: pair("scale")?,
            translate: pair("translate")?,
        })
    }

    /// Échoue si le résultat sort du domaine des flottants finis
    #[inline]
    fn apply(&self, c: Coord) -> Result<Coord, ParseError> {
        let x = c.x * self.scale[0] + self.translate[0];
        let y = c.y * self.scale[1] + self.translate[1];
        if !x.is_finite() || !y.is_finite() {
            return Err(ParseError::schema("transformed coordinate is not finite"));
        }
        Ok(Coord { x, y, z: c.z })
    }
}

/// Table d'arcs décodée (coordonnées absolues)
#[derive(Debug)]
struct ArcTable {
    arcs: Vec<Vec<Coord>>,
    transform: Option<Transform>,
}

impl ArcTable {
    fn from_json(value: &Value, transform: Option<Transform>) -> Result<Self, ParseError> {
        let arcs = json_array(value)?
            .iter()
            .map(|arc| {
                let points = json_positions(arc)?;
                match transform {
                    Some(t) => decode_delta(points, &t),
                    None => Ok(points),
                }
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(Self { arcs, transform })
    }

    /// Position d'un Point/MultiPoint: transformée mais pas delta-encodée
    fn position(&self, c: Coord) -> Result<Coord, ParseError> {
        match &self.transform {
            Some(t) => t.apply(c),
            None => Ok(c),
        }
    }

    fn arc(&self, reference: &Value) -> Result<impl Iterator<Item = &Coord>, ParseError> {
        let index = reference.as_i64().ok_or_else(|| {
            ParseError::schema(format!("arc reference must be an integer, got {}", kind_of(reference)))
        })?;

        let (position, reversed) = if index < 0 { (!index, true) } else { (index, false) };

        let arc = usize::try_from(position)
            .ok()
            .and_then(|p| self.arcs.get(p))
            .ok_or(ParseError::ArcIndexOutOfRange {
                index,
                len: self.arcs.len(),
            })?;

        let forward = arc.iter();
        Ok(oriented(forward, reversed))
    }

    /// Concatène une suite d'arcs; le point de jonction n'est émis qu'une fois
    fn line(&self, references: &Value) -> Result<Vec<Coord>, ParseError> {
        let mut coords: Vec<Coord> = Vec::new();
        for reference in json_array(references)? {
            for (i, c) in self.arc(reference)?.enumerate() {
                if i == 0 && coords.last().is_some_and(|last| last.same_xy(c)) {
                    continue;
                }
                coords.push(*c);
            }
        }
        Ok(coords)
    }

    fn lines(&self, references: &Value) -> Result<Vec<Vec<Coord>>, ParseError> {
        json_array(references)?.iter().map(|r| self.line(r)).collect()
    }
}

/// Parcours direct ou inverse d'un arc
fn oriented<'a>(
    iter: std::slice::Iter<'a, Coord>,
    reversed: bool,
) -> Box<dyn Iterator<Item = &'a Coord> + 'a> {
    if reversed {
        Box::new(iter.rev())
    } else {
        Box::new(iter)
    }
}

/// Décodage delta des arcs quantifiés puis transformation
fn decode_delta(points: Vec<Coord>, transform: &Transform) -> Result<Vec<Coord>, ParseError> {
    let (mut x, mut y) = (0.0, 0.0);
    points
        .into_iter()
        .map(|p| {
            x += p.x;
            y += p.y;
            transform.apply(Coord { x, y, z: p.z })
        })
        .collect()
}

/// Parse une topologie et résout ses géométries
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let json: Value = serde_json::from_str(value)
        .map_err(|e| ParseError::schema(format!("invalid JSON: {}", e)))?;
    let topology = json
        .as_object()
        .ok_or_else(|| ParseError::schema(format!("expected an object, got {}", kind_of(&json))))?;

    let transform = topology
        .get("transform")
        .filter(|t| !t.is_null())
        .map(Transform::from_json)
        .transpose()?;

    let arcs = topology
        .get("arcs")
        .ok_or_else(|| ParseError::schema("topology without 'arcs'"))?;
    let table = ArcTable::from_json(arcs, transform)?;

    let geometry = if let Some(objects) = topology.get("objects") {
        let objects = objects
            .as_object()
            .ok_or_else(|| ParseError::schema("'objects' must be an object"))?;

        let mut geometries = objects
            .values()
            .map(|object| resolve(object, &table, 0))
            .collect::<Result<Vec<_>, _>>()?;

        match geometries.len() {
            0 => return Err(ParseError::schema("topology has no objects")),
            1 => geometries.remove(0),
            _ => Geometry::GeometryCollection(geometries),
        }
    } else {
        let geometries = topology
            .get("geometries")
            .ok_or_else(|| ParseError::schema("topology without 'objects' or 'geometries'"))?;
        Geometry::GeometryCollection(
            json_array(geometries)?
                .iter()
                .map(|g| resolve(g, &table, 0))
                .collect::<Result<_, _>>()?,
        )
    };

    Ok(Parsed::new(geometry))
}

/// Résout un objet géométrie TopoJSON
fn resolve(object: &Value, table: &ArcTable, depth: usize) -> Result<Geometry, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::schema("geometry nesting too deep"));
    }

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::schema("geometry object without 'type'"))?;

    let member = |key: &str| {
        object
            .get(key)
            .ok_or_else(|| ParseError::schema(format!("{} without '{}'", kind, key)))
    };

    let geometry = match kind {
        "Point" => Geometry::Point(table.position(json_position(member("coordinates")?)?)?),
        "MultiPoint" => Geometry::MultiPoint(
            json_positions(member("coordinates")?)?
                .into_iter()
                .map(|c| table.position(c))
                .collect::<Result<_, _>>()?,
        ),
        "LineString" => Geometry::LineString(table.line(member("arcs")?)?),
        "MultiLineString" => Geometry::MultiLineString(table.lines(member("arcs")?)?),
        "Polygon" => Geometry::Polygon(table.lines(member("arcs")?)?),
        "MultiPolygon" => Geometry::MultiPolygon(
            json_array(member("arcs")?)?
                .iter()
                .map(|polygon| table.lines(polygon))
                .collect::<Result<_, _>>()?,
        ),
        "GeometryCollection" => Geometry::GeometryCollection(
            json_array(member("geometries")?)?
                .iter()
                .map(|g| resolve(g, table, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        other => {
            return Err(ParseError::schema(format!(
                "unsupported TopoJSON geometry type '{}'",
                other
            )))
        }
    };
    Ok(geometry)
}
