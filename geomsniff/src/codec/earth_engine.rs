//! Codec Earth Engine: expressions `ee.Geometry.<Kind>(...)`
//!
//! Seul le premier argument est lu (tableau de coordonnées). Les arguments
//! suivants (`proj`, `geodesic`, `evenOdd`...) sont ignorés.

use serde_json::Value;

use crate::codec::{json_array, json_polygons, json_position, json_positions, json_rings, parse_number};
use crate::geometry::{close_ring, Coord, Geometry};
use crate::types::Parsed;
use crate::ParseError;

/// Préfixe commun à toutes les expressions
pub const PREFIX: &str = "ee.Geometry.";

/// Constructeurs reconnus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constructor {
    Point,
    MultiPoint,
    LineString,
    LinearRing,
    MultiLineString,
    Polygon,
    MultiPolygon,
    Rectangle,
    BBox,
}

impl Constructor {
    const ALL: [(&'static str, Constructor); 9] = [
        ("Point", Constructor::Point),
        ("MultiPoint", Constructor::MultiPoint),
        ("LineString", Constructor::LineString),
        ("LinearRing", Constructor::LinearRing),
        ("MultiLineString", Constructor::MultiLineString),
        ("Polygon", Constructor::Polygon),
        ("MultiPolygon", Constructor::MultiPolygon),
        ("Rectangle", Constructor::Rectangle),
        ("BBox", Constructor::BBox),
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| *c)
    }

    fn build(self, args: &Value) -> Result<Geometry, ParseError> {
        let geometry = match self {
            Constructor::Point => Geometry::Point(json_position(args)?),
            Constructor::MultiPoint => Geometry::MultiPoint(json_positions(args)?),
            Constructor::LineString => Geometry::LineString(json_positions(args)?),
            Constructor::LinearRing => Geometry::Polygon(vec![close_ring(json_positions(args)?)]),
            Constructor::MultiLineString => Geometry::MultiLineString(json_rings(args)?),
            Constructor::Polygon => Geometry::Polygon(polygon_rings(args)?),
            Constructor::MultiPolygon => Geometry::MultiPolygon(
                json_polygons(args)?
                    .into_iter()
                    .map(|rings| rings.into_iter().map(close_ring).collect())
                    .collect(),
            ),
            Constructor::Rectangle | Constructor::BBox => rectangle(args)?,
        };
        Ok(geometry)
    }
}

/// Parse une expression Earth Engine
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let value = value.trim();
    let rest = value
        .strip_prefix(PREFIX)
        .ok_or_else(|| ParseError::syntax(0, format!("expected '{}'", PREFIX)))?;

    let open = rest
        .find('(')
        .ok_or_else(|| ParseError::syntax(value.len(), "expected '('"))?;
    let name = rest[..open].trim();

    let constructor =
        Constructor::from_name(name).ok_or_else(|| ParseError::UnknownConstructor(name.to_string()))?;

    if !value.ends_with(')') {
        return Err(ParseError::syntax(value.len(), "expected ')' at end of expression"));
    }

    let args_start = PREFIX.len() + open + 1;
    let args = &value[args_start..value.len() - 1];
    let first = first_argument(args, args_start)?;

    Ok(Parsed::new(constructor.build(&first)?))
}

/// Extrait le premier argument sous forme de valeur JSON
///
/// `[...]` est pris jusqu'au crochet fermant correspondant. Sinon les deux
/// premiers nombres forment un point (`Point(x, y)`).
fn first_argument(args: &str, offset: usize) -> Result<Value, ParseError> {
    let trimmed = args.trim_start();
    let offset = offset + (args.len() - trimmed.len());

    if trimmed.is_empty() {
        return Err(ParseError::syntax(offset, "missing arguments"));
    }

    if trimmed.starts_with('[') {
        let end = matching_bracket(trimmed)
            .ok_or_else(|| ParseError::syntax(offset, "unbalanced brackets"))?;

        let after = trimmed[end + 1..].trim_start();
        if !(after.is_empty() || after.starts_with(',')) {
            return Err(ParseError::syntax(
                offset + end + 1,
                "unexpected text after coordinate array",
            ));
        }

        return serde_json::from_str(&trimmed[..=end])
            .map_err(|e| ParseError::syntax(offset + e.column().saturating_sub(1), e.to_string()));
    }

    let numbers = trimmed
        .split(',')
        .take(2)
        .map(|token| parse_number(token).map(Value::from))
        .collect::<Option<Vec<_>>>()
        .filter(|n| n.len() == 2)
        .ok_or_else(|| ParseError::syntax(offset, "expected a coordinate array or 'x, y'"))?;

    Ok(Value::Array(numbers))
}

/// Position du `]` qui ferme le `[` initial
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Anneaux d'un polygone; une liste de points seule forme l'anneau extérieur
fn polygon_rings(args: &Value) -> Result<Vec<Vec<Coord>>, ParseError> {
    let single_ring = json_array(args)?
        .first()
        .and_then(Value::as_array)
        .and_then(|first| first.first())
        .is_some_and(Value::is_number);

    let rings = if single_ring {
        vec![json_positions(args)?]
    } else {
        json_rings(args)?
    };

    Ok(rings.into_iter().map(close_ring).collect())
}

/// `[minX, minY, maxX, maxY]` ou `[[x0, y0], [x1, y1]]`
fn rectangle(args: &Value) -> Result<Geometry, ParseError> {
    let items = json_array(args)?;

    let (a, b) = if items.len() == 2 {
        (json_position(&items[0])?, json_position(&items[1])?)
    } else if items.len() == 4 {
        let mut n = [0.0; 4];
        for (slot, item) in n.iter_mut().zip(items) {
            *slot = item
                .as_f64()
                .ok_or_else(|| ParseError::schema("rectangle bounds must be numbers"))?;
        }
        (Coord::xy(n[0], n[1]), Coord::xy(n[2], n[3]))
    } else {
        return Err(ParseError::schema(format!(
            "rectangle needs 4 numbers or 2 corners, got {} items",
            items.len()
        )));
    };

    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));

    Ok(Geometry::Polygon(vec![vec![
        Coord::xy(min_x, min_y),
        Coord::xy(max_x, min_y),
        Coord::xy(max_x, max_y),
        Coord::xy(min_x, max_y),
        Coord::xy(min_x, min_y),
    ]]))
}
