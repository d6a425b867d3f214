//! Codec WKT / EWKT
//!
//! Parser descendant récursif écrit à la main: mot-clé de géométrie, tag de
//! dimension optionnel (`Z`, `M`, `ZM`), puis groupes de parenthèses
//! imbriqués. Préfixe EWKT `SRID=<n>;` reconnu avant le corps.

use std::sync::OnceLock;

use regex::Regex;

use crate::codec::{parse_number, MAX_DEPTH};
use crate::geometry::{Coord, Geometry};
use crate::types::{Parsed, Srid};
use crate::ParseError;

/// Mots-clés WKT supportés
pub const KEYWORDS: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

fn srid_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i:SRID)=(\d+);").expect("static regex"))
}

/// Sépare le préfixe EWKT `SRID=<n>;` du corps
///
/// Retourne `None` si la valeur ne commence pas par ce préfixe.
pub fn split_srid_prefix(value: &str) -> Option<(&str, &str)> {
    let caps = srid_prefix().captures(value)?;
    let digits = caps.get(1)?.as_str();
    let body = &value[caps.get(0)?.end()..];
    Some((digits, body))
}

/// Parse une valeur WKT ou EWKT
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let value = value.trim();

    let (srid, body, offset) = match split_srid_prefix(value) {
        Some((digits, body)) => {
            let srid: Srid = digits
                .parse()
                .map_err(|_| ParseError::syntax(5, format!("SRID out of range: {}", digits)))?;
            (Some(srid), body, value.len() - body.len())
        }
        None => (None, value, 0),
    };

    let mut parser = WktParser::new(body, offset);
    let geometry = parser.parse_geometry(0)?;
    parser.expect_end()?;

    Ok(Parsed::with_srid(geometry, srid))
}

/// Découpe le mot-clé et un éventuel tag de dimension collé (`POINTZ`)
///
/// Retourne le mot-clé canonique et le tag.
pub fn split_keyword(word: &str) -> Option<(&'static str, Dimension)> {
    let upper = word.to_ascii_uppercase();
    for (suffix, dim) in [
        ("", Dimension::Xy),
        ("ZM", Dimension::Xyzm),
        ("Z", Dimension::Xyz),
        ("M", Dimension::Xym),
    ] {
        let Some(base) = upper.strip_suffix(suffix) else {
            continue;
        };
        if let Some(keyword) = KEYWORDS.iter().find(|k| **k == base) {
            return Some((*keyword, dim));
        }
    }
    None
}

/// Dimensions déclarées par le tag WKT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Pas de tag: 2 à 4 ordonnées acceptées (X Y [Z [M]])
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl Dimension {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "Z" => Some(Dimension::Xyz),
            "M" => Some(Dimension::Xym),
            "ZM" => Some(Dimension::Xyzm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Number(&'a str),
    LParen,
    RParen,
    Comma,
    End,
}

struct WktParser<'a> {
    src: &'a str,
    pos: usize,
    /// Décalage dans la valeur d'origine (longueur du préfixe SRID)
    offset: usize,
    peeked: Option<(Token<'a>, usize, usize)>,
}

impl<'a> WktParser<'a> {
    fn new(src: &'a str, offset: usize) -> Self {
        Self {
            src,
            pos: 0,
            offset,
            peeked: None,
        }
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> ParseError {
        ParseError::syntax(self.offset + at, reason)
    }

    fn peek(&mut self) -> &(Token<'a>, usize, usize) {
        let (src, pos) = (self.src, self.pos);
        self.peeked.get_or_insert_with(|| lex(src, pos))
    }

    fn next(&mut self) -> (Token<'a>, usize, usize) {
        let token = match self.peeked.take() {
            Some(t) => t,
            None => lex(self.src, self.pos),
        };
        self.pos = token.2;
        token
    }

    fn expect(&mut self, expected: Token<'static>, what: &str) -> Result<(), ParseError> {
        let (token, start, _) = self.next();
        if token == expected {
            Ok(())
        } else {
            Err(self.error(start, format!("expected {}, found {}", what, describe(&token))))
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        let (token, start, _) = self.next();
        match token {
            Token::End => Ok(()),
            other => Err(self.error(start, format!("trailing {}", describe(&other)))),
        }
    }

    /// Consomme `EMPTY` s'il suit
    fn take_empty(&mut self) -> bool {
        if matches!(self.peek().0, Token::Word(w) if w.eq_ignore_ascii_case("EMPTY")) {
            self.next();
            true
        } else {
            false
        }
    }

    /// Consomme une virgule si présente, sinon attend `)`
    fn list_continues(&mut self) -> Result<bool, ParseError> {
        let (token, start, _) = self.next();
        match token {
            Token::Comma => Ok(true),
            Token::RParen => Ok(false),
            other => Err(self.error(start, format!("expected ',' or ')', found {}", describe(&other)))),
        }
    }

    fn parse_geometry(&mut self, depth: usize) -> Result<Geometry, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error(self.pos, "geometry nesting too deep"));
        }

        let (token, start, _) = self.next();
        let Token::Word(word) = token else {
            return Err(self.error(start, format!("expected geometry keyword, found {}", describe(&token))));
        };

        let (keyword, mut dim) = split_keyword(word)
            .ok_or_else(|| self.error(start, format!("unknown geometry keyword {:?}", word)))?;

        // Tag de dimension séparé: `POINT Z (...)`
        if let Token::Word(tag) = self.peek().0 {
            if let Some(tagged) = Dimension::from_tag(tag) {
                dim = tagged;
                self.next();
            }
        }

        let empty = self.take_empty();

        match keyword {
            "POINT" => {
                if empty {
                    return Err(self.error(start, "POINT EMPTY has no coordinates"));
                }
                self.expect(Token::LParen, "'('")?;
                let coord = self.parse_coord(dim)?;
                self.expect(Token::RParen, "')'")?;
                Ok(Geometry::Point(coord))
            }
            "LINESTRING" => Ok(Geometry::LineString(self.parse_coord_list(dim, empty)?)),
            "POLYGON" => Ok(Geometry::Polygon(self.parse_ring_list(dim, empty)?)),
            "MULTIPOINT" => Ok(Geometry::MultiPoint(self.parse_multipoint(dim, empty)?)),
            "MULTILINESTRING" => Ok(Geometry::MultiLineString(self.parse_ring_list(dim, empty)?)),
            "MULTIPOLYGON" => {
                let mut polygons = Vec::new();
                if !empty {
                    self.expect(Token::LParen, "'('")?;
                    loop {
                        let polygon_empty = self.take_empty();
                        polygons.push(self.parse_ring_list(dim, polygon_empty)?);
                        if !self.list_continues()? {
                            break;
                        }
                    }
                }
                Ok(Geometry::MultiPolygon(polygons))
            }
            _ => {
                let mut children = Vec::new();
                if !empty {
                    self.expect(Token::LParen, "'('")?;
                    loop {
                        children.push(self.parse_geometry(depth + 1)?);
                        if !self.list_continues()? {
                            break;
                        }
                    }
                }
                Ok(Geometry::GeometryCollection(children))
            }
        }
    }

    /// `X Y [Z [M]]`
    fn parse_coord(&mut self, dim: Dimension) -> Result<Coord, ParseError> {
        let mut values = [0.0_f64; 4];
        let mut count = 0;

        while let Token::Number(text) = self.peek().0 {
            let (_, start, _) = self.next();
            if count == 4 {
                return Err(self.error(start, "too many ordinates"));
            }
            values[count] = parse_number(text)
                .ok_or_else(|| self.error(start, format!("invalid number {:?}", text)))?;
            count += 1;
        }

        let (expected_min, expected_max) = match dim {
            Dimension::Xy => (2, 4),
            Dimension::Xyz | Dimension::Xym => (3, 3),
            Dimension::Xyzm => (4, 4),
        };
        if count < expected_min || count > expected_max {
            let (token, start, _) = self.peek().clone();
            return Err(self.error(
                start,
                format!(
                    "expected {} ordinates, found {} before {}",
                    expected_min,
                    count,
                    describe(&token)
                ),
            ));
        }

        let z = match (dim, count) {
            (Dimension::Xym, _) => None,
            (_, n) if n >= 3 => Some(values[2]),
            _ => None,
        };
        Ok(Coord {
            x: values[0],
            y: values[1],
            z,
        })
    }

    /// `(c, c, ...)` ou rien si EMPTY
    fn parse_coord_list(&mut self, dim: Dimension, empty: bool) -> Result<Vec<Coord>, ParseError> {
        let mut coords = Vec::new();
        if empty {
            return Ok(coords);
        }
        self.expect(Token::LParen, "'('")?;
        loop {
            coords.push(self.parse_coord(dim)?);
            if !self.list_continues()? {
                break;
            }
        }
        Ok(coords)
    }

    /// `((...), (...))` ou rien si EMPTY
    fn parse_ring_list(
        &mut self,
        dim: Dimension,
        empty: bool,
    ) -> Result<Vec<Vec<Coord>>, ParseError> {
        let mut rings = Vec::new();
        if empty {
            return Ok(rings);
        }
        self.expect(Token::LParen, "'('")?;
        loop {
            let ring_empty = self.take_empty();
            rings.push(self.parse_coord_list(dim, ring_empty)?);
            if !self.list_continues()? {
                break;
            }
        }
        Ok(rings)
    }

    /// `MULTIPOINT(1 2, 3 4)` et `MULTIPOINT((1 2), (3 4))`
    fn parse_multipoint(&mut self, dim: Dimension, empty: bool) -> Result<Vec<Coord>, ParseError> {
        let mut points = Vec::new();
        if empty {
            return Ok(points);
        }
        self.expect(Token::LParen, "'('")?;
        loop {
            if self.peek().0 == Token::LParen {
                self.next();
                points.push(self.parse_coord(dim)?);
                self.expect(Token::RParen, "')'")?;
            } else if !self.take_empty() {
                points.push(self.parse_coord(dim)?);
            }
            if !self.list_continues()? {
                break;
            }
        }
        Ok(points)
    }
}

/// Lit le prochain token à partir de `from`: (token, début, fin)
fn lex(src: &str, from: usize) -> (Token<'_>, usize, usize) {
    let bytes = src.as_bytes();
    let mut start = from;
    while start < bytes.len() && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    if start >= bytes.len() {
        return (Token::End, start, start);
    }

    let c = bytes[start];
    match c {
        b'(' => (Token::LParen, start, start + 1),
        b')' => (Token::RParen, start, start + 1),
        b',' => (Token::Comma, start, start + 1),
        _ => {
            let is_number = c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.');
            let mut end = start + 1;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'+' | b'-' | b'.'))
            {
                end += 1;
            }
            // Caractère non ASCII isolé: on avance d'un caractère complet
            if end == start + 1 && !c.is_ascii() {
                end = start + src[start..].chars().next().map_or(1, char::len_utf8);
            }
            let text = &src[start..end];
            if is_number {
                (Token::Number(text), start, end)
            } else {
                (Token::Word(text), start, end)
            }
        }
    }
}

fn describe(token: &Token<'_>) -> String {
    match token {
        Token::Word(w) => format!("{:?}", w),
        Token::Number(n) => format!("number {}", n),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::End => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(x: f64, y: f64) -> Coord {
        Coord::xy(x, y)
    }

    #[test]
    fn test_parse_point() {
        let parsed = parse("POINT(30 10)").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(xy(30.0, 10.0)));
        assert_eq!(parsed.srid, None);
    }

    #[test]
    fn test_parse_ewkt_point() {
        let parsed = parse("SRID=4326;POINT(30 10)").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(xy(30.0, 10.0)));
        assert_eq!(parsed.srid, Some(4326));

        let parsed = parse("srid=2154;point (1 2)").unwrap();
        assert_eq!(parsed.srid, Some(2154));
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        assert!(matches!(
            parse("POINT(30 10"),
            Err(ParseError::SyntaxError { .. })
        ));
        assert!(matches!(
            parse("POLYGON((0 0, 1 0, 1 1, 0 0)"),
            Err(ParseError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_non_numeric_coordinate() {
        assert!(matches!(
            parse("POINT(30 abc)"),
            Err(ParseError::SyntaxError { .. })
        ));
        assert!(matches!(
            parse("POINT(30 1.5x)"),
            Err(ParseError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(parse("POINT(30 10) extra").is_err());
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let parsed =
            parse("POLYGON ((35 10, 45 45, 15 40, 10 20, 35 10), (20 30, 35 35, 30 20, 20 30))")
                .unwrap();
        match parsed.geometry {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], rings[0][4]);
                assert_eq!(rings[1][1], xy(35.0, 35.0));
            }
            other => panic!("Expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_multipoint_both_forms() {
        let expected = Geometry::MultiPoint(vec![xy(10.0, 40.0), xy(40.0, 30.0)]);
        assert_eq!(parse("MULTIPOINT ((10 40), (40 30))").unwrap().geometry, expected);
        assert_eq!(parse("MULTIPOINT (10 40, 40 30)").unwrap().geometry, expected);
    }

    #[test]
    fn test_parse_multipolygon() {
        let parsed = parse(
            "MULTIPOLYGON (((30 20, 45 40, 10 40, 30 20)), ((15 5, 40 10, 10 20, 5 10, 15 5)))",
        )
        .unwrap();
        match parsed.geometry {
            Geometry::MultiPolygon(polygons) => {
                assert_eq!(polygons.len(), 2);
                assert_eq!(polygons[1][0].len(), 5);
            }
            other => panic!("Expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_geometry_collection() {
        let parsed =
            parse("GEOMETRYCOLLECTION (POINT (40 10), LINESTRING (10 10, 20 20, 10 40), LINESTRING EMPTY)")
                .unwrap();
        match parsed.geometry {
            Geometry::GeometryCollection(children) => {
                assert_eq!(children.len(), 3);
                assert_eq!(children[0], Geometry::Point(xy(40.0, 10.0)));
                assert_eq!(children[2], Geometry::LineString(Vec::new()));
            }
            other => panic!("Expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_dimension_tags() {
        let parsed = parse("POINT Z (1 2 3)").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xyz(1.0, 2.0, 3.0)));

        let parsed = parse("POINTZ(1 2 3)").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xyz(1.0, 2.0, 3.0)));

        // M est ignoré
        let parsed = parse("POINT M (1 2 9)").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(xy(1.0, 2.0)));

        let parsed = parse("LINESTRING ZM (1 2 3 4, 5 6 7 8)").unwrap();
        assert_eq!(
            parsed.geometry,
            Geometry::LineString(vec![Coord::xyz(1.0, 2.0, 3.0), Coord::xyz(5.0, 6.0, 7.0)])
        );

        assert!(parse("POINT Z (1 2)").is_err());
    }

    #[test]
    fn test_point_empty_is_error() {
        assert!(parse("POINT EMPTY").is_err());
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(split_keyword("point"), Some(("POINT", Dimension::Xy)));
        assert_eq!(split_keyword("MultiPolygonZM"), Some(("MULTIPOLYGON", Dimension::Xyzm)));
        assert_eq!(split_keyword("POINTS"), None);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = MAX_DEPTH + 5;
        let wkt = format!(
            "{}POINT(1 2){}",
            "GEOMETRYCOLLECTION(".repeat(depth),
            ")".repeat(depth)
        );
        assert!(matches!(parse(&wkt), Err(ParseError::SyntaxError { .. })));
    }

    #[test]
    fn test_unicode_garbage_does_not_panic() {
        assert!(parse("POINT(1 é)").is_err());
        assert!(parse("POINT(日本 2)").is_err());
    }
}
