//! Codec X-Y: point depuis deux colonnes numériques

use crate::codec::parse_number;
use crate::geometry::{Coord, Geometry};
use crate::types::Parsed;
use crate::ParseError;

/// Construit un point depuis les textes X et Y
pub fn parse(x: &str, y: &str) -> Result<Parsed, ParseError> {
    let x = number(x)?;
    let y = number(y)?;
    Ok(Parsed::new(Geometry::Point(Coord::xy(x, y))))
}

/// Construit un point depuis une cellule unique `"x,y"` (ou `"x y"`, `"x;y"`)
pub fn parse_single(value: &str) -> Result<Parsed, ParseError> {
    let parts: Vec<&str> = value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();

    match parts.as_slice() {
        [x, y] => parse(x, y),
        _ => Err(ParseError::NotANumber(value.to_string())),
    }
}

/// Convertit une coordonnée, NaN et infinis refusés
pub fn number(value: &str) -> Result<f64, ParseError> {
    parse_number(value).ok_or_else(|| ParseError::NotANumber(value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let parsed = parse("2.35", "48.85").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(2.35, 48.85)));
        assert_eq!(parsed.srid, None);
    }

    #[test]
    fn test_parse_pair_with_spaces() {
        let parsed = parse(" -1.5 ", "+3e2").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(-1.5, 300.0)));
    }

    #[test]
    fn test_not_a_number() {
        assert_eq!(
            parse("abc", "1").unwrap_err(),
            ParseError::NotANumber("abc".to_string())
        );
        assert!(matches!(parse("1", ""), Err(ParseError::NotANumber(_))));
        assert!(matches!(parse("inf", "1"), Err(ParseError::NotANumber(_))));
    }

    #[test]
    fn test_parse_single() {
        let parsed = parse_single("10.5, 20.25").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(10.5, 20.25)));

        let parsed = parse_single("10 20").unwrap();
        assert_eq!(parsed.geometry, Geometry::Point(Coord::xy(10.0, 20.0)));

        assert!(matches!(parse_single("10"), Err(ParseError::NotANumber(_))));
        assert!(matches!(parse_single("1,2,3"), Err(ParseError::NotANumber(_))));
    }
}
