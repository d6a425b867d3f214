//! Codec WKB / EWKB (hexadécimal)
//!
//! Structure d'une géométrie WKB:
//! - 1 octet: ordre des octets (0 = big endian, 1 = little endian)
//! - 4 octets: mot de type (code ISO + drapeaux EWKB)
//! - 4 octets: SRID, seulement si le drapeau `0x20000000` est levé
//! - la charge utile, récursive pour les Multi* et les collections

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_enum::TryFromPrimitive;

use crate::codec::MAX_DEPTH;
use crate::geometry::{Coord, Geometry};
use crate::types::{Parsed, Srid};
use crate::ParseError;

/// Drapeau EWKB: SRID présent
pub const SRID_FLAG: u32 = 0x2000_0000;
/// Drapeau EWKB: coordonnées Z
pub const Z_FLAG: u32 = 0x8000_0000;
/// Drapeau EWKB: coordonnées M
pub const M_FLAG: u32 = 0x4000_0000;

const FLAGS_MASK: u32 = SRID_FLAG | Z_FLAG | M_FLAG;

/// Codes de type WKB de base
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum WkbGeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

/// Ordre des octets déclaré par le premier octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    BigEndian,
    LittleEndian,
}

impl Endianness {
    /// Interprète le marqueur d'ordre des octets
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0 => Some(Endianness::BigEndian),
            1 => Some(Endianness::LittleEndian),
            _ => None,
        }
    }
}

/// Mot de type décodé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeWord {
    pub kind: WkbGeometryType,
    pub has_z: bool,
    pub has_m: bool,
    pub has_srid: bool,
}

impl TypeWord {
    /// Décode un mot de type (ISO 1000/2000/3000 et drapeaux EWKB)
    pub fn decode(raw: u32) -> Result<Self, ParseError> {
        let code = raw & !FLAGS_MASK;
        let (iso_z, iso_m) = match code / 1000 {
            0 => (false, false),
            1 => (true, false),
            2 => (false, true),
            3 => (true, true),
            _ => return Err(ParseError::UnknownTypeCode(raw)),
        };

        let kind = WkbGeometryType::try_from(code % 1000)
            .map_err(|_| ParseError::UnknownTypeCode(raw))?;

        Ok(Self {
            kind,
            has_z: iso_z || raw & Z_FLAG != 0,
            has_m: iso_m || raw & M_FLAG != 0,
            has_srid: raw & SRID_FLAG != 0,
        })
    }

    /// Nombre d'ordonnées par coordonnée
    fn dimensions(&self) -> usize {
        2 + usize::from(self.has_z) + usize::from(self.has_m)
    }
}

/// Lit le mot de type d'un buffer WKB sans décoder la géométrie
///
/// Utilisé par le détecteur pour distinguer WKB et EWKB.
pub fn peek_type_word(bytes: &[u8]) -> Option<u32> {
    let endianness = Endianness::from_marker(*bytes.first()?)?;
    let word = bytes.get(1..5)?;
    Some(match endianness {
        Endianness::BigEndian => BigEndian::read_u32(word),
        Endianness::LittleEndian => LittleEndian::read_u32(word),
    })
}

/// Parse une géométrie WKB ou EWKB encodée en hexadécimal
pub fn parse(value: &str) -> Result<Parsed, ParseError> {
    let bytes = decode_hex(value)?;
    parse_bytes(&bytes)
}

/// Parse une géométrie WKB ou EWKB binaire
pub fn parse_bytes(bytes: &[u8]) -> Result<Parsed, ParseError> {
    let mut reader = WkbReader::new(bytes);
    let (geometry, srid) = reader.read_geometry(0)?;

    if reader.remaining() > 0 {
        tracing::debug!(
            trailing = reader.remaining(),
            "Ignoring trailing bytes after WKB geometry"
        );
    }

    Ok(Parsed::with_srid(geometry, srid))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, ParseError> {
    hex::decode(value.trim()).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            ParseError::syntax(index, format!("invalid hex character {:?}", c))
        }
        hex::FromHexError::OddLength => ParseError::syntax(value.len(), "odd hex length"),
        other => ParseError::syntax(0, other.to_string()),
    })
}

/// Lecteur séquentiel sur un buffer WKB
struct WkbReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WkbReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::TruncatedBuffer {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Vérifie qu'il reste au moins `n` octets sans les consommer
    fn ensure(&self, n: usize) -> Result<(), ParseError> {
        if self.remaining() < n {
            return Err(ParseError::TruncatedBuffer {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self, endianness: Endianness) -> Result<u32, ParseError> {
        let bytes = self.take(4)?;
        Ok(match endianness {
            Endianness::BigEndian => BigEndian::read_u32(bytes),
            Endianness::LittleEndian => LittleEndian::read_u32(bytes),
        })
    }

    fn read_f64(&mut self, endianness: Endianness) -> Result<f64, ParseError> {
        let bytes = self.take(8)?;
        Ok(match endianness {
            Endianness::BigEndian => BigEndian::read_f64(bytes),
            Endianness::LittleEndian => LittleEndian::read_f64(bytes),
        })
    }

    /// Lit un compteur et vérifie que le buffer peut contenir `count * min_item_size` octets
    fn read_count(
        &mut self,
        endianness: Endianness,
        min_item_size: usize,
    ) -> Result<usize, ParseError> {
        let count = self.read_u32(endianness)? as usize;
        self.ensure(count.saturating_mul(min_item_size))?;
        Ok(count)
    }

    /// Lit une géométrie complète (en-tête + charge utile)
    fn read_geometry(&mut self, depth: usize) -> Result<(Geometry, Option<Srid>), ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::syntax(self.pos, "geometry nesting too deep"));
        }

        let marker_pos = self.pos;
        let marker = self.read_u8()?;
        let endianness = Endianness::from_marker(marker).ok_or_else(|| {
            ParseError::syntax(marker_pos, format!("invalid byte order marker {:#04x}", marker))
        })?;

        let type_word = TypeWord::decode(self.read_u32(endianness)?)?;
        let srid = if type_word.has_srid {
            Some(self.read_u32(endianness)?)
        } else {
            None
        };

        let geometry = self.read_payload(type_word, endianness, depth)?;
        Ok((geometry, srid))
    }

    /// Lit une sous-géométrie et vérifie son type
    fn read_part(
        &mut self,
        expected: WkbGeometryType,
        depth: usize,
    ) -> Result<Geometry, ParseError> {
        let part_pos = self.pos;
        let (geometry, _) = self.read_geometry(depth + 1)?;
        let matches = matches!(
            (expected, &geometry),
            (WkbGeometryType::Point, Geometry::Point(_))
                | (WkbGeometryType::LineString, Geometry::LineString(_))
                | (WkbGeometryType::Polygon, Geometry::Polygon(_))
        );
        if !matches {
            return Err(ParseError::syntax(
                part_pos,
                format!("expected {:?} part, found {}", expected, geometry.geometry_type()),
            ));
        }
        Ok(geometry)
    }

    fn read_payload(
        &mut self,
        type_word: TypeWord,
        endianness: Endianness,
        depth: usize,
    ) -> Result<Geometry, ParseError> {
        let coord_size = type_word.dimensions() * 8;

        match type_word.kind {
            WkbGeometryType::Point => {
                Ok(Geometry::Point(self.read_coord(type_word, endianness)?))
            }
            WkbGeometryType::LineString => Ok(Geometry::LineString(
                self.read_coords(type_word, endianness, coord_size)?,
            )),
            WkbGeometryType::Polygon => {
                let num_rings = self.read_count(endianness, 4)?;
                let mut rings = Vec::with_capacity(num_rings);
                for _ in 0..num_rings {
                    rings.push(self.read_coords(type_word, endianness, coord_size)?);
                }
                Ok(Geometry::Polygon(rings))
            }
            WkbGeometryType::MultiPoint => {
                let num_parts = self.read_count(endianness, 5 + 16)?;
                let mut points = Vec::with_capacity(num_parts);
                for _ in 0..num_parts {
                    if let Geometry::Point(c) = self.read_part(WkbGeometryType::Point, depth)? {
                        points.push(c);
                    }
                }
                Ok(Geometry::MultiPoint(points))
            }
            WkbGeometryType::MultiLineString => {
                let num_parts = self.read_count(endianness, 9)?;
                let mut lines = Vec::with_capacity(num_parts);
                for _ in 0..num_parts {
                    if let Geometry::LineString(l) =
                        self.read_part(WkbGeometryType::LineString, depth)?
                    {
                        lines.push(l);
                    }
                }
                Ok(Geometry::MultiLineString(lines))
            }
            WkbGeometryType::MultiPolygon => {
                let num_parts = self.read_count(endianness, 9)?;
                let mut polygons = Vec::with_capacity(num_parts);
                for _ in 0..num_parts {
                    if let Geometry::Polygon(p) =
                        self.read_part(WkbGeometryType::Polygon, depth)?
                    {
                        polygons.push(p);
                    }
                }
                Ok(Geometry::MultiPolygon(polygons))
            }
            WkbGeometryType::GeometryCollection => {
                let num_parts = self.read_count(endianness, 5)?;
                let mut children = Vec::with_capacity(num_parts);
                for _ in 0..num_parts {
                    // Le SRID d'une sous-géométrie est ignoré au profit de celui de l'enveloppe
                    let (child, _) = self.read_geometry(depth + 1)?;
                    children.push(child);
                }
                Ok(Geometry::GeometryCollection(children))
            }
        }
    }

    fn read_coords(
        &mut self,
        type_word: TypeWord,
        endianness: Endianness,
        coord_size: usize,
    ) -> Result<Vec<Coord>, ParseError> {
        let num_points = self.read_count(endianness, coord_size)?;
        let mut coords = Vec::with_capacity(num_points);
        for _ in 0..num_points {
            coords.push(self.read_coord(type_word, endianness)?);
        }
        Ok(coords)
    }

    fn read_coord(
        &mut self,
        type_word: TypeWord,
        endianness: Endianness,
    ) -> Result<Coord, ParseError> {
        let coord_pos = self.pos;
        let x = self.read_f64(endianness)?;
        let y = self.read_f64(endianness)?;
        let z = if type_word.has_z {
            Some(self.read_f64(endianness)?)
        } else {
            None
        };
        if type_word.has_m {
            // M est lu puis ignoré
            self.read_f64(endianness)?;
        }
        // POINT EMPTY est encodé en (NaN, NaN)
        if x.is_nan() && y.is_nan() {
            return Err(ParseError::syntax(coord_pos, "empty point"));
        }
        if !x.is_finite() || !y.is_finite() || z.is_some_and(|z| !z.is_finite()) {
            return Err(ParseError::syntax(coord_pos, "non-finite coordinate"));
        }
        Ok(Coord { x, y, z })
    }
}
