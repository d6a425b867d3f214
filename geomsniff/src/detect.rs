//! Détection du format d'une valeur de géométrie
//!
//! Liste ordonnée de règles, la première qui correspond gagne. Une règle qui
//! échoue à inspecter la valeur (hex invalide, JSON illisible...) ne
//! correspond simplement pas.

use memchr::memchr_iter;
use serde_json::Value;

use crate::codec::{earth_engine, geojson, kml, topojson, wkb, wkt};
use crate::types::FormatTag;

/// Longueur minimale d'un WKB: marqueur + mot de type
const MIN_WKB_BYTES: usize = 5;

/// Détermine le format d'une ligne
///
/// - un `hint` autre que `Unknown` est retourné tel quel;
/// - X et Y présents (et finis) donnent `Xy`;
/// - sinon la valeur brute est inspectée.
pub fn detect(
    raw: Option<&str>,
    x: Option<f64>,
    y: Option<f64>,
    hint: Option<FormatTag>,
) -> FormatTag {
    if let Some(hint) = hint.filter(|h| *h != FormatTag::Unknown) {
        return hint;
    }

    if let (Some(x), Some(y)) = (x, y) {
        if x.is_finite() && y.is_finite() {
            return FormatTag::Xy;
        }
    }

    raw.map_or(FormatTag::Unknown, detect_text)
}

/// Détermine le format d'une valeur texte seule
pub fn detect_text(raw: &str) -> FormatTag {
    let value = raw.trim();

    if value.is_empty() {
        return FormatTag::Unknown;
    }
    if wkt::split_srid_prefix(value).is_some() {
        return FormatTag::Ewkt;
    }
    if is_wkt(value) {
        return FormatTag::Wkt;
    }
    if let Some(tag) = sniff_wkb(value) {
        return tag;
    }
    if value.starts_with(earth_engine::PREFIX) {
        return FormatTag::EarthEngine;
    }
    if value.starts_with('<') && has_kml_tag(value) {
        return FormatTag::Kml;
    }
    if value.starts_with('{') {
        if let Some(tag) = sniff_json(value) {
            return tag;
        }
    }

    FormatTag::Unknown
}

/// Mot-clé WKT, tag de dimension optionnel, puis `(`
fn is_wkt(value: &str) -> bool {
    let word_end = value
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(value.len());

    let Some((_, dim)) = wkt::split_keyword(&value[..word_end]) else {
        return false;
    };

    let mut rest = value[word_end..].trim_start();

    if dim == wkt::Dimension::Xy {
        let tag_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if ["Z", "M", "ZM"].iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            rest = rest[tag_end..].trim_start();
        }
    }

    rest.starts_with('(')
}

/// Hex pair, marqueur 00/01, au moins 5 octets: WKB, ou EWKB si le
/// drapeau SRID est levé dans le mot de type
fn sniff_wkb(value: &str) -> Option<FormatTag> {
    if value.len() % 2 != 0
        || value.len() < MIN_WKB_BYTES * 2
        || !value.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }

    let head = hex::decode(&value[..MIN_WKB_BYTES * 2]).ok()?;
    let word = wkb::peek_type_word(&head)?;

    Some(if word & wkb::SRID_FLAG != 0 {
        FormatTag::Ewkb
    } else {
        FormatTag::Wkb
    })
}

/// Cherche une balise ouvrante de géométrie KML (préfixe de namespace permis)
fn has_kml_tag(value: &str) -> bool {
    let bytes = value.as_bytes();

    memchr_iter(b'<', bytes).any(|start| {
        let name = &bytes[start + 1..];
        let end = name
            .iter()
            .position(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'))
            .unwrap_or(name.len());
        let name = &name[..end];

        let local = match name.iter().rposition(|b| *b == b':') {
            Some(colon) => &name[colon + 1..],
            None => name,
        };

        kml::GEOMETRY_TAGS
            .iter()
            .any(|tag| local.eq_ignore_ascii_case(tag.as_bytes()))
    })
}

/// Objet JSON: TopoJSON (arcs + objets) d'abord, puis GeoJSON
fn sniff_json(value: &str) -> Option<FormatTag> {
    let json: Value = serde_json::from_str(value).ok()?;
    let object = json.as_object()?;

    if topojson::looks_like_topojson(object) {
        Some(FormatTag::TopoJson)
    } else if geojson::looks_like_geojson(object) {
        Some(FormatTag::GeoJson)
    } else {
        None
    }
}
