//! # geomsniff
//!
//! Détection automatique et parsing de géométries encodées en texte, telles
//! qu'on les trouve dans les colonnes de fichiers CSV.
//!
//! ## Features
//!
//! - Neuf formats: WKT, EWKT, WKB, EWKB (hex), GeoJSON, KML, Earth Engine,
//!   TopoJSON, paires de coordonnées X-Y
//! - Détection par règles ordonnées, sans jamais paniquer
//! - Classification des lignes en valides / nulles / invalides, avec compteurs
//! - Classification par lots en parallèle avec `rayon`
//! - Conversion vers les types `geo` pour l'interopérabilité avec l'écosystème
//!   Rust géospatial
//!
//! ## Usage
//!
//! ```rust
//! use geomsniff::{classify, detect, FormatTag, RowInput, RowOutcome};
//!
//! assert_eq!(detect(Some("SRID=4326;POINT(1 2)"), None, None, None), FormatTag::Ewkt);
//!
//! match classify(RowInput::text("POINT(2.35 48.85)"), None, true) {
//!     RowOutcome::Valid { geometry, srid } => {
//!         println!("{} (SRID {:?})", geometry.geometry_type(), srid);
//!     }
//!     RowOutcome::Null => println!("vide"),
//!     RowOutcome::Invalid { raw_value } => println!("invalide: {}", raw_value),
//! }
//! ```

pub mod classify;
pub mod codec;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod types;

pub use classify::{classify, classify_batch, ClassifyOptions, RowClassifier};
pub use detect::{detect, detect_text};
pub use error::ParseError;
pub use geometry::{Coord, Geometry};
pub use types::{DetectionStats, FormatTag, Parsed, RowInput, RowOutcome, Srid};

/// Parse une valeur dans un format connu
///
/// Raccourci pour [`codec::parse`].
pub fn parse(format: FormatTag, value: &str) -> Result<Parsed, ParseError> {
    codec::parse(format, value)
}
