//! # csv-geom-import
//!
//! Import de fichiers CSV portant une colonne géométrie vers des couches
//! GeoJSON, avec détection automatique du format par `geomsniff`.
//!
//! ## Features
//!
//! - Lecture CSV en continu, par lots, avec séparateur, en-tête et encodage
//!   configurables
//! - Détection de la colonne géométrie (ou des colonnes X/Y) par nom ou
//!   par contenu
//! - Classification des lignes par lots en parallèle
//! - Couche principale GeoJSON, couches de rapport `_Null_Geom` et
//!   `_Invalid_Geom` en CSV
//! - Rapport d'import (console, JSON)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import avec détection automatique
//! csv-geom-import import --input ./communes.csv --output ./out/
//!
//! # Colonnes X/Y, rapport détaillé
//! csv-geom-import import --input ./points.csv --output ./out/ \
//!     --x-column lon --y-column lat --detailed-report
//!
//! # Formats détectés par colonne
//! csv-geom-import detect --input ./communes.csv
//! ```

pub mod config;
pub mod export;
pub mod import;
pub mod reader;
pub mod report;

pub use config::ImportConfig;
pub use import::{detect_columns, run_import, ColumnDetection};
pub use report::{ImportReport, ImportStatus};
