//! Types d'erreurs pour le crate geomsniff

use thiserror::Error;

/// Erreurs de parsing d'une valeur de géométrie
///
/// Toutes ces erreurs sont locales à une ligne: le classifieur les convertit
/// en `RowOutcome::Invalid`, elles n'interrompent jamais un import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Le buffer binaire est plus court que la structure déclarée
    #[error("Truncated buffer: {needed} bytes needed at offset {offset}, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Code de type WKB non reconnu
    #[error("Unknown geometry type code: {0:#010x}")]
    UnknownTypeCode(u32),

    /// Erreur de syntaxe (WKT, KML, DSL, hexadécimal)
    #[error("Syntax error at position {position}: {reason}")]
    SyntaxError { position: usize, reason: String },

    /// Structure JSON incompatible avec le type déclaré
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Constructeur Earth Engine inconnu
    #[error("Unknown constructor: ee.Geometry.{0}")]
    UnknownConstructor(String),

    /// Référence d'arc TopoJSON hors de la table
    #[error("Arc index {index} out of range (table has {len} arcs)")]
    ArcIndexOutOfRange { index: i64, len: usize },

    /// Valeur non numérique pour une coordonnée X/Y
    #[error("Not a number: {0:?}")]
    NotANumber(String),
}

impl ParseError {
    /// Crée une erreur de syntaxe avec contexte
    pub fn syntax(position: usize, reason: impl Into<String>) -> Self {
        Self::SyntaxError {
            position,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de schéma avec contexte
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaMismatch(reason.into())
    }

    /// Nom court de la variante, utilisé dans les logs et les rapports
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::TruncatedBuffer { .. } => "TruncatedBuffer",
            ParseError::UnknownTypeCode(_) => "UnknownTypeCode",
            ParseError::SyntaxError { .. } => "SyntaxError",
            ParseError::SchemaMismatch(_) => "SchemaMismatch",
            ParseError::UnknownConstructor(_) => "UnknownConstructor",
            ParseError::ArcIndexOutOfRange { .. } => "ArcIndexOutOfRange",
            ParseError::NotANumber(_) => "NotANumber",
        }
    }
}
