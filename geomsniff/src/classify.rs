//! Classification des lignes: détection + parsing → valide, nulle ou invalide
//!
//! Une erreur de parsing ne sort jamais d'ici: elle devient `Invalid` et la
//! ligne suivante est traitée normalement.

use rayon::prelude::*;
use tracing::debug;

use crate::codec::{self, parse_number, xy};
use crate::detect::detect;
use crate::types::{DetectionStats, FormatTag, Parsed, RowInput, RowOutcome};
use crate::ParseError;

/// Classe une ligne
///
/// `hint` force le format (sauf `Unknown`, qui vaut détection automatique).
/// `skip_invalid` ne change pas le résultat: il ne sert qu'à l'appelant pour
/// décider du sort des lignes invalides (voir [`RowClassifier::should_emit`]).
pub fn classify(input: RowInput<'_>, hint: Option<FormatTag>, skip_invalid: bool) -> RowOutcome {
    let hint = hint.filter(|h| *h != FormatTag::Unknown);

    let result = match hint {
        Some(FormatTag::Xy) => match (input.x_trimmed(), input.y_trimmed()) {
            (None, None) => return RowOutcome::Null,
            (x, y) => xy::parse(x.unwrap_or_default(), y.unwrap_or_default()),
        },
        Some(format) => match input.raw_trimmed() {
            None => return RowOutcome::Null,
            Some(raw) => codec::parse(format, raw),
        },
        None => match classify_auto(&input) {
            Some(result) => result,
            None => return RowOutcome::Null,
        },
    };

    match result {
        Ok(parsed) => RowOutcome::Valid {
            geometry: parsed.geometry,
            srid: parsed.srid,
        },
        Err(error) => {
            let raw_value = raw_value(&input, hint);
            debug!(
                error = %error,
                kind = error.kind(),
                skipped = skip_invalid,
                "Invalid geometry value: {}",
                truncate(&raw_value, 80)
            );
            RowOutcome::Invalid { raw_value }
        }
    }
}

/// Détection automatique; `None` si la ligne n'a aucune valeur
fn classify_auto(input: &RowInput<'_>) -> Option<Result<Parsed, ParseError>> {
    let raw = input.raw_trimmed();
    let (x, y) = (input.x_trimmed(), input.y_trimmed());

    if raw.is_none() && x.is_none() && y.is_none() {
        return None;
    }

    let format = detect(raw, x.and_then(parse_number), y.and_then(parse_number), None);

    let result = match (format, raw) {
        (FormatTag::Xy, _) => xy::parse(x.unwrap_or_default(), y.unwrap_or_default()),
        (FormatTag::Unknown, _) | (_, None) => {
            Err(ParseError::syntax(0, "unrecognized geometry format"))
        }
        (format, Some(raw)) => codec::parse(format, raw),
    };

    Some(result)
}

/// Valeur brute conservée pour une ligne invalide: la cellule telle quelle,
/// ou `"x,y"` pour une paire de coordonnées
fn raw_value(input: &RowInput<'_>, hint: Option<FormatTag>) -> String {
    let pair = || format!("{},{}", input.x.unwrap_or_default(), input.y.unwrap_or_default());

    match (hint, input.raw_trimmed()) {
        (Some(FormatTag::Xy), _) => pair(),
        (_, Some(_)) => input.raw.unwrap_or_default().to_string(),
        (_, None) => pair(),
    }
}

fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Options d'un import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Format imposé (`None` ou `Unknown`: détection automatique)
    pub hint: Option<FormatTag>,
    /// Les lignes invalides sont omises de la couche principale
    pub skip_invalid: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            hint: None,
            skip_invalid: true,
        }
    }
}

/// Classifieur d'un import: options + compteurs cumulés
#[derive(Debug, Clone, Default)]
pub struct RowClassifier {
    options: ClassifyOptions,
    stats: DetectionStats,
}

impl RowClassifier {
    pub fn new(options: ClassifyOptions) -> Self {
        Self {
            options,
            stats: DetectionStats::default(),
        }
    }

    pub fn options(&self) -> &ClassifyOptions {
        &self.options
    }

    /// Classe une ligne et met à jour les compteurs
    pub fn classify(&mut self, input: RowInput<'_>) -> RowOutcome {
        let outcome = classify(input, self.options.hint, self.options.skip_invalid);
        self.stats.record(&outcome);
        outcome
    }

    /// Classe un lot de lignes en parallèle (ordre des lignes conservé)
    pub fn classify_batch(&mut self, rows: &[RowInput<'_>]) -> Vec<RowOutcome> {
        let (outcomes, stats) = classify_batch(rows, &self.options);
        self.stats += stats;
        outcomes
    }

    /// Vrai si la ligne doit figurer dans la couche principale
    pub fn should_emit(&self, outcome: &RowOutcome) -> bool {
        !(outcome.is_invalid() && self.options.skip_invalid)
    }

    /// Compteurs depuis le dernier `reset`
    pub fn stats(&self) -> DetectionStats {
        self.stats
    }

    /// Remise à zéro en début d'import
    pub fn reset(&mut self) {
        self.stats.reset();
    }
}

/// Classe un lot de lignes sur le pool rayon
///
/// Chaque worker tient ses propres compteurs, fusionnés à la fin.
pub fn classify_batch(
    rows: &[RowInput<'_>],
    options: &ClassifyOptions,
) -> (Vec<RowOutcome>, DetectionStats) {
    let outcomes: Vec<RowOutcome> = rows
        .par_iter()
        .map(|row| classify(*row, options.hint, options.skip_invalid))
        .collect();

    let stats = outcomes
        .par_iter()
        .fold(DetectionStats::default, |mut stats, outcome| {
            stats.record(outcome);
            stats
        })
        .reduce(DetectionStats::default, DetectionStats::merge);

    (outcomes, stats)
}
