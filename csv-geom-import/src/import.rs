//! Import d'un CSV: lecture, classification et écriture par lots

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use geomsniff::{
    detect, detect_text, ClassifyOptions, FormatTag, RowClassifier, RowInput, RowOutcome,
};
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::export::geojson::{layer_path, LayerWriter};
use crate::export::ReportLayers;
use crate::reader::{resolve_columns, CsvSource, GeometryColumns, SAMPLE_PREFIX};
use crate::report::ImportReport;

/// Importe `input` vers `<output_dir>/<couche>.geojson`
///
/// Le fichier est lu `batch_size` enregistrements à la fois; chaque lot est
/// classé puis écrit avant la lecture du suivant. Les erreurs de ligne ne
/// sont jamais fatales: seules les erreurs de lecture, de configuration ou
/// d'écriture interrompent l'import.
pub fn run_import(input: &Path, output_dir: &Path, config: &ImportConfig) -> Result<ImportReport> {
    let start = Instant::now();
    config.validate()?;

    let hint = config.format_hint()?;
    let mut source = CsvSource::open(input, config, SAMPLE_PREFIX)?;
    let columns = resolve_columns(&source, config, hint)?;

    let layer = layer_name(input, config);
    let mut report = ImportReport::new(input, &layer);
    report.geometry_columns = columns.describe(&source.headers);

    info!(
        "Import: input={}, layer={}, geometry={}, batch_size={}",
        input.display(),
        layer,
        report.geometry_columns,
        config.batch_size
    );

    let hint = effective_hint(&columns, hint, &mut report);

    std::fs::create_dir_all(output_dir).context(format!(
        "Failed to create output directory: {}",
        output_dir.display()
    ))?;

    let main_path = layer_path(output_dir, &layer);
    let mut writer = LayerWriter::create(&main_path, config.default_srid)?;
    let mut report_layers = config
        .detailed_report
        .then(|| ReportLayers::new(output_dir, &layer, &source.headers));

    let property_columns: Vec<usize> = (0..source.headers.len())
        .filter(|i| !columns.contains(*i))
        .collect();

    let mut classifier = RowClassifier::new(ClassifyOptions {
        hint,
        skip_invalid: config.skip_invalid,
    });

    let mut first_row = 1;
    let mut batch_index = 0;
    loop {
        let batch = source.next_batch(config.batch_size)?;
        if batch.is_empty() {
            break;
        }
        batch_index += 1;

        let inputs: Vec<RowInput<'_>> = batch.iter().map(|r| columns.row_input(r)).collect();
        let outcomes = classifier.classify_batch(&inputs);

        for (offset, ((record, input), outcome)) in
            batch.iter().zip(&inputs).zip(&outcomes).enumerate()
        {
            let row_number = first_row + offset;
            let properties: Vec<(&str, &str)> = property_columns
                .iter()
                .map(|&i| (source.headers[i].as_str(), record.get(i).unwrap_or_default()))
                .collect();

            match outcome {
                RowOutcome::Valid { geometry, srid } => {
                    let format = row_format(input, hint);
                    report.record_valid(format, geometry.geometry_type());
                    writer.write_feature(
                        row_number,
                        Some(&geometry.to_geo()),
                        *srid,
                        &properties,
                    )?;
                }
                RowOutcome::Null => {
                    writer.write_feature(row_number, None, None, &properties)?;
                    if let Some(layers) = report_layers.as_mut() {
                        layers.write_null(row_number, record)?;
                    }
                }
                RowOutcome::Invalid { raw_value } => {
                    if classifier.should_emit(outcome) {
                        writer.write_feature(row_number, None, None, &properties)?;
                    } else {
                        report.skipped += 1;
                    }
                    if let Some(layers) = report_layers.as_mut() {
                        layers.write_invalid(row_number, record, raw_value)?;
                    }
                }
            }
        }

        debug!(
            "Batch {}: rows {}..{}, {}",
            batch_index,
            first_row,
            first_row + batch.len() - 1,
            classifier.stats().summary()
        );
        first_row += batch.len();
    }

    report.emitted = writer.count();
    writer.finish()?;
    report.outputs.push(main_path);
    if let Some(layers) = report_layers {
        report.outputs.extend(layers.finish()?);
    }

    if source.lossy_records() > 0 {
        report.record_warning(format!(
            "{} rows contained invalid UTF-8, replaced",
            source.lossy_records()
        ));
    }

    let stats = classifier.stats();
    report.record_stats(&stats);
    if stats.total() > 0 && stats.valid == 0 {
        warn!("No valid geometry in {}", input.display());
        report.record_warning(format!(
            "No valid geometry found in column {}",
            report.geometry_columns
        ));
    }
    report.set_duration(start.elapsed());
    report.finalize();

    info!("{} in {:.2}s", report.summary(), report.duration_secs);

    Ok(report)
}

/// Nom de la couche: configuré, sinon nom du fichier sans extension
fn layer_name(input: &Path, config: &ImportConfig) -> String {
    config
        .layer_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "layer".to_string())
}

/// Deux colonnes numériques imposent le format X-Y
fn effective_hint(
    columns: &GeometryColumns,
    hint: Option<FormatTag>,
    report: &mut ImportReport,
) -> Option<FormatTag> {
    match columns {
        GeometryColumns::Pair { .. } => {
            if let Some(format) = hint.filter(|h| *h != FormatTag::Xy) {
                warn!("Format {} ignored for coordinate columns", format);
                report.record_warning(format!("Format {} ignored for coordinate columns", format));
            }
            Some(FormatTag::Xy)
        }
        GeometryColumns::Single(_) => hint,
    }
}

/// Format d'une ligne valide
fn row_format(input: &RowInput<'_>, hint: Option<FormatTag>) -> FormatTag {
    if input.raw.is_none() {
        return FormatTag::Xy;
    }
    detect(input.raw, None, None, hint)
}

/// Résultat de détection pour une colonne
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetection {
    pub name: String,
    /// Format du premier échantillon non vide
    pub format: FormatTag,
    /// Premier échantillon non vide
    pub sample: Option<String>,
    /// Formats rencontrés sur les échantillons
    pub counts: BTreeMap<FormatTag, usize>,
}

impl ColumnDetection {
    /// Vrai si au moins un échantillon est une géométrie reconnue
    pub fn is_geometry(&self) -> bool {
        self.counts.keys().any(|f| *f != FormatTag::Unknown)
    }
}

/// Détecte le format des colonnes sur les `rows` premières valeurs non vides
///
/// Seul l'échantillon de tête est lu (au moins `SAMPLE_PREFIX` enregistrements).
pub fn detect_columns(
    input: &Path,
    config: &ImportConfig,
    rows: usize,
    column: Option<&str>,
) -> Result<Vec<ColumnDetection>> {
    let table = CsvSource::open(input, config, SAMPLE_PREFIX.max(rows))?;

    let selected: Vec<usize> = match column {
        Some(name) => vec![table.column_index(name)?],
        None => (0..table.headers.len()).collect(),
    };

    let detections = selected
        .into_iter()
        .map(|i| {
            let mut counts = BTreeMap::new();
            let mut sample = None;
            for value in table.samples(i, rows) {
                let format = detect_text(value);
                debug!("{}: {} -> {}", table.headers[i], value, format);
                *counts.entry(format).or_insert(0) += 1;
                sample.get_or_insert_with(|| value.to_string());
            }
            ColumnDetection {
                name: table.headers[i].clone(),
                format: sample.as_deref().map_or(FormatTag::Unknown, detect_text),
                sample,
                counts,
            }
        })
        .collect();

    Ok(detections)
}
