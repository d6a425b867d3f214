//! Définition et implémentation des commandes CLI
//!
//! - `import`: CSV → couche GeoJSON (+ couches de rapport)
//! - `detect`: formats de géométrie détectés par colonne

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use csv_geom_import::{detect_columns, run_import, ImportConfig, ImportStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Import a CSV file with a geometry column into a GeoJSON layer
    Import(ImportArgs),

    /// Print the geometry format detected in each column
    Detect {
        /// Path to the CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Only inspect this column
        #[arg(long)]
        column: Option<String>,

        /// Number of non-empty values sampled per column
        #[arg(long, default_value_t = 20)]
        rows: usize,

        #[command(flatten)]
        csv: CsvArgs,
    },
}

/// Options de lecture du CSV, communes aux deux commandes
#[derive(Args, Debug, Default)]
pub struct CsvArgs {
    /// Field delimiter (default: ,)
    #[arg(long)]
    delimiter: Option<char>,

    /// Text encoding label, e.g. utf-8, windows-1252, latin1 (default: utf-8)
    #[arg(long)]
    encoding: Option<String>,

    /// The first line is data, not column names
    #[arg(long)]
    no_header: bool,
}

impl CsvArgs {
    fn apply(&self, config: &mut ImportConfig) {
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }
        if self.no_header {
            config.has_header = false;
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the CSV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Path to a JSON config file (flags override its values)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Column holding the geometry (detected when omitted)
    #[arg(long, conflicts_with_all = ["x_column", "y_column"])]
    pub geometry_column: Option<String>,

    /// Column holding X / longitude
    #[arg(long, requires = "y_column")]
    pub x_column: Option<String>,

    /// Column holding Y / latitude
    #[arg(long, requires = "x_column")]
    pub y_column: Option<String>,

    /// Geometry format: wkt, wkb, ewkt, ewkb, geojson, kml, ee, topojson, xy or auto
    #[arg(long)]
    pub format: Option<String>,

    /// SRID applied to geometries without one (default: env CSVGEOM_DEFAULT_SRID / 4326)
    #[arg(long)]
    pub srid: Option<u32>,

    #[command(flatten)]
    pub csv: CsvArgs,

    /// Keep invalid rows in the main layer with a null geometry
    #[arg(long)]
    pub keep_invalid: bool,

    /// Write <layer>_Null_Geom.csv and <layer>_Invalid_Geom.csv
    #[arg(long)]
    pub detailed_report: bool,

    /// Layer name (default: input file name)
    #[arg(long)]
    pub layer_name: Option<String>,

    /// Save the import report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Rows classified per batch (default: env CSVGEOM_BATCH_SIZE / 10000)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl ImportArgs {
    /// Configuration finale: fichier (ou défauts), puis options de la ligne de commande
    pub fn to_config(&self) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => ImportConfig::load(path)?,
            None => ImportConfig::default(),
        };

        self.csv.apply(&mut config);

        if let Some(column) = &self.geometry_column {
            config.geometry_column = Some(column.clone());
            config.x_column = None;
            config.y_column = None;
        }
        if self.x_column.is_some() {
            config.x_column = self.x_column.clone();
            config.y_column = self.y_column.clone();
            config.geometry_column = None;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if let Some(srid) = self.srid {
            config.default_srid = srid;
        }
        if self.keep_invalid {
            config.skip_invalid = false;
        }
        if self.detailed_report {
            config.detailed_report = true;
        }
        if let Some(name) = &self.layer_name {
            config.layer_name = Some(name.clone());
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Exécute la commande import
pub fn cmd_import(args: &ImportArgs) -> Result<()> {
    let config = args.to_config()?;
    info!(
        "Config: format={}, srid={}, skip_invalid={}, detailed_report={}",
        config.format, config.default_srid, config.skip_invalid, config.detailed_report
    );

    let report = run_import(&args.input, &args.output, &config)?;
    report.display();

    if let Some(path) = &args.report_json {
        report.save_to_file(path)?;
        info!("Report saved to {}", path.display());
    }

    if report.status == ImportStatus::Failed {
        anyhow::bail!(
            "Import failed: {} invalid rows and no valid geometry",
            report.invalid
        );
    }

    Ok(())
}

/// Exécute la commande detect
pub fn cmd_detect(input: &Path, column: Option<&str>, rows: usize, csv: &CsvArgs) -> Result<()> {
    let mut config = ImportConfig::default();
    csv.apply(&mut config);
    config.validate()?;

    let detections = detect_columns(input, &config, rows, column)?;

    println!("{:<24} {:<16} SAMPLE", "COLUMN", "FORMAT");
    for detection in &detections {
        let sample = detection.sample.as_deref().unwrap_or("");
        println!(
            "{:<24} {:<16} {}",
            detection.name,
            detection.format.name(),
            shorten(sample, 60)
        );
        if detection.counts.len() > 1 {
            let counts: Vec<String> = detection
                .counts
                .iter()
                .map(|(format, count)| format!("{}={}", format, count))
                .collect();
            println!("{:<24} {}", "", counts.join(", "));
        }
    }

    let found = detections.iter().filter(|d| d.is_geometry()).count();
    info!("{} of {} columns hold geometries", found, detections.len());

    Ok(())
}

/// Coupe une valeur trop longue pour l'affichage
fn shorten(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &value[..end]),
        None => value.to_string(),
    }
}
