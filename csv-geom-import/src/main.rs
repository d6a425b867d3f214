//! Point d'entrée CLI pour csv-geom-import

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Charge les variables CSVGEOM_* depuis un fichier .env
///
/// `CSVGEOM_ENV_FILE` désigne un fichier précis. Sinon dotenvy remonte du
/// répertoire courant vers ses ancêtres, puis on essaie à côté du binaire.
/// Les variables déjà définies dans l'environnement ne sont pas écrasées.
fn load_env() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CSVGEOM_ENV_FILE").map(PathBuf::from) {
        return dotenvy::from_path(&path).ok().map(|_| path);
    }
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }
    let dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let path = dir.join(".env");
    dotenvy::from_path(&path).ok().map(|_| path)
}

mod cli;

use cli::Commands;

/// Importer des CSV à colonne géométrie vers GeoJSON
#[derive(Parser)]
#[command(name = "csv-geom-import")]
#[command(author, version)]
#[command(about = "Importer des CSV à colonne géométrie (WKT, WKB, GeoJSON, KML, Earth Engine, TopoJSON, X-Y) vers GeoJSON")]
#[command(long_about = "Détecte le format de géométrie de chaque ligne, écrit une couche GeoJSON et, sur demande, les couches de rapport des lignes nulles et invalides.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // avant clap: les défauts de la config lisent l'environnement
    let env_file = load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    if let Some(path) = env_file {
        debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Import(args) => {
            info!(input = %args.input.display(), output = %args.output.display(), "Import CSV");
            cli::cmd_import(&args)?;
        }
        Commands::Detect {
            input,
            column,
            rows,
            csv,
        } => {
            info!(input = %input.display(), rows, "Détection des formats");
            cli::cmd_detect(&input, column.as_deref(), rows, &csv)?;
        }
    }

    Ok(())
}

/// Logs sur stderr: stdout reste réservé au tableau de `detect`
///
/// `-v` ne concerne que nos deux crates; RUST_LOG prend le pas s'il est défini.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,csv_geom_import={level},geomsniff={level}",
            level = level.to_string().to_ascii_lowercase()
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}
