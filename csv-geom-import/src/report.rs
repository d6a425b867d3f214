//! Rapport d'import
//!
//! Compteurs valides / nulles / invalides, répartition par format et par
//! type de géométrie, fichiers écrits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use geomsniff::{DetectionStats, FormatTag};
use serde::Serialize;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Aucune ligne invalide
    Success,
    /// Des lignes invalides, au moins une valide
    PartialSuccess,
    /// Que des lignes invalides
    Failed,
}

/// Rapport complet d'un import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Fichier d'entrée
    pub input: String,
    /// Nom de la couche produite
    pub layer: String,
    /// Colonne(s) géométrie utilisée(s)
    pub geometry_columns: String,
    /// Durée de l'import
    pub duration_secs: f64,
    /// Statut global
    pub status: ImportStatus,

    pub rows_total: usize,
    pub valid: usize,
    pub null: usize,
    pub invalid: usize,
    /// Features écrites dans la couche principale
    pub emitted: usize,
    /// Lignes invalides omises de la couche principale
    pub skipped: usize,

    /// Lignes valides par format détecté
    pub by_format: BTreeMap<String, usize>,
    /// Lignes valides par type de géométrie
    pub by_type: BTreeMap<String, usize>,

    pub warnings: Vec<String>,
    /// Fichiers écrits
    pub outputs: Vec<PathBuf>,
}

impl ImportReport {
    pub fn new(input: &Path, layer: &str) -> Self {
        Self {
            input: input.display().to_string(),
            layer: layer.to_string(),
            geometry_columns: String::new(),
            duration_secs: 0.0,
            status: ImportStatus::Success,
            rows_total: 0,
            valid: 0,
            null: 0,
            invalid: 0,
            emitted: 0,
            skipped: 0,
            by_format: BTreeMap::new(),
            by_type: BTreeMap::new(),
            warnings: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Reporte les compteurs du classifieur
    pub fn record_stats(&mut self, stats: &DetectionStats) {
        self.valid = stats.valid;
        self.null = stats.null;
        self.invalid = stats.invalid;
        self.rows_total = stats.total();
    }

    /// Compte une ligne valide
    pub fn record_valid(&mut self, format: FormatTag, geometry_type: &str) {
        *self.by_format.entry(format.name().to_string()).or_default() += 1;
        *self.by_type.entry(geometry_type.to_string()).or_default() += 1;
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.invalid == 0 {
            ImportStatus::Success
        } else if self.valid > 0 {
            ImportStatus::PartialSuccess
        } else {
            ImportStatus::Failed
        };
    }

    /// Statistiques sous forme `DetectionStats`
    pub fn stats(&self) -> DetectionStats {
        DetectionStats {
            valid: self.valid,
            null: self.null,
            invalid: self.invalid,
        }
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - {}", self.layer);
        println!("{}", "=".repeat(60));

        println!("\nInput: {}", self.input);
        println!("Geometry: {}", self.geometry_columns);
        println!("Status: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!("{}", self.stats().summary());
        println!(
            "Features: {} written, {} invalid skipped",
            self.emitted, self.skipped
        );

        if !self.by_format.is_empty() {
            println!("\n--- BY FORMAT ---");
            for (format, count) in &self.by_format {
                println!("  {}: {}", format, count);
            }
        }

        if !self.by_type.is_empty() {
            println!("\n--- BY TYPE ---");
            for (geometry_type, count) in &self.by_type {
                println!("  {}: {}", geometry_type, count);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  {}", w);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.outputs.is_empty() {
            println!("\n--- OUTPUTS ---");
            for path in &self.outputs {
                println!("  {}", path.display());
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .context(format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} valid, {} null, {} invalid, {} features written",
            self.layer, self.valid, self.null, self.invalid, self.emitted
        )
    }
}
