// ==============================================================================
// output.rs - Result Output Generation
// ==============================================================================
// Description: Prediction tables, goodness-of-fit tables and JSON run summaries
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::gpmap::GenotypePhenotypeMap;
use crate::models::{GoodnessOfFitParams, ModelParams};

/// One predicted genotype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub genotypes: String,
    /// Predicted phenotype
    pub phenotypes: f64,
    /// Measured phenotype, if the genotype was in the input
    pub measured: Option<f64>,
    /// Measured standard deviation, if known
    pub measured_err: Option<f64>,
    pub n_replicates: Option<u32>,
    /// Classifier probability of being above the threshold
    pub prob_above_threshold: Option<f64>,
}

/// Held-out score of one train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSampleRow {
    pub sample: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub r2: f64,
}

/// Summary metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub run_id: String,
    pub command: String,
    pub created_at: String,
    pub version: String,
    pub input_file: String,
    pub input_sha256: String,
    pub wildtype: String,
    pub n_genotypes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoefficientOutput {
    pub term: String,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoodnessOfFitSummary {
    pub params: GoodnessOfFitParams,
    pub r2_mean: f64,
    pub r2_std: f64,
}

/// JSON document written next to every result table
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub metadata: OutputMetadata,
    pub model: ModelParams,
    /// Stages in fit order
    pub stages: Vec<String>,
    /// R² of the model on its own training data (all genotypes)
    pub training_r2: Option<f64>,
    pub n_predicted: Option<usize>,
    pub coefficients: Vec<CoefficientOutput>,
    pub goodness_of_fit: Option<GoodnessOfFitSummary>,
}

/// Join predictions with measured data from the input map
pub fn prediction_rows(
    gpm: &GenotypePhenotypeMap,
    genotypes: &[String],
    predictions: &[f64],
    probabilities: Option<&[f64]>,
) -> Vec<PredictionRow> {
    let measured: HashMap<&str, usize> = gpm
        .genotypes()
        .iter()
        .enumerate()
        .map(|(i, g)| (g.as_str(), i))
        .collect();

    genotypes
        .iter()
        .zip(predictions.iter())
        .enumerate()
        .map(|(i, (genotype, &predicted))| {
            let measured_idx = measured.get(genotype.as_str()).copied();
            PredictionRow {
                genotypes: genotype.clone(),
                phenotypes: predicted,
                measured: measured_idx.map(|m| gpm.phenotypes()[m]),
                measured_err: measured_idx.and_then(|m| gpm.stdeviations()[m]),
                n_replicates: measured_idx.map(|m| gpm.n_replicates()[m]),
                prob_above_threshold: probabilities.and_then(|p| p.get(i).copied()),
            }
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_predictions(path: &Path, rows: &[PredictionRow]) -> Result<()> {
    write_csv(path, rows)?;
    info!("Wrote {} predictions to {:?}", rows.len(), path);
    Ok(())
}

pub fn write_goodness_of_fit(path: &Path, rows: &[FitSampleRow]) -> Result<()> {
    write_csv(path, rows)?;
    info!("Wrote {} goodness-of-fit samples to {:?}", rows.len(), path);
    Ok(())
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create summary file {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .context("Failed to serialize run summary")?;
    info!("Wrote run summary to {:?}", path);
    Ok(())
}

/// Mean and sample standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
