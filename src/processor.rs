// ==============================================================================
// processor.rs - Workflow Orchestration
// ==============================================================================
// Description: Maximum-likelihood estimation and goodness-of-fit workflows
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::epistasis::EpistasisPipeline;
use crate::gpmap::{gpmap_from_gpmap, GenotypePhenotypeMap};
use crate::models::{GoodnessOfFitParams, ModelParams};
use crate::output::{
    self, CoefficientOutput, FitSampleRow, GoodnessOfFitSummary, OutputMetadata, RunSummary,
};
use crate::parsers::{read_file_to_gpmap, read_genotype_file};
use crate::validator::{InputValidator, ValidatedFile};

/// Upper bound on the genotype space predicted when no genotype file is given
pub const DEFAULT_MAX_GENOTYPES: usize = 1_000_000;

/// Files written by a workflow run
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub table: PathBuf,
    pub summary: PathBuf,
}

pub struct GpseerProcessor {
    run_id: Uuid,
    input_path: PathBuf,
    wildtype: Option<String>,
    output_dir: PathBuf,
    model: ModelParams,
    validator: InputValidator,
}

impl GpseerProcessor {
    pub fn new(
        input_path: PathBuf,
        wildtype: Option<String>,
        output_dir: PathBuf,
        model: ModelParams,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input_path,
            wildtype,
            output_dir,
            model,
            validator: InputValidator::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Validate and parse the input table
    pub fn load(&self) -> Result<(ValidatedFile, GenotypePhenotypeMap)> {
        let validated = self
            .validator
            .validate(&self.input_path)
            .context("Input file validation failed")?;
        debug!(
            "Validated {} ({} bytes, .{})",
            validated.file_name, validated.size, validated.extension
        );

        let gpm = read_file_to_gpmap(&self.input_path, self.wildtype.as_deref())
            .with_context(|| format!("Failed to read {:?}", self.input_path))?;

        info!(
            "Loaded {} genotypes (wildtype {}, {} sites)",
            gpm.len(),
            gpm.wildtype(),
            gpm.length()
        );
        Ok((validated, gpm))
    }

    /// Fit the model to every genotype and predict the requested genotypes
    ///
    /// Genotypes come from `genotype_file` when given, otherwise the whole
    /// genotype space spanned by the observed mutations is predicted
    /// (refused above `max_genotypes`).
    pub fn estimate_ml(
        &self,
        genotype_file: Option<&Path>,
        max_genotypes: usize,
    ) -> Result<RunOutputs> {
        info!("Starting maximum-likelihood estimation (run {})", self.run_id);

        let (validated, gpm) = self.load()?;
        let mut model = self.model.build();
        model.fit(&gpm).context("Failed to fit epistasis model")?;

        let training_r2 = model.score(&gpm).context("Failed to score fitted model")?;
        info!("Training R²: {:.4}", training_r2);

        let genotypes = match genotype_file {
            Some(path) => {
                InputValidator::genotype_list()
                    .validate(path)
                    .context("Genotype file validation failed")?;
                let genotypes = read_genotype_file(gpm.wildtype(), path)
                    .with_context(|| format!("Failed to read genotype file {:?}", path))?;
                info!("Predicting {} genotypes from {:?}", genotypes.len(), path);
                genotypes
            }
            None => {
                let genotypes = gpm
                    .all_possible_genotypes(max_genotypes)
                    .context("Failed to enumerate genotype space")?;
                info!("Predicting all {} possible genotypes", genotypes.len());
                genotypes
            }
        };

        let predictions = model
            .predict(&genotypes)
            .context("Failed to predict phenotypes")?;
        let probabilities = model
            .predict_proba(&genotypes)
            .context("Failed to predict classifier probabilities")?;

        let rows = output::prediction_rows(&gpm, &genotypes, &predictions, probabilities.as_deref());

        self.ensure_output_dir()?;
        let outputs = RunOutputs {
            table: self.output_path("predictions.csv"),
            summary: self.output_path("summary.json"),
        };
        output::write_predictions(&outputs.table, &rows)?;

        let summary = RunSummary {
            metadata: self.metadata("estimate-ml", &validated, &gpm),
            model: self.model.clone(),
            stages: stage_names(&model),
            training_r2: Some(training_r2),
            n_predicted: Some(rows.len()),
            coefficients: coefficient_outputs(&model),
            goodness_of_fit: None,
        };
        output::write_summary(&outputs.summary, &summary)?;

        info!("Estimation complete: {:?}", outputs.table);
        Ok(outputs)
    }

    /// Score the model on repeated random train/test splits
    pub fn goodness_of_fit(&self, params: &GoodnessOfFitParams) -> Result<RunOutputs> {
        info!(
            "Starting goodness-of-fit with {} samples (train fraction {}, run {})",
            params.n_samples, params.train_fraction, self.run_id
        );

        let (validated, gpm) = self.load()?;
        let n = gpm.len();
        if n < 2 {
            anyhow::bail!("Goodness-of-fit needs at least 2 genotypes, found {}", n);
        }
        let n_train = ((n as f64 * params.train_fraction).round() as usize).clamp(1, n - 1);
        debug!("Splitting {} genotypes into {} train / {} test", n, n_train, n - n_train);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rows = Vec::with_capacity(params.n_samples);

        for sample in 0..params.n_samples {
            indices.shuffle(&mut rng);
            let train = split_map(&gpm, &indices[..n_train])?;
            let test = split_map(&gpm, &indices[n_train..])?;

            let mut model = self.model.build();
            model
                .fit(&train)
                .with_context(|| format!("Failed to fit model on sample {}", sample))?;
            let r2 = model
                .score(&test)
                .with_context(|| format!("Failed to score model on sample {}", sample))?;
            debug!("Sample {}: held-out R² {:.4}", sample, r2);

            rows.push(FitSampleRow {
                sample,
                n_train,
                n_test: n - n_train,
                r2,
            });
        }

        let scores: Vec<f64> = rows.iter().map(|r| r.r2).collect();
        let (r2_mean, r2_std) = output::mean_std(&scores);
        info!("Held-out R²: {:.4} ± {:.4}", r2_mean, r2_std);

        self.ensure_output_dir()?;
        let outputs = RunOutputs {
            table: self.output_path("goodness_of_fit.csv"),
            summary: self.output_path("goodness_of_fit.json"),
        };
        output::write_goodness_of_fit(&outputs.table, &rows)?;

        let summary = RunSummary {
            metadata: self.metadata("goodness-of-fit", &validated, &gpm),
            model: self.model.clone(),
            stages: stage_names(&self.model.build()),
            training_r2: None,
            n_predicted: None,
            coefficients: Vec::new(),
            goodness_of_fit: Some(GoodnessOfFitSummary {
                params: params.clone(),
                r2_mean,
                r2_std,
            }),
        };
        output::write_summary(&outputs.summary, &summary)?;

        Ok(outputs)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))
    }

    /// `<output_dir>/<input stem>_<suffix>`
    fn output_path(&self, suffix: &str) -> PathBuf {
        let file_name = self
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "gpseer".to_string());
        let stem = file_name
            .strip_suffix(".gz")
            .unwrap_or(&file_name)
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file_name.clone());
        self.output_dir.join(format!("{}_{}", stem, suffix))
    }

    fn metadata(
        &self,
        command: &str,
        validated: &ValidatedFile,
        gpm: &GenotypePhenotypeMap,
    ) -> OutputMetadata {
        OutputMetadata {
            run_id: self.run_id.to_string(),
            command: command.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: validated.file_name.clone(),
            input_sha256: validated.hash_sha256.clone(),
            wildtype: gpm.wildtype().to_string(),
            n_genotypes: gpm.len(),
        }
    }
}

/// Rows at `indices` as a map on the same wildtype and mutations
fn split_map(gpm: &GenotypePhenotypeMap, indices: &[usize]) -> Result<GenotypePhenotypeMap> {
    let genotypes = indices.iter().map(|&i| gpm.genotypes()[i].clone()).collect();
    let phenotypes = indices.iter().map(|&i| gpm.phenotypes()[i]).collect();
    gpmap_from_gpmap(gpm, genotypes, phenotypes, 1, None)
        .context("Failed to build train/test split")
}

fn stage_names(model: &EpistasisPipeline) -> Vec<String> {
    model.stages().iter().map(|s| s.name().to_string()).collect()
}

fn coefficient_outputs(model: &EpistasisPipeline) -> Vec<CoefficientOutput> {
    model
        .coefficients()
        .into_iter()
        .map(|(term, value)| CoefficientOutput { term, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_strips_extensions() {
        let dir = TempDir::new().unwrap();
        let processor = GpseerProcessor::new(
            PathBuf::from("/data/library.csv.gz"),
            None,
            dir.path().to_path_buf(),
            ModelParams::default(),
        );
        assert_eq!(
            processor.output_path("predictions.csv"),
            dir.path().join("library_predictions.csv")
        );

        let processor = GpseerProcessor::new(
            PathBuf::from("phenotypes.csv"),
            None,
            dir.path().to_path_buf(),
            ModelParams::default(),
        );
        assert_eq!(
            processor.output_path("summary.json"),
            dir.path().join("phenotypes_summary.json")
        );
    }

    #[test]
    fn test_split_map_keeps_mutations() {
        let records = ["AA", "TA", "AG", "TG"]
            .iter()
            .enumerate()
            .map(|(i, g)| crate::gpmap::GenotypeRecord {
                genotype: g.to_string(),
                phenotype: i as f64,
                stdeviation: None,
                n_replicates: Some(4),
            })
            .collect();
        let gpm = GenotypePhenotypeMap::from_records(records, "AA").unwrap();

        let split = split_map(&gpm, &[3, 1]).unwrap();
        assert_eq!(split.genotypes(), &["TG".to_string(), "TA".to_string()][..]);
        assert_eq!(split.phenotypes(), &[3.0, 1.0]);
        assert_eq!(split.mutations(), gpm.mutations());
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        let processor = GpseerProcessor::new(
            dir.path().join("missing.csv"),
            None,
            dir.path().to_path_buf(),
            ModelParams::default(),
        );
        assert!(processor.load().is_err());
    }
}
