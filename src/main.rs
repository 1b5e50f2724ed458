// ==============================================================================
// main.rs - GPSeer Entry Point
// ==============================================================================
// Description: Command line interface for genotype-phenotype map modeling
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 0.1.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

use gpseer::epistasis::ModelType;
use gpseer::models::{GoodnessOfFitParams, ModelParams, DEFAULT_EPISTASIS_ORDER};
use gpseer::processor::{GpseerProcessor, DEFAULT_MAX_GENOTYPES};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the model and predict unmeasured genotypes
    EstimateMl {
        #[command(flatten)]
        common: CommonArgs,

        /// File with one genotype per line to predict (default: every possible genotype)
        #[arg(long, env = "GPSEER_GENOTYPE_FILE")]
        genotype_file: Option<PathBuf>,

        /// Refuse to enumerate a genotype space larger than this
        #[arg(long, env = "GPSEER_MAX_GENOTYPES", default_value_t = DEFAULT_MAX_GENOTYPES)]
        max_genotypes: usize,
    },

    /// Score the model on repeated random train/test splits
    GoodnessOfFit {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of train/test splits
        #[arg(long, env = "GPSEER_N_SAMPLES", default_value_t = 10)]
        n_samples: usize,

        /// Fraction of genotypes used for training
        #[arg(long, env = "GPSEER_TRAIN_FRACTION", default_value_t = 0.8)]
        train_fraction: f64,

        /// Seed for the split generator
        #[arg(long, env = "GPSEER_SEED", default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Input CSV (optionally gzipped) with genotypes and phenotypes columns
    input_file: PathBuf,

    /// Wildtype sequence (default: first genotype in the file)
    #[arg(long, env = "GPSEER_WILDTYPE")]
    wildtype: Option<String>,

    /// Output directory
    #[arg(short, long, env = "GPSEER_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Phenotype detection threshold; adds a logistic classifier
    #[arg(long, env = "GPSEER_THRESHOLD")]
    threshold: Option<f64>,

    /// Spline order; adds a nonlinear spline
    #[arg(long, env = "GPSEER_SPLINE_ORDER")]
    spline_order: Option<usize>,

    /// Spline smoothing factor
    #[arg(long, env = "GPSEER_SPLINE_SMOOTHNESS", default_value_t = 10.0)]
    spline_smoothness: f64,

    /// Order of epistatic interactions in the linear model
    #[arg(long, env = "GPSEER_EPISTASIS_ORDER", default_value_t = DEFAULT_EPISTASIS_ORDER)]
    epistasis_order: usize,

    /// Mutation encoding of the linear model
    #[arg(long, env = "GPSEER_MODEL_TYPE", value_enum, default_value_t = ModelType::Global)]
    model_type: ModelType,
}

impl CommonArgs {
    fn model_params(&self) -> Result<ModelParams> {
        let params = ModelParams {
            threshold: self.threshold,
            spline_order: self.spline_order,
            spline_smoothness: self.spline_smoothness,
            epistasis_order: self.epistasis_order,
            model_type: self.model_type,
        };
        params.validate().context("Invalid model parameters")?;
        Ok(params)
    }

    fn processor(&self) -> Result<GpseerProcessor> {
        Ok(GpseerProcessor::new(
            self.input_file.clone(),
            self.wildtype.clone(),
            self.output_dir.clone(),
            self.model_params()?,
        ))
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpseer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("GPSeer {} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::EstimateMl {
            common,
            genotype_file,
            max_genotypes,
        } => {
            let processor = common.processor()?;
            processor.estimate_ml(genotype_file.as_deref(), max_genotypes)
        }
        Command::GoodnessOfFit {
            common,
            n_samples,
            train_fraction,
            seed,
        } => {
            let params = GoodnessOfFitParams {
                n_samples,
                train_fraction,
                seed,
            };
            params
                .validate()
                .context("Invalid goodness-of-fit parameters")?;
            let processor = common.processor()?;
            processor.goodness_of_fit(&params)
        }
    };

    match result {
        Ok(outputs) => {
            info!("Results written to {:?} and {:?}", outputs.table, outputs.summary);
            Ok(())
        }
        Err(e) => {
            warn!("Run failed: {:#}", e);
            Err(e)
        }
    }
}
