// ==============================================================================
// models.rs - Run Configuration Models
// ==============================================================================
// Description: Validated parameters for model construction and goodness-of-fit runs
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::epistasis::{construct_model, EpistasisPipeline, ModelType};

pub const DEFAULT_SPLINE_SMOOTHNESS: f64 = 10.0;
pub const DEFAULT_EPISTASIS_ORDER: usize = 1;

/// Parameters of the epistasis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ModelParams {
    /// Phenotype detection threshold; adds a classifier when set
    pub threshold: Option<f64>,

    /// Spline order (degree); adds a nonlinear spline when set
    #[validate(range(min = 1, max = 5))]
    pub spline_order: Option<usize>,

    /// Spline smoothing factor
    #[validate(range(min = 0.0))]
    pub spline_smoothness: f64,

    /// Highest order of epistatic interactions in the linear model
    #[validate(range(min = 1))]
    pub epistasis_order: usize,

    /// Mutation encoding of the linear model
    pub model_type: ModelType,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            threshold: None,
            spline_order: None,
            spline_smoothness: DEFAULT_SPLINE_SMOOTHNESS,
            epistasis_order: DEFAULT_EPISTASIS_ORDER,
            model_type: ModelType::default(),
        }
    }
}

impl ModelParams {
    /// Build an unfitted pipeline from these parameters
    pub fn build(&self) -> EpistasisPipeline {
        construct_model(
            self.threshold,
            self.spline_order,
            self.spline_smoothness,
            self.epistasis_order,
        )
        .with_model_type(self.model_type)
    }
}

/// Repeated random train/test splits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GoodnessOfFitParams {
    /// Number of train/test splits
    #[validate(range(min = 1))]
    pub n_samples: usize,

    /// Fraction of genotypes used for training in each split
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub train_fraction: f64,

    /// Seed for the split generator
    pub seed: u64,
}

impl Default for GoodnessOfFitParams {
    fn default() -> Self {
        Self {
            n_samples: 10,
            train_fraction: 0.8,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(ModelParams::default().validate().is_ok());
        assert!(GoodnessOfFitParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_model_params() {
        let params = ModelParams {
            epistasis_order: 0,
            ..ModelParams::default()
        };
        assert!(params.validate().is_err());

        let params = ModelParams {
            spline_order: Some(6),
            ..ModelParams::default()
        };
        assert!(params.validate().is_err());

        let params = ModelParams {
            spline_smoothness: -1.0,
            ..ModelParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_invalid_train_fraction() {
        for fraction in [0.0, 1.0, 1.5] {
            let params = GoodnessOfFitParams {
                train_fraction: fraction,
                ..GoodnessOfFitParams::default()
            };
            assert!(params.validate().is_err(), "fraction {} accepted", fraction);
        }
    }

    #[test]
    fn test_build_applies_model_type() {
        let params = ModelParams {
            threshold: Some(0.5),
            spline_order: Some(2),
            epistasis_order: 2,
            model_type: ModelType::Local,
            ..ModelParams::default()
        };
        let pipeline = params.build();
        assert_eq!(pipeline.len(), 3);
        let linear = pipeline.linear_model().unwrap();
        assert_eq!(linear.order, 2);
        assert_eq!(linear.model_type, ModelType::Local);
    }
}
