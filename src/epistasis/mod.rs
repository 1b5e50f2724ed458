// ==============================================================================
// epistasis/mod.rs - Epistasis Models
// ==============================================================================
// Description: Linear, nonlinear and classifier models for genotype-phenotype maps
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod linalg;
pub mod linear;
pub mod logistic;
pub mod spline;
pub mod pipeline;

pub use linear::{EpistasisLinearRegression, ModelType};
pub use logistic::EpistasisLogisticRegression;
pub use spline::{EpistasisSpline, SmoothingSpline};
pub use pipeline::{EpistasisPipeline, ModelStage};

use thiserror::Error;
use tracing::debug;

use crate::gpmap::GpmapError;

/// Errors raised while fitting or applying epistasis models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpistasisError {
    #[error("Model is not fitted")]
    NotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Not enough data: {0}")]
    NotEnoughData(String),

    #[error("Invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Genotype encoding error: {0}")]
    Encoding(#[from] GpmapError),
}

/// Build an epistasis pipeline from model parameters
///
/// # Arguments
/// * `threshold` - When given, a logistic classifier is added first
/// * `spline_order` - Together with a non-zero `spline_smoothness`, adds a
///   nonlinear spline of that order
/// * `spline_smoothness` - Spline smoothing factor (10 in the command line defaults)
/// * `epistasis_order` - Order of the linear epistasis model, always added last
///
/// # Example
/// ```
/// use gpseer::epistasis::construct_model;
///
/// let model = construct_model(Some(0.2), Some(2), 10.0, 1);
/// assert_eq!(model.len(), 3);
///
/// let linear_only = construct_model(None, None, 10.0, 2);
/// assert_eq!(linear_only.len(), 1);
/// ```
pub fn construct_model(
    threshold: Option<f64>,
    spline_order: Option<usize>,
    spline_smoothness: f64,
    epistasis_order: usize,
) -> EpistasisPipeline {
    let mut model = EpistasisPipeline::new();

    if let Some(threshold) = threshold {
        model.append(EpistasisLogisticRegression::new(threshold));
    }

    if let Some(k) = spline_order.filter(|&k| k != 0) {
        if spline_smoothness != 0.0 {
            model.append(EpistasisSpline::new(k, spline_smoothness));
        }
    }

    model.append(EpistasisLinearRegression::new(epistasis_order));

    debug!(
        "Constructed pipeline: {}",
        model.stages().iter().map(|s| s.name()).collect::<Vec<_>>().join(" -> ")
    );
    model
}
