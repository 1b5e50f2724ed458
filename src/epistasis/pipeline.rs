// ==============================================================================
// pipeline.rs - Epistasis Model Pipeline
// ==============================================================================
// Description: Ordered chain of classifier, nonlinear and linear epistasis models
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Fit (stages in order):
//   classifier -> downstream stages see only genotypes above the threshold
//   spline     -> downstream stages see linearized phenotypes x + (y - f(x))
//   linear     -> always last
// Predict (stages in reverse):
//   linear     -> linear-scale phenotype
//   spline     -> f(phenotype)
//   classifier -> genotypes classified below threshold are set to the threshold
// ==============================================================================

use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

use super::linalg::r_squared;
use super::linear::{EpistasisLinearRegression, ModelType};
use super::logistic::EpistasisLogisticRegression;
use super::spline::EpistasisSpline;
use super::EpistasisError;
use crate::gpmap::{GenotypePhenotypeMap, MutationEncoding};

/// Genotypes encoded per batch during prediction
pub const PREDICT_CHUNK_SIZE: usize = 8192;

/// One model in an epistasis pipeline
#[derive(Debug, Clone)]
pub enum ModelStage {
    Logistic(EpistasisLogisticRegression),
    Spline(EpistasisSpline),
    Linear(EpistasisLinearRegression),
}

impl ModelStage {
    pub fn name(&self) -> &'static str {
        match self {
            ModelStage::Logistic(_) => "EpistasisLogisticRegression",
            ModelStage::Spline(_) => "EpistasisSpline",
            ModelStage::Linear(_) => "EpistasisLinearRegression",
        }
    }
}

impl From<EpistasisLogisticRegression> for ModelStage {
    fn from(model: EpistasisLogisticRegression) -> Self {
        ModelStage::Logistic(model)
    }
}

impl From<EpistasisSpline> for ModelStage {
    fn from(model: EpistasisSpline) -> Self {
        ModelStage::Spline(model)
    }
}

impl From<EpistasisLinearRegression> for ModelStage {
    fn from(model: EpistasisLinearRegression) -> Self {
        ModelStage::Linear(model)
    }
}

/// Ordered list of epistasis models fit and applied as one
#[derive(Debug, Clone, Default)]
pub struct EpistasisPipeline {
    stages: Vec<ModelStage>,
    encoding: Option<MutationEncoding>,
}

impl EpistasisPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the end; the pipeline must be fit again afterwards.
    pub fn append(&mut self, stage: impl Into<ModelStage>) {
        self.stages.push(stage.into());
        self.encoding = None;
    }

    pub fn stages(&self) -> &[ModelStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.encoding.is_some()
    }

    /// Switch every linear stage to the given mutation encoding
    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        for stage in &mut self.stages {
            if let ModelStage::Linear(model) = stage {
                model.model_type = model_type;
            }
        }
        self
    }

    /// The final linear epistasis model
    pub fn linear_model(&self) -> Option<&EpistasisLinearRegression> {
        match self.stages.last() {
            Some(ModelStage::Linear(model)) => Some(model),
            _ => None,
        }
    }

    /// The threshold classifier, if the pipeline has one
    pub fn classifier(&self) -> Option<&EpistasisLogisticRegression> {
        self.stages.iter().find_map(|stage| match stage {
            ModelStage::Logistic(model) => Some(model),
            _ => None,
        })
    }

    fn check_layout(&self) -> Result<(), EpistasisError> {
        let last = self.stages.len().checked_sub(1).ok_or_else(|| {
            EpistasisError::InvalidParameter("pipeline has no models".to_string())
        })?;

        for (idx, stage) in self.stages.iter().enumerate() {
            let is_linear = matches!(stage, ModelStage::Linear(_));
            if is_linear != (idx == last) {
                return Err(EpistasisError::InvalidParameter(format!(
                    "pipeline must end with exactly one linear model, found {} at position {}",
                    stage.name(),
                    idx
                )));
            }
        }

        Ok(())
    }

    /// Fit every stage to the map's genotypes and phenotypes
    pub fn fit(&mut self, gpm: &GenotypePhenotypeMap) -> Result<&mut Self, EpistasisError> {
        self.check_layout()?;

        let encoding = gpm.encoding();
        let sites = encoding.sites();
        let mut binary = encoding.encode_all(gpm.genotypes())?;
        let mut y = Array1::from(gpm.phenotypes().to_vec());

        info!(
            "Fitting pipeline [{}] to {} genotypes ({} mutations)",
            self.stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(" -> "),
            gpm.len(),
            encoding.n_features()
        );

        for stage in &mut self.stages {
            match stage {
                ModelStage::Logistic(model) => {
                    model.fit(&binary, &y)?;
                    let keep: Vec<usize> = y
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v > model.threshold)
                        .map(|(i, _)| i)
                        .collect();
                    if keep.is_empty() {
                        return Err(EpistasisError::NotEnoughData(format!(
                            "no genotypes above threshold {}",
                            model.threshold
                        )));
                    }
                    debug!("{} of {} genotypes above threshold", keep.len(), y.len());
                    binary = binary.select(Axis(0), &keep);
                    y = y.select(Axis(0), &keep);
                }
                ModelStage::Spline(model) => {
                    model.fit(&binary, &sites, &y)?;
                    y = model.linearize(&binary, &y)?;
                }
                ModelStage::Linear(model) => {
                    model.fit(&binary, &sites, &y)?;
                }
            }
        }

        self.encoding = Some(encoding);
        Ok(self)
    }

    fn encode(&self, genotypes: &[String]) -> Result<Array2<f64>, EpistasisError> {
        let encoding = self.encoding.as_ref().ok_or(EpistasisError::NotFitted)?;
        Ok(encoding.encode_all(genotypes)?)
    }

    /// Predict phenotypes of arbitrary genotypes from the fitted mutations
    ///
    /// Genotypes are encoded `PREDICT_CHUNK_SIZE` at a time, so memory stays
    /// bounded by the chunk rather than the full genotype list.
    pub fn predict(&self, genotypes: &[String]) -> Result<Vec<f64>, EpistasisError> {
        self.predict_chunked(genotypes, PREDICT_CHUNK_SIZE)
    }

    fn predict_chunked(
        &self,
        genotypes: &[String],
        chunk_size: usize,
    ) -> Result<Vec<f64>, EpistasisError> {
        if self.encoding.is_none() {
            return Err(EpistasisError::NotFitted);
        }
        let mut predictions = Vec::with_capacity(genotypes.len());
        for chunk in genotypes.chunks(chunk_size.max(1)) {
            predictions.extend(self.predict_chunk(chunk)?);
        }
        Ok(predictions)
    }

    fn predict_chunk(&self, genotypes: &[String]) -> Result<Vec<f64>, EpistasisError> {
        let binary = self.encode(genotypes)?;
        let linear = self.linear_model().ok_or(EpistasisError::NotFitted)?;
        let mut y = linear.predict(&binary)?;

        for stage in self.stages.iter().rev().skip(1) {
            match stage {
                ModelStage::Spline(model) => {
                    y = model.transform(&y)?;
                }
                ModelStage::Logistic(model) => {
                    let classes = model.predict(&binary)?;
                    y.zip_mut_with(&classes, |v, &c| {
                        if c == 0.0 {
                            *v = model.threshold;
                        }
                    });
                }
                ModelStage::Linear(_) => {
                    return Err(EpistasisError::InvalidParameter(
                        "linear model must be the last stage".to_string(),
                    ));
                }
            }
        }

        Ok(y.to_vec())
    }

    /// Probability of being above the classifier threshold, if there is one
    pub fn predict_proba(&self, genotypes: &[String]) -> Result<Option<Vec<f64>>, EpistasisError> {
        let model = match self.classifier() {
            Some(model) => model,
            None => return Ok(None),
        };
        let mut probabilities = Vec::with_capacity(genotypes.len());
        for chunk in genotypes.chunks(PREDICT_CHUNK_SIZE) {
            let binary = self.encode(chunk)?;
            probabilities.extend(model.predict_proba(&binary)?.iter().copied());
        }
        Ok(Some(probabilities))
    }

    /// Get R² score against a map's measured phenotypes
    pub fn score(&self, gpm: &GenotypePhenotypeMap) -> Result<f64, EpistasisError> {
        let predicted = Array1::from(self.predict(gpm.genotypes())?);
        let observed = Array1::from(gpm.phenotypes().to_vec());
        Ok(r_squared(&observed, &predicted))
    }

    /// Linear-model coefficients keyed by term label
    pub fn coefficients(&self) -> Vec<(String, f64)> {
        let (encoding, linear) = match (&self.encoding, self.linear_model()) {
            (Some(e), Some(l)) => (e, l),
            _ => return Vec::new(),
        };
        let coefficients = match linear.coefficients() {
            Some(c) => c,
            None => return Vec::new(),
        };

        linear
            .term_labels(&encoding.labels())
            .into_iter()
            .zip(coefficients.iter().copied())
            .collect()
    }
}
