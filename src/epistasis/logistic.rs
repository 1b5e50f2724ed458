// ==============================================================================
// logistic.rs - Threshold Classifier
// ==============================================================================
// Description: Logistic classifier separating genotypes above a phenotype threshold
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Classes:
//   1 - phenotype above threshold (measurable)
//   0 - phenotype at or below threshold
// Features are the additive 0/1 mutation features with a fitted intercept.
// ==============================================================================

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EpistasisError;

/// Logistic regression on additive mutation features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpistasisLogisticRegression {
    /// Phenotypes strictly above this value are class 1
    pub threshold: f64,
    /// Regularization strength (L2)
    pub alpha: f64,
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
}

impl EpistasisLogisticRegression {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            alpha: 1e-3,
            max_iter: 5000,
            tol: 1e-6,
            learning_rate: 0.5,
            coefficients: None,
            intercept: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Observed class of each phenotype
    pub fn classes(&self, y: &Array1<f64>) -> Array1<f64> {
        y.mapv(|v| if v > self.threshold { 1.0 } else { 0.0 })
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit the classifier using gradient descent
    pub fn fit(&mut self, binary: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self, EpistasisError> {
        let n_samples = binary.nrows();
        let n_features = binary.ncols();

        if n_samples != y.len() {
            return Err(EpistasisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(EpistasisError::NotEnoughData(
                "cannot fit a classifier to zero genotypes".to_string(),
            ));
        }

        let target = self.classes(y);
        let n_above = target.sum() as usize;
        debug!(
            "Fitting threshold classifier at {}: {} of {} genotypes above",
            self.threshold, n_above, n_samples
        );
        if n_above == 0 || n_above == n_samples {
            warn!(
                "All genotypes fall on one side of threshold {}, classifier is constant",
                self.threshold
            );
        }

        let mut weights = Array1::zeros(n_features);
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let linear = binary.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - &target;
            let dw = (binary.t().dot(&errors) / n_samples as f64) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(self)
    }

    /// Probability that each genotype is above the threshold
    pub fn predict_proba(&self, binary: &Array2<f64>) -> Result<Array1<f64>, EpistasisError> {
        let (coefficients, intercept) = match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(EpistasisError::NotFitted),
        };
        if binary.ncols() != coefficients.len() {
            return Err(EpistasisError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", binary.ncols()),
            });
        }

        Ok(Self::sigmoid(&(binary.dot(coefficients) + intercept)))
    }

    /// Predicted class (0 or 1) of each genotype
    pub fn predict(&self, binary: &Array2<f64>) -> Result<Array1<f64>, EpistasisError> {
        let proba = self.predict_proba(binary)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Classification accuracy against observed phenotypes
    pub fn score(&self, binary: &Array2<f64>, y: &Array1<f64>) -> Result<f64, EpistasisError> {
        let predicted = self.predict(binary)?;
        let observed = self.classes(y);
        if observed.is_empty() {
            return Ok(0.0);
        }

        let correct = predicted
            .iter()
            .zip(observed.iter())
            .filter(|(p, o)| p == o)
            .count();
        Ok(correct as f64 / observed.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Mutation 0 is lethal, mutation 1 is neutral
    fn lethal_data() -> (Array2<f64>, Array1<f64>) {
        let binary = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [0.0, 0.0],
            [1.0, 1.0]
        ];
        let y = array![1.0, 0.0, 0.9, 0.05, 1.1, 0.0];
        (binary, y)
    }

    #[test]
    fn test_classes() {
        let model = EpistasisLogisticRegression::new(0.5);
        assert_eq!(model.classes(&array![0.2, 0.5, 0.7]).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fit_separates_lethal_mutation() {
        let (binary, y) = lethal_data();
        let mut model = EpistasisLogisticRegression::new(0.5);
        model.fit(&binary, &y).unwrap();

        assert_eq!(model.score(&binary, &y).unwrap(), 1.0);
        let proba = model.predict_proba(&array![[0.0, 1.0], [1.0, 0.0]]).unwrap();
        assert!(proba[0] > 0.5);
        assert!(proba[1] < 0.5);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = EpistasisLogisticRegression::new(0.5);
        assert!(matches!(
            model.predict(&array![[0.0, 1.0]]),
            Err(EpistasisError::NotFitted)
        ));
    }

    #[test]
    fn test_single_class_is_constant() {
        let binary = array![[0.0], [1.0]];
        let y = array![1.0, 2.0];
        let mut model = EpistasisLogisticRegression::new(0.0);
        model.fit(&binary, &y).unwrap();
        assert_eq!(model.predict(&binary).unwrap().to_vec(), vec![1.0, 1.0]);
    }
}
