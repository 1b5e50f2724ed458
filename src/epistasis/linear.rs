// ==============================================================================
// linear.rs - Linear Epistasis Regression
// ==============================================================================
// Description: High-order epistasis model fit by least squares
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Model:
//   y = sum over terms T of beta_T * prod_{m in T} e(b_m)
//   - T ranges over the empty term (intercept) and every set of up to `order`
//     mutations at distinct sites
//   - global: e(b) = 1 - 2b  (wildtype +1, mutant -1)
//   - local:  e(b) = b       (wildtype 0, mutant 1)
// ==============================================================================

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::linalg::{r_squared, solve_least_squares};
use super::EpistasisError;

/// Encoding of mutations in the design matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Hadamard encoding, coefficients are effects relative to the average genotype
    #[default]
    Global,
    /// Biochemical encoding, coefficients are effects relative to the wildtype
    Local,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Global => "global",
            ModelType::Local => "local",
        }
    }

    fn encode(&self, bit: f64) -> f64 {
        match self {
            ModelType::Global => 1.0 - 2.0 * bit,
            ModelType::Local => bit,
        }
    }
}

/// Every interaction term up to `order` among features at distinct sites.
///
/// `sites[i]` is the site of feature `i`. Terms are sorted by size and then
/// lexicographically; the first term is always the empty intercept term.
pub fn epistasis_terms(sites: &[usize], order: usize) -> Vec<Vec<usize>> {
    let mut terms: Vec<Vec<usize>> = vec![Vec::new()];
    let mut previous: Vec<Vec<usize>> = vec![Vec::new()];

    for _ in 0..order {
        let mut next = Vec::new();
        for term in &previous {
            let start = term.last().map_or(0, |&last| last + 1);
            for feature in start..sites.len() {
                if term.iter().any(|&m| sites[m] == sites[feature]) {
                    continue;
                }
                let mut extended = term.clone();
                extended.push(feature);
                next.push(extended);
            }
        }
        if next.is_empty() {
            break;
        }
        terms.extend(next.iter().cloned());
        previous = next;
    }

    terms
}

/// Build the `n_genotypes x n_terms` design matrix from 0/1 mutation features
pub fn design_matrix(binary: &Array2<f64>, terms: &[Vec<usize>], model_type: ModelType) -> Array2<f64> {
    let mut x = Array2::ones((binary.nrows(), terms.len()));
    for (row, features) in binary.rows().into_iter().enumerate() {
        for (col, term) in terms.iter().enumerate() {
            x[[row, col]] = term
                .iter()
                .map(|&m| model_type.encode(features[m]))
                .product();
        }
    }
    x
}

/// Linear high-order epistasis model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpistasisLinearRegression {
    /// Highest interaction order included
    pub order: usize,
    pub model_type: ModelType,
    terms: Option<Vec<Vec<usize>>>,
    coefficients: Option<Array1<f64>>,
}

impl EpistasisLinearRegression {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            model_type: ModelType::default(),
            terms: None,
            coefficients: None,
        }
    }

    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Fitted interaction terms (feature indices), intercept first
    pub fn terms(&self) -> Option<&[Vec<usize>]> {
        self.terms.as_deref()
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    /// Fit to a 0/1 feature matrix; `sites[i]` is the site of feature `i`.
    pub fn fit(
        &mut self,
        binary: &Array2<f64>,
        sites: &[usize],
        y: &Array1<f64>,
    ) -> Result<&mut Self, EpistasisError> {
        if self.order == 0 {
            return Err(EpistasisError::InvalidParameter(
                "epistasis order must be at least 1".to_string(),
            ));
        }
        if binary.nrows() != y.len() {
            return Err(EpistasisError::ShapeError {
                expected: format!("y length = {}", binary.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if sites.len() != binary.ncols() {
            return Err(EpistasisError::ShapeError {
                expected: format!("{} feature sites", binary.ncols()),
                actual: format!("{} feature sites", sites.len()),
            });
        }
        if y.is_empty() {
            return Err(EpistasisError::NotEnoughData(
                "cannot fit a linear model to zero genotypes".to_string(),
            ));
        }

        let terms = epistasis_terms(sites, self.order);
        let x = design_matrix(binary, &terms, self.model_type);
        debug!(
            "Fitting order-{} {} model: {} genotypes, {} terms",
            self.order,
            self.model_type.as_str(),
            x.nrows(),
            terms.len()
        );
        if terms.len() > x.nrows() {
            debug!("More terms than genotypes, solution is regularized");
        }

        let coefficients = solve_least_squares(&x, y, 0.0).ok_or_else(|| {
            EpistasisError::ComputationError("Matrix is singular, cannot solve least squares".to_string())
        })?;

        self.terms = Some(terms);
        self.coefficients = Some(coefficients);
        Ok(self)
    }

    pub fn predict(&self, binary: &Array2<f64>) -> Result<Array1<f64>, EpistasisError> {
        let (terms, coefficients) = match (&self.terms, &self.coefficients) {
            (Some(t), Some(c)) => (t, c),
            _ => return Err(EpistasisError::NotFitted),
        };

        if let Some(max) = terms.iter().flatten().max() {
            if *max >= binary.ncols() {
                return Err(EpistasisError::ShapeError {
                    expected: format!("at least {} features", max + 1),
                    actual: format!("{} features", binary.ncols()),
                });
            }
        }

        Ok(design_matrix(binary, terms, self.model_type).dot(coefficients))
    }

    /// Get R² score
    pub fn score(&self, binary: &Array2<f64>, y: &Array1<f64>) -> Result<f64, EpistasisError> {
        let predicted = self.predict(binary)?;
        Ok(r_squared(y, &predicted))
    }

    /// Human-readable term labels given the feature labels (`w.t.` for the intercept)
    pub fn term_labels(&self, feature_labels: &[String]) -> Vec<String> {
        self.terms
            .iter()
            .flatten()
            .map(|term| {
                if term.is_empty() {
                    "w.t.".to_string()
                } else {
                    term.iter()
                        .map(|&m| feature_labels.get(m).cloned().unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join(",")
                }
            })
            .collect()
    }
}
