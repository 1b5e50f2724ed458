// ==============================================================================
// spline.rs - Nonlinear Spline Epistasis Model
// ==============================================================================
// Description: Smoothing spline between additive predictions and phenotypes
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Model:
//   x = additive (first-order) prediction of each genotype
//   y = f(x), f a penalized B-spline of degree k
// Smoothing:
//   f minimizes |y - f(x)|^2 + lambda * |D_{k+1} a|^2 over B-spline coefficients a.
//   lambda is the largest value whose residual sum of squares stays <= s, so a
//   large s yields the least-squares degree-k polynomial and s = 0 the
//   closest fit the knots allow.
// ==============================================================================

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::linalg::{cholesky_solve, gauss_solve, r_squared};
use super::linear::EpistasisLinearRegression;
use super::EpistasisError;

pub const MAX_SPLINE_ORDER: usize = 5;

const MAX_SEGMENTS: usize = 20;
const LOG_LAMBDA_MIN: f64 = -8.0;
const LOG_LAMBDA_MAX: f64 = 8.0;
const BISECTION_STEPS: usize = 60;

/// Penalized B-spline on a uniform knot grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingSpline {
    degree: usize,
    xmin: f64,
    xmax: f64,
    n_segments: usize,
    coefficients: Array1<f64>,
    /// Penalty weight selected for the smoothing factor
    pub lambda: f64,
    /// Residual sum of squares on the fitted points
    pub residual: f64,
}

impl SmoothingSpline {
    /// Fit a spline of `degree` to (x, y) with residual sum of squares at most `s` where possible.
    pub fn fit(x: &Array1<f64>, y: &Array1<f64>, degree: usize, s: f64) -> Result<Self, EpistasisError> {
        if degree == 0 || degree > MAX_SPLINE_ORDER {
            return Err(EpistasisError::InvalidParameter(format!(
                "spline order must be between 1 and {}, got {}",
                MAX_SPLINE_ORDER, degree
            )));
        }
        if s.is_nan() || s < 0.0 {
            return Err(EpistasisError::InvalidParameter(format!(
                "spline smoothness must be non-negative, got {}",
                s
            )));
        }

        let mut distinct: Vec<f64> = x.to_vec();
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup_by(|a, b| (*a - *b).abs() <= 1e-12 * b.abs().max(1.0));
        if distinct.len() <= degree {
            return Err(EpistasisError::NotEnoughData(format!(
                "spline of order {} needs at least {} distinct additive phenotypes, got {}",
                degree,
                degree + 1,
                distinct.len()
            )));
        }

        let xmin = distinct[0];
        let xmax = distinct[distinct.len() - 1];
        let n_segments = (x.len() / 2).clamp(2, MAX_SEGMENTS);

        let mut spline = Self {
            degree,
            xmin,
            xmax,
            n_segments,
            coefficients: Array1::zeros(n_segments + degree),
            lambda: 0.0,
            residual: 0.0,
        };

        let basis = spline.basis_matrix(x);
        let btb = basis.t().dot(&basis);
        let bty = basis.t().dot(y);
        let penalty = difference_penalty(n_segments + degree, degree + 1);

        // Scale lambda so the search range is independent of the data's magnitude
        let scale = trace(&btb) / trace(&penalty).max(f64::MIN_POSITIVE);
        let solve_at = |log_lambda: f64| -> Result<(Array1<f64>, f64), EpistasisError> {
            let lambda = scale * 10f64.powf(log_lambda);
            let a = &btb + &(lambda * &penalty);
            let coefficients = cholesky_solve(&a, &bty)
                .or_else(|| gauss_solve(&a, &bty))
                .ok_or_else(|| {
                    EpistasisError::ComputationError("spline system is singular".to_string())
                })?;
            let fitted = basis.dot(&coefficients);
            let rss: f64 = fitted.iter().zip(y.iter()).map(|(f, o)| (f - o) * (f - o)).sum();
            Ok((coefficients, rss))
        };

        let (mut coefficients, mut rss) = solve_at(LOG_LAMBDA_MAX)?;
        let mut log_lambda = LOG_LAMBDA_MAX;

        if rss > s {
            let (tight, tight_rss) = solve_at(LOG_LAMBDA_MIN)?;
            if tight_rss >= s {
                coefficients = tight;
                rss = tight_rss;
                log_lambda = LOG_LAMBDA_MIN;
            } else {
                // RSS grows with lambda; keep the smoothest fit under s
                let (mut lo, mut hi) = (LOG_LAMBDA_MIN, LOG_LAMBDA_MAX);
                coefficients = tight;
                rss = tight_rss;
                log_lambda = lo;
                for _ in 0..BISECTION_STEPS {
                    let mid = 0.5 * (lo + hi);
                    let (c, r) = solve_at(mid)?;
                    if r <= s {
                        lo = mid;
                        coefficients = c;
                        rss = r;
                        log_lambda = mid;
                    } else {
                        hi = mid;
                    }
                }
            }
        }

        spline.coefficients = coefficients;
        spline.lambda = scale * 10f64.powf(log_lambda);
        spline.residual = rss;
        debug!(
            "Spline fit: degree {}, {} segments, lambda {:.3e}, rss {:.4}",
            degree, n_segments, spline.lambda, rss
        );

        Ok(spline)
    }

    fn knot_spacing(&self) -> f64 {
        (self.xmax - self.xmin) / self.n_segments as f64
    }

    fn n_basis(&self) -> usize {
        self.n_segments + self.degree
    }

    /// Nonzero B-spline basis values at `x` (clamped to the fitted range) and
    /// the index of the first of them.
    fn basis_at(&self, x: f64) -> (usize, Vec<f64>) {
        let p = self.degree;
        let dx = self.knot_spacing();
        let x = x.clamp(self.xmin, self.xmax);
        let knot = |i: usize| self.xmin + (i as f64 - p as f64) * dx;

        let segment = (((x - self.xmin) / dx).floor() as usize).min(self.n_segments - 1);
        let span = p + segment;

        let mut values = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        values[0] = 1.0;
        for j in 1..=p {
            left[j] = x - knot(span + 1 - j);
            right[j] = knot(span + j) - x;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = values[r] / (right[r + 1] + left[j - r]);
                values[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            values[j] = saved;
        }

        (span - p, values)
    }

    fn basis_matrix(&self, x: &Array1<f64>) -> Array2<f64> {
        let mut basis = Array2::zeros((x.len(), self.n_basis()));
        for (row, &xi) in x.iter().enumerate() {
            let (first, values) = self.basis_at(xi);
            for (offset, v) in values.into_iter().enumerate() {
                basis[[row, first + offset]] = v;
            }
        }
        basis
    }

    fn evaluate_inside(&self, x: f64) -> f64 {
        let (first, values) = self.basis_at(x);
        values
            .iter()
            .enumerate()
            .map(|(offset, v)| v * self.coefficients[first + offset])
            .sum()
    }

    /// Evaluate the spline; outside the fitted range it continues linearly.
    pub fn evaluate(&self, x: f64) -> f64 {
        let h = self.knot_spacing() * 1e-4;
        if x < self.xmin {
            let slope = (self.evaluate_inside(self.xmin + h) - self.evaluate_inside(self.xmin)) / h;
            self.evaluate_inside(self.xmin) + slope * (x - self.xmin)
        } else if x > self.xmax {
            let slope = (self.evaluate_inside(self.xmax) - self.evaluate_inside(self.xmax - h)) / h;
            self.evaluate_inside(self.xmax) + slope * (x - self.xmax)
        } else {
            self.evaluate_inside(x)
        }
    }

    pub fn evaluate_all(&self, x: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| self.evaluate(v))
    }
}

/// `D^T D` for the `order`-th difference matrix over `n` coefficients
fn difference_penalty(n: usize, order: usize) -> Array2<f64> {
    let mut d = Array2::<f64>::eye(n);
    for _ in 0..order.min(n.saturating_sub(1)) {
        let rows = d.nrows() - 1;
        let mut next = Array2::zeros((rows, n));
        for i in 0..rows {
            for j in 0..n {
                next[[i, j]] = d[[i + 1, j]] - d[[i, j]];
            }
        }
        d = next;
    }
    d.t().dot(&d)
}

fn trace(m: &Array2<f64>) -> f64 {
    m.diag().sum()
}

/// Nonlinear epistasis model: additive model followed by a smoothing spline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpistasisSpline {
    /// Spline order (degree), 1 to 5
    pub k: usize,
    /// Smoothing factor, upper bound on the residual sum of squares
    pub s: f64,
    additive: EpistasisLinearRegression,
    spline: Option<SmoothingSpline>,
}

impl EpistasisSpline {
    pub fn new(k: usize, s: f64) -> Self {
        Self {
            k,
            s,
            additive: EpistasisLinearRegression::new(1),
            spline: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.spline.is_some()
    }

    pub fn spline(&self) -> Option<&SmoothingSpline> {
        self.spline.as_ref()
    }

    pub fn fit(
        &mut self,
        binary: &Array2<f64>,
        sites: &[usize],
        y: &Array1<f64>,
    ) -> Result<&mut Self, EpistasisError> {
        self.additive.fit(binary, sites, y)?;
        let x = self.additive.predict(binary)?;
        self.spline = Some(SmoothingSpline::fit(&x, y, self.k, self.s)?);
        Ok(self)
    }

    fn fitted(&self) -> Result<&SmoothingSpline, EpistasisError> {
        self.spline.as_ref().ok_or(EpistasisError::NotFitted)
    }

    /// Additive (linear-scale) prediction of each genotype
    pub fn additive_predict(&self, binary: &Array2<f64>) -> Result<Array1<f64>, EpistasisError> {
        self.additive.predict(binary)
    }

    /// Map linear-scale phenotypes through the spline
    pub fn transform(&self, x: &Array1<f64>) -> Result<Array1<f64>, EpistasisError> {
        Ok(self.fitted()?.evaluate_all(x))
    }

    /// Phenotypes moved onto the linear scale: `x + (y - f(x))`
    pub fn linearize(&self, binary: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>, EpistasisError> {
        let spline = self.fitted()?;
        let x = self.additive.predict(binary)?;
        let fx = spline.evaluate_all(&x);
        Ok(&x + &(y - &fx))
    }

    pub fn predict(&self, binary: &Array2<f64>) -> Result<Array1<f64>, EpistasisError> {
        let spline = self.fitted()?;
        Ok(spline.evaluate_all(&self.additive.predict(binary)?))
    }

    /// Get R² score
    pub fn score(&self, binary: &Array2<f64>, y: &Array1<f64>) -> Result<f64, EpistasisError> {
        Ok(r_squared(y, &self.predict(binary)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn grid(n: usize) -> Array1<f64> {
        Array1::linspace(0.0, 1.0, n)
    }

    #[test]
    fn test_basis_partition_of_unity() {
        let x = grid(9);
        let y = x.mapv(|v| v * v);
        let spline = SmoothingSpline::fit(&x, &y, 3, 0.0).unwrap();
        for xi in [0.0, 0.13, 0.5, 0.77, 1.0] {
            let (_, values) = spline.basis_at(xi);
            assert_relative_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_large_smoothness_gives_polynomial() {
        // A quadratic is reproduced exactly by a degree-2 spline at any smoothing
        let x = grid(12);
        let y = x.mapv(|v| 2.0 * v * v - v + 0.5);
        let spline = SmoothingSpline::fit(&x, &y, 2, 10.0).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert_relative_eq!(spline.evaluate(*xi), *yi, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_linear_spline_smooths_to_line() {
        let x = grid(10);
        let y = x.mapv(|v| (6.0 * v).sin());
        let smooth = SmoothingSpline::fit(&x, &y, 1, 1e6).unwrap();
        // Second differences of a straight line vanish
        let a = smooth.evaluate(0.2);
        let b = smooth.evaluate(0.5);
        let c = smooth.evaluate(0.8);
        assert_relative_eq!(a - 2.0 * b + c, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_small_smoothness_fits_closer() {
        let x = grid(20);
        let y = x.mapv(|v| (6.0 * v).sin());
        let loose = SmoothingSpline::fit(&x, &y, 3, 10.0).unwrap();
        let tight = SmoothingSpline::fit(&x, &y, 3, 0.01).unwrap();
        assert!(tight.residual <= loose.residual);
        assert!(tight.residual <= 0.01 + 1e-9);
    }

    #[test]
    fn test_linear_extrapolation() {
        let x = grid(10);
        let y = x.mapv(|v| 3.0 * v + 1.0);
        let spline = SmoothingSpline::fit(&x, &y, 3, 1.0).unwrap();
        assert_relative_eq!(spline.evaluate(2.0), 7.0, epsilon = 1e-3);
        assert_relative_eq!(spline.evaluate(-1.0), -2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_order() {
        let x = grid(10);
        assert!(matches!(
            SmoothingSpline::fit(&x, &x, 0, 1.0),
            Err(EpistasisError::InvalidParameter(_))
        ));
        assert!(matches!(
            SmoothingSpline::fit(&x, &x, 6, 1.0),
            Err(EpistasisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_too_few_distinct_points() {
        let x = array![0.0, 0.0, 1.0];
        let y = array![0.0, 0.1, 1.0];
        assert!(matches!(
            SmoothingSpline::fit(&x, &y, 2, 1.0),
            Err(EpistasisError::NotEnoughData(_))
        ));
    }

    #[test]
    fn test_epistasis_spline_linearize_round_trip() {
        // Three sites, full library, saturating phenotype
        let mut rows = Vec::new();
        for i in 0..8u32 {
            rows.extend((0..3).map(|b| f64::from((i >> b) & 1)));
        }
        let binary = Array2::from_shape_vec((8, 3), rows).unwrap();
        let additive = binary.sum_axis(ndarray::Axis(1));
        let y = additive.mapv(|a| 1.0 - (-a).exp());

        let mut model = EpistasisSpline::new(2, 0.0);
        model.fit(&binary, &[0, 1, 2], &y).unwrap();
        assert!(model.score(&binary, &y).unwrap() > 0.99);

        // Mapping linearized phenotypes forward recovers the originals
        let linear = model.linearize(&binary, &y).unwrap();
        let x = model.additive_predict(&binary).unwrap();
        let forward = model.transform(&x).unwrap();
        for i in 0..y.len() {
            assert_relative_eq!(forward[i] + (linear[i] - x[i]), y[i], epsilon = 1e-9);
        }
    }
}
