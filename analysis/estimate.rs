//! # Logistic Regression by Iteratively Reweighted Least Squares
//!
//! The estimator solves the binomial-logit likelihood equations with Fisher scoring.
//! Each iteration forms working weights `w = μ(1-μ)` and a working response
//! `z = η + (y-μ)/w`, then solves the weighted normal equations `XᵀWX β = XᵀWz`
//! through a Cholesky factorization.
//!
//! Convergence is declared when the relative change in deviance,
//! `|D - D_old| / (|D| + 0.1)`, drops below the tolerance. The inverse Fisher
//! information at the converged estimate gives the coefficient covariance, from
//! which standard errors, Wald z statistics and two-sided p-values follow.

use crate::data::Dataset;
use crate::faer_ndarray::{FaerCholesky, FaerLinalgError};
use crate::matrix::{DesignMatrix, response};
use crate::model::{FitStatistics, FittedModel, Predictor, TermEstimate};
use crate::types::{Coefficients, LinearPredictor, logit};
use faer::Side;
use ndarray::{Array1, Array2, ArrayView1};
use thiserror::Error;

/// Lower bound on the IRLS working weight.
const MIN_WEIGHT: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error(
        "The fit did not converge within {max_iterations} iterations (last relative deviance change: {last_change:.3e})."
    )]
    FitDidNotConverge {
        max_iterations: usize,
        last_change: f64,
    },
    #[error("Iteration {iteration} produced non-finite coefficients; the predictors may perfectly separate the outcome.")]
    NonFiniteIterate { iteration: usize },
    #[error(
        "The weighted normal equations could not be solved. The design matrix is likely rank deficient (e.g. a constant or duplicated predictor): {0}"
    )]
    LinearSystemSolveFailed(#[from] FaerLinalgError),
    #[error("Design matrix has {rows} rows but the response has {responses} entries.")]
    DimensionMismatch { rows: usize, responses: usize },
    #[error(
        "{observations} observations are not enough to estimate {parameters} parameters."
    )]
    TooFewObservations {
        observations: usize,
        parameters: usize,
    },
}

/// Raw output of a regression routine, in design-column order.
#[derive(Debug, Clone)]
pub struct RegressionFit {
    pub coefficients: Coefficients,
    pub covariance: Array2<f64>,
    pub deviance: f64,
    pub null_deviance: f64,
    pub iterations: usize,
}

impl RegressionFit {
    pub fn standard_errors(&self) -> Array1<f64> {
        self.covariance
            .diag()
            .mapv(|v| if v >= 0.0 { v.sqrt() } else { f64::NAN })
    }
}

/// A binary-outcome regression routine.
pub trait Regressor {
    fn fit(&self, design: &DesignMatrix, y: ArrayView1<f64>) -> Result<RegressionFit, EstimationError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrlsLogistic {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for IrlsLogistic {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

impl Regressor for IrlsLogistic {
    fn fit(&self, design: &DesignMatrix, y: ArrayView1<f64>) -> Result<RegressionFit, EstimationError> {
        let (n, p) = (design.nrows(), design.ncols());
        if y.len() != n {
            return Err(EstimationError::DimensionMismatch {
                rows: n,
                responses: y.len(),
            });
        }
        if n <= p {
            return Err(EstimationError::TooFewObservations {
                observations: n,
                parameters: p,
            });
        }

        let null_deviance = {
            let y_bar = y.sum() / n as f64;
            binomial_deviance(y, &Array1::from_elem(n, y_bar))
        };

        let mut mu = y.mapv(|yi| (yi + 0.5) / 2.0);
        let mut eta = mu.mapv(logit);
        let mut deviance_old = binomial_deviance(y, &mu);
        let mut last_change = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            let weights = working_weights(&mu);
            let z = &eta + &((&y - &mu) / &weights);
            let xtwx = design.weighted_cross_product(&weights);
            let xtwz = design.transpose_vector_multiply(&(&weights * &z));

            let factor = xtwx.cholesky(Side::Lower)?;
            let beta = Coefficients::new(factor.solve_vec(&xtwz));
            if beta.iter().any(|b| !b.is_finite()) {
                log::error!("IRLS iteration {iteration} produced non-finite coefficients: {beta:?}");
                return Err(EstimationError::NonFiniteIterate { iteration });
            }

            eta = design.matrix_vector_multiply(beta.as_view());
            mu = LinearPredictor::new(eta.clone()).probabilities();
            let deviance = binomial_deviance(y, &mu);
            last_change = (deviance - deviance_old).abs() / (deviance.abs() + 0.1);

            log::debug!(
                "IRLS iteration {iteration}: deviance {deviance:.6}, relative change {last_change:.3e}"
            );

            if last_change < self.tolerance {
                let information = design.weighted_cross_product(&working_weights(&mu));
                let covariance = information.cholesky(Side::Lower)?.inverse();
                return Ok(RegressionFit {
                    coefficients: beta,
                    covariance,
                    deviance,
                    null_deviance,
                    iterations: iteration,
                });
            }
            deviance_old = deviance;
        }

        Err(EstimationError::FitDidNotConverge {
            max_iterations: self.max_iterations,
            last_change,
        })
    }
}

fn working_weights(mu: &Array1<f64>) -> Array1<f64> {
    mu.mapv(|m| (m * (1.0 - m)).max(MIN_WEIGHT))
}

/// `-2 Σ [y ln μ + (1-y) ln(1-μ)]` for a 0/1 response.
pub fn binomial_deviance(y: ArrayView1<f64>, mu: &Array1<f64>) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            let mi = mi.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
            if yi > 0.5 { mi.ln() } else { (1.0 - mi).ln() }
        })
        .sum::<f64>()
}

/// Fits `regressor` on `train` with the given predictors and assembles the
/// coefficient table.
pub fn fit_model<R: Regressor>(
    regressor: &R,
    train: &Dataset,
    predictors: &[Predictor],
) -> Result<FittedModel, EstimationError> {
    let design = DesignMatrix::build(train.records(), predictors);
    let y = response(train.records());

    log::info!(
        "Fitting logistic model on {} respondents ({} with the condition) with {} terms.",
        design.nrows(),
        train.positives(),
        design.ncols()
    );
    let fit = regressor.fit(&design, y.view())?;
    log::info!(
        "Converged after {} iterations; residual deviance {:.3} (null {:.3}).",
        fit.iterations,
        fit.deviance,
        fit.null_deviance
    );

    let standard_errors = fit.standard_errors();
    let terms = design
        .column_names()
        .iter()
        .zip(fit.coefficients.iter())
        .zip(standard_errors.iter())
        .map(|((name, &estimate), &se)| TermEstimate::new(name.clone(), estimate, se))
        .collect::<Vec<_>>();

    let statistics = FitStatistics {
        n_obs: design.nrows(),
        n_events: train.positives(),
        deviance: fit.deviance,
        null_deviance: fit.null_deviance,
        aic: fit.deviance + 2.0 * design.ncols() as f64,
        iterations: fit.iterations,
    };

    Ok(FittedModel {
        predictors: predictors.to_vec(),
        statistics,
        terms,
    })
}
