use crate::matrix::DesignMatrix;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::Serialize;

/// Variance inflation factor of one predictor column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VifEntry {
    pub term: String,
    pub vif: f64,
    /// R² of the auxiliary regression of this column on the other predictors.
    pub r_squared: f64,
    pub concerning: bool,
}

/// Computes `1 / (1 - R²_j)` for every predictor column of `design`, excluding the
/// intercept, with `R²_j` from an OLS regression of column `j` on the remaining
/// predictors plus an intercept. A column that is constant or exactly explained by
/// the others gets an infinite VIF. Entries at or above `threshold` are flagged.
pub fn variance_inflation_factors(design: &DesignMatrix, threshold: f64) -> Vec<VifEntry> {
    let predictors = design.predictor_columns();
    let names = &design.column_names()[1..];

    (0..predictors.ncols())
        .into_par_iter()
        .map(|j| {
            let r_squared = auxiliary_r_squared(predictors, j);
            let vif = if r_squared.is_finite() && r_squared < 1.0 {
                1.0 / (1.0 - r_squared)
            } else {
                f64::INFINITY
            };
            if vif >= threshold {
                log::warn!("Predictor '{}' has VIF {:.2} (R² = {:.3}).", names[j], vif, r_squared);
            }
            VifEntry {
                term: names[j].clone(),
                vif,
                r_squared,
                concerning: vif >= threshold,
            }
        })
        .collect()
}

/// Relative squared norm below which a centred column counts as constant, or as
/// already spanned by the columns kept before it.
const ALIASING_TOLERANCE: f64 = 1e-10;

/// R² of column `target` on the other predictors plus an intercept. Centring
/// absorbs the intercept; the other columns are orthonormalised one at a time and
/// any that add no new direction are left out, so an aliased neighbour never
/// inflates the R² of a column that is itself well determined.
fn auxiliary_r_squared(predictors: ArrayView2<f64>, target: usize) -> f64 {
    let y = predictors.column(target);
    let (y, total) = match centred(y) {
        Some(centred) => centred,
        None => return 1.0,
    };

    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(predictors.ncols());
    for (j, column) in predictors.axis_iter(Axis(1)).enumerate() {
        if j == target {
            continue;
        }
        let Some((mut q, spread)) = centred(column) else {
            continue;
        };
        for b in &basis {
            let projection = b.dot(&q);
            q.scaled_add(-projection, b);
        }
        let norm_sq = q.dot(&q);
        if norm_sq <= ALIASING_TOLERANCE * spread {
            continue;
        }
        q /= norm_sq.sqrt();
        basis.push(q);
    }

    let explained: f64 = basis.iter().map(|b| b.dot(&y).powi(2)).sum();
    (explained / total).min(1.0)
}

/// The column minus its mean together with its centred sum of squares, or `None`
/// when the column is constant.
fn centred(column: ArrayView1<f64>) -> Option<(Array1<f64>, f64)> {
    let mean = column.sum() / column.len() as f64;
    let centred = column.mapv(|v| v - mean);
    let spread = centred.dot(&centred);
    let magnitude = column.dot(&column);
    (spread > ALIASING_TOLERANCE * magnitude && spread > 0.0).then_some((centred, spread))
}
