use ndarray::{Array1, ArrayView1};
use std::ops::Deref;

/// Regression coefficients in design-column order (intercept first).
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficients(pub Array1<f64>);

impl Coefficients {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for Coefficients {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Log-odds `η = Xβ` for a set of respondents.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct LinearPredictor(pub Array1<f64>);

/// Log-odds are clamped to this magnitude before the inverse link.
pub const ETA_CLAMP: f64 = 30.0;

impl LinearPredictor {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    /// Applies the inverse logit link elementwise.
    pub fn probabilities(&self) -> Array1<f64> {
        self.0.mapv(inverse_logit)
    }
}

pub fn inverse_logit(eta: f64) -> f64 {
    let eta = eta.clamp(-ETA_CLAMP, ETA_CLAMP);
    1.0 / (1.0 + (-eta).exp())
}

pub fn logit(mu: f64) -> f64 {
    (mu / (1.0 - mu)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn logit_inverts_inverse_logit() {
        for &eta in &[-4.0, -0.3, 0.0, 1.7, 6.0] {
            assert_abs_diff_eq!(logit(inverse_logit(eta)), eta, epsilon = 1e-10);
        }
    }

    #[test]
    fn extreme_log_odds_stay_inside_unit_interval() {
        let eta = LinearPredictor::new(array![-1e6, 0.0, 1e6]);
        let p = eta.probabilities();
        assert!(p[0] > 0.0 && p[0] < 1e-12);
        assert_abs_diff_eq!(p[1], 0.5);
        assert!(p[2] < 1.0 && p[2] > 1.0 - 1e-12);
    }
}
