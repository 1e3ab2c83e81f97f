use crate::data::{Dataset, Record, Sex};
use crate::evaluate::ScoredOutcome;
use crate::matrix::{DesignMatrix, INTERCEPT};
use crate::types::LinearPredictor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A covariate that can enter the model. Sex and physical activity are coded as 0/1
/// dummies with female and inactive as the reference levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predictor {
    Age,
    Sex,
    Bmi,
    SystolicBp,
    PhysicallyActive,
}

impl Predictor {
    pub const ALL: [Predictor; 5] = [
        Predictor::Age,
        Predictor::Sex,
        Predictor::Bmi,
        Predictor::SystolicBp,
        Predictor::PhysicallyActive,
    ];

    /// Column label used in the design matrix and in every report.
    pub fn term_name(self) -> &'static str {
        match self {
            Predictor::Age => "age",
            Predictor::Sex => "sex[male]",
            Predictor::Bmi => "bmi",
            Predictor::SystolicBp => "systolic_bp",
            Predictor::PhysicallyActive => "physically_active",
        }
    }

    pub fn encode(self, record: &Record) -> f64 {
        match self {
            Predictor::Age => record.age,
            Predictor::Sex => match record.sex {
                Sex::Male => 1.0,
                Sex::Female => 0.0,
            },
            Predictor::Bmi => record.bmi,
            Predictor::SystolicBp => record.systolic_bp,
            Predictor::PhysicallyActive => {
                if record.physically_active {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(
        "The model lists {predictors} predictors but carries {terms} coefficient terms; expected {expected}."
    )]
    MismatchedTerms {
        predictors: usize,
        terms: usize,
        expected: usize,
    },
}

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEstimate {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
}

impl TermEstimate {
    pub fn new(term: impl Into<String>, estimate: f64, std_error: f64) -> Self {
        let z_value = estimate / std_error;
        Self {
            term: term.into(),
            estimate,
            std_error,
            z_value,
            p_value: two_sided_p_value(z_value),
        }
    }

    pub fn odds_ratio(&self) -> f64 {
        self.estimate.exp()
    }

    /// Wald interval for the odds ratio, `exp(β ± z·SE)`.
    pub fn odds_ratio_interval(&self, confidence_level: f64) -> (f64, f64) {
        let z = normal_quantile(0.5 + confidence_level / 2.0);
        (
            (self.estimate - z * self.std_error).exp(),
            (self.estimate + z * self.std_error).exp(),
        )
    }

    /// Percent change in the odds per unit increase of the term.
    pub fn percent_change_in_odds(&self) -> f64 {
        (self.odds_ratio() - 1.0) * 100.0
    }

    pub fn is_intercept(&self) -> bool {
        self.term == INTERCEPT
    }
}

pub fn two_sided_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    2.0 * Normal::standard().cdf(-z.abs())
}

pub fn normal_quantile(p: f64) -> f64 {
    Normal::standard().inverse_cdf(p)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub n_obs: usize,
    pub n_events: usize,
    pub deviance: f64,
    pub null_deviance: f64,
    pub aic: f64,
    pub iterations: usize,
}

/// A fitted logistic model: everything needed to score new respondents and to
/// reproduce the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub predictors: Vec<Predictor>,
    pub statistics: FitStatistics,
    pub terms: Vec<TermEstimate>,
}

/// A respondent paired with the probability the model assigns to them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRecord {
    pub record: Record,
    pub probability: f64,
}

impl ScoredRecord {
    pub fn outcome(&self) -> ScoredOutcome {
        ScoredOutcome {
            actual: self.record.has_condition,
            probability: self.probability,
        }
    }
}

impl FittedModel {
    /// Predicted probability of the condition for each record.
    pub fn predict(&self, records: &[Record]) -> Result<Array1<f64>, ModelError> {
        let expected = self.predictors.len() + 1;
        if self.terms.len() != expected {
            return Err(ModelError::MismatchedTerms {
                predictors: self.predictors.len(),
                terms: self.terms.len(),
                expected,
            });
        }
        let design = DesignMatrix::build(records, &self.predictors);
        let beta = self.coefficient_vector();
        let eta = LinearPredictor::new(design.matrix_vector_multiply(beta.view()));
        Ok(eta.probabilities())
    }

    pub fn score(&self, dataset: &Dataset) -> Result<Vec<ScoredRecord>, ModelError> {
        let probabilities = self.predict(dataset.records())?;
        Ok(dataset
            .records()
            .iter()
            .zip(probabilities.iter())
            .map(|(record, &probability)| ScoredRecord {
                record: *record,
                probability,
            })
            .collect())
    }

    pub fn coefficient_vector(&self) -> Array1<f64> {
        self.terms.iter().map(|t| t.estimate).collect()
    }

    pub fn term(&self, name: &str) -> Option<&TermEstimate> {
        self.terms.iter().find(|t| t.term == name)
    }

    pub fn intercept(&self) -> Option<&TermEstimate> {
        self.terms.iter().find(|t| t.is_intercept())
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::NamedTempFile;

    fn record(age: f64, sex: Sex, active: bool) -> Record {
        Record {
            has_condition: false,
            age,
            sex,
            bmi: 27.0,
            systolic_bp: 125.0,
            physically_active: active,
        }
    }

    fn model() -> FittedModel {
        FittedModel {
            predictors: vec![Predictor::Age, Predictor::Sex],
            statistics: FitStatistics {
                n_obs: 200,
                n_events: 40,
                deviance: 180.5,
                null_deviance: 200.2,
                aic: 186.5,
                iterations: 5,
            },
            terms: vec![
                TermEstimate::new("(intercept)", -4.0, 0.8),
                TermEstimate::new("age", 0.05, 0.01),
                TermEstimate::new("sex[male]", 0.4, 0.2),
            ],
        }
    }

    #[test]
    fn encoding_uses_reference_levels() {
        let r = record(50.0, Sex::Female, true);
        assert_eq!(Predictor::Sex.encode(&r), 0.0);
        assert_eq!(Predictor::PhysicallyActive.encode(&r), 1.0);
        assert_eq!(Predictor::Age.encode(&r), 50.0);
        let r = record(50.0, Sex::Male, false);
        assert_eq!(Predictor::Sex.encode(&r), 1.0);
        assert_eq!(Predictor::PhysicallyActive.encode(&r), 0.0);
    }

    #[test]
    fn term_statistics_follow_wald_formulas() {
        let term = TermEstimate::new("age", 0.05, 0.01);
        assert_abs_diff_eq!(term.z_value, 5.0, epsilon = 1e-12);
        assert!(term.p_value < 1e-6);
        assert_abs_diff_eq!(term.odds_ratio(), 0.05f64.exp(), epsilon = 1e-12);
        let (lo, hi) = term.odds_ratio_interval(0.95);
        assert_abs_diff_eq!(lo, (0.05 - 1.959964 * 0.01f64).exp(), epsilon = 1e-6);
        assert_abs_diff_eq!(hi, (0.05 + 1.959964 * 0.01f64).exp(), epsilon = 1e-6);
        assert_abs_diff_eq!(term.percent_change_in_odds(), (0.05f64.exp() - 1.0) * 100.0);

        let null = TermEstimate::new("bmi", 0.0, 0.5);
        assert_abs_diff_eq!(null.p_value, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(two_sided_p_value(1.959964), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn predict_applies_logistic_link() {
        let m = model();
        let records = [record(60.0, Sex::Male, false), record(20.0, Sex::Female, true)];
        let p = m.predict(&records).unwrap();
        let eta0: f64 = -4.0 + 0.05 * 60.0 + 0.4;
        let eta1: f64 = -4.0 + 0.05 * 20.0;
        assert_abs_diff_eq!(p[0], 1.0 / (1.0 + (-eta0).exp()), epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 1.0 / (1.0 + (-eta1).exp()), epsilon = 1e-12);

        let scored = m.score(&Dataset::new(records.to_vec())).unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[1].outcome().probability, p[1]);
        assert!(!scored[1].outcome().actual);
    }

    #[test]
    fn mismatched_terms_are_rejected() {
        let mut m = model();
        m.terms.pop();
        match m.predict(&[record(40.0, Sex::Female, true)]) {
            Err(ModelError::MismatchedTerms {
                predictors,
                terms,
                expected,
            }) => {
                assert_eq!((predictors, terms, expected), (2, 2, 3));
            }
            other => panic!("Expected MismatchedTerms, got {other:?}"),
        }
    }

    #[test]
    fn save_and_load_preserve_model() {
        let m = model();
        let file = NamedTempFile::new().unwrap();
        m.save(file.path()).unwrap();
        let loaded = FittedModel::load(file.path()).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.intercept().unwrap().estimate, -4.0);
        assert_eq!(loaded.term("sex[male]").unwrap().std_error, 0.2);

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("[[terms]]"));
        assert!(text.contains("[statistics]"));
    }
}
