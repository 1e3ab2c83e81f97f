//! # Analysis Configuration
//!
//! Everything the pipeline needs beyond the input path lives in a single TOML file.
//! Every section carries defaults, so an empty file (or no file at all) yields the
//! standard analysis: a 0.7/0.3 stratified split seeded with 42, the full predictor
//! set, a 0.5 reference threshold and a VIF flag at 5.

use crate::model::Predictor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The complete, validated run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input: InputConfig,
    pub columns: ColumnNames,
    pub codebook: Codebook,
    pub split: SplitConfig,
    pub fit: FitConfig,
    pub evaluation: EvaluationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Single-byte field separator of the survey extract.
    pub separator: char,
    /// Minimum number of rows, checked both on the raw file and after exclusions.
    pub minimum_rows: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            separator: ',',
            minimum_rows: 20,
        }
    }
}

/// Header names of the six survey fields in the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub outcome: String,
    pub age: String,
    pub sex: String,
    pub bmi: String,
    pub systolic_bp: String,
    pub physically_active: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            outcome: "has_condition".to_string(),
            age: "age".to_string(),
            sex: "sex".to_string(),
            bmi: "bmi".to_string(),
            systolic_bp: "systolic_bp".to_string(),
            physically_active: "physically_active".to_string(),
        }
    }
}

impl ColumnNames {
    /// Column names in schema order.
    pub fn in_schema_order(&self) -> [&str; 6] {
        [
            &self.outcome,
            &self.age,
            &self.sex,
            &self.bmi,
            &self.systolic_bp,
            &self.physically_active,
        ]
    }
}

/// Survey response codes. Codes not listed here (refused, don't know, ...) are
/// treated as missing and the respondent is excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Codebook {
    pub outcome_positive: Vec<f64>,
    pub outcome_negative: Vec<f64>,
    pub sex_male: Vec<f64>,
    pub sex_female: Vec<f64>,
    pub active: Vec<f64>,
    pub inactive: Vec<f64>,
}

impl Default for Codebook {
    fn default() -> Self {
        Self {
            outcome_positive: vec![1.0],
            outcome_negative: vec![0.0, 2.0],
            sex_male: vec![1.0],
            sex_female: vec![2.0],
            active: vec![1.0],
            inactive: vec![0.0, 2.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub seed: u64,
    pub train_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            train_fraction: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub predictors: Vec<Predictor>,
    pub max_iterations: usize,
    /// Relative deviance change below which IRLS is considered converged.
    pub tolerance: f64,
    pub confidence_level: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            predictors: Predictor::ALL.to_vec(),
            max_iterations: 25,
            tolerance: 1e-8,
            confidence_level: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Reference threshold reported next to the Youden threshold.
    pub default_threshold: f64,
    pub vif_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.5,
            vif_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("results"),
        }
    }
}

impl AnalysisConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_string)
    }

    pub fn from_toml_str(toml_string: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.separator.is_ascii() {
            return Err(ConfigError::Invalid {
                field: "input.separator",
                reason: format!("'{}' is not a single-byte character", self.input.separator),
            });
        }
        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::Invalid {
                field: "split.train_fraction",
                reason: format!("{fraction} must lie strictly between 0 and 1"),
            });
        }
        if self.fit.predictors.is_empty() {
            return Err(ConfigError::Invalid {
                field: "fit.predictors",
                reason: "at least one predictor is required".to_string(),
            });
        }
        for (i, predictor) in self.fit.predictors.iter().enumerate() {
            if self.fit.predictors[..i].contains(predictor) {
                return Err(ConfigError::Invalid {
                    field: "fit.predictors",
                    reason: format!("'{}' is listed more than once", predictor.term_name()),
                });
            }
        }
        if self.fit.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "fit.max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.fit.tolerance > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fit.tolerance",
                reason: format!("{} must be positive", self.fit.tolerance),
            });
        }
        let level = self.fit.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(ConfigError::Invalid {
                field: "fit.confidence_level",
                reason: format!("{level} must lie strictly between 0 and 1"),
            });
        }
        let threshold = self.evaluation.default_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::Invalid {
                field: "evaluation.default_threshold",
                reason: format!("{threshold} must lie strictly between 0 and 1"),
            });
        }
        if !(self.evaluation.vif_threshold >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "evaluation.vif_threshold",
                reason: format!(
                    "{} is below 1, the smallest possible VIF",
                    self.evaluation.vif_threshold
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.fit.predictors.len(), 5);
        assert_eq!(config.output.directory, PathBuf::from("results"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [split]
            seed = 7

            [fit]
            predictors = ["age", "sex"]

            [columns]
            outcome = "DIQ010"
            "#,
        )
        .unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.split.train_fraction, 0.7);
        assert_eq!(config.fit.predictors, vec![Predictor::Age, Predictor::Sex]);
        assert_eq!(config.fit.max_iterations, 25);
        assert_eq!(config.columns.outcome, "DIQ010");
        assert_eq!(config.columns.age, "age");
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[evaluation]\nvif_threshold = 10.0").unwrap();
        file.flush().unwrap();
        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.evaluation.vif_threshold, 10.0);
    }

    #[test]
    fn out_of_range_train_fraction_is_rejected() {
        let err = AnalysisConfig::from_toml_str("[split]\ntrain_fraction = 1.0").unwrap_err();
        match err {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "split.train_fraction"),
            other => panic!("Expected Invalid(split.train_fraction), got {:?}", other),
        }
    }

    #[test]
    fn duplicate_predictors_are_rejected() {
        let err = AnalysisConfig::from_toml_str("[fit]\npredictors = [\"bmi\", \"bmi\"]")
            .unwrap_err();
        match err {
            ConfigError::Invalid { field, reason } => {
                assert_eq!(field, "fit.predictors");
                assert!(reason.contains("bmi"));
            }
            other => panic!("Expected Invalid(fit.predictors), got {:?}", other),
        }
    }

    #[test]
    fn unknown_predictor_is_a_parse_error() {
        let err = AnalysisConfig::from_toml_str("[fit]\npredictors = [\"height\"]").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError(_)));
    }
}
