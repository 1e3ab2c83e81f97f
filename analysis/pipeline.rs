//! End-to-end analysis: split, describe, fit, diagnose and evaluate.

use crate::config::{AnalysisConfig, ConfigError};
use crate::data::{DataError, DataPreparer, Dataset, PreparationReport, load_raw_records};
use crate::diagnostics::{VifEntry, variance_inflation_factors};
use crate::estimate::{EstimationError, IrlsLogistic, fit_model};
use crate::evaluate::{Evaluation, Evaluator, MetricError, ScoredOutcome, roc_auc};
use crate::matrix::DesignMatrix;
use crate::model::{FittedModel, ModelError, ScoredRecord};
use crate::report::{ArtifactPaths, ConsoleReport, ReportError, write_artifacts};
use crate::split::{SplitError, stratified_split};
use crate::summary::{DescriptiveSummary, summarize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Everything computed from one prepared dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub train_size: usize,
    pub evaluation_size: usize,
    pub train_prevalence: f64,
    pub evaluation_prevalence: f64,
    /// Over the whole prepared dataset, before splitting.
    pub summary: DescriptiveSummary,
    pub model: FittedModel,
    /// Collinearity of the predictors in the training partition.
    pub vif: Vec<VifEntry>,
    /// Discrimination on the held-out partition.
    pub evaluation: Evaluation,
    pub train_auc: f64,
    pub confidence_level: f64,
}

/// Runs the statistical core on an already prepared dataset. The result depends only on
/// `dataset` and `config`; the split seed comes from `config.split.seed`.
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisOutcome, PipelineError> {
    let partition = stratified_split(dataset, config.split.train_fraction, config.split.seed)?;
    let summary = summarize(dataset);

    let design = DesignMatrix::build(partition.train.records(), &config.fit.predictors);
    let vif = variance_inflation_factors(&design, config.evaluation.vif_threshold);

    let irls = IrlsLogistic {
        max_iterations: config.fit.max_iterations,
        tolerance: config.fit.tolerance,
    };
    let model = fit_model(&irls, &partition.train, &config.fit.predictors)?;

    let evaluation_scores = outcomes(&model.score(&partition.evaluation)?);
    let evaluation =
        Evaluator::new(config.evaluation.default_threshold).evaluate(&evaluation_scores)?;
    let train_auc = roc_auc(&outcomes(&model.score(&partition.train)?))?;

    Ok(AnalysisOutcome {
        train_size: partition.train.len(),
        evaluation_size: partition.evaluation.len(),
        train_prevalence: partition.train.prevalence(),
        evaluation_prevalence: partition.evaluation.prevalence(),
        summary,
        model,
        vif,
        evaluation,
        train_auc,
        confidence_level: config.fit.confidence_level,
    })
}

fn outcomes(scored: &[ScoredRecord]) -> Vec<ScoredOutcome> {
    scored.iter().map(ScoredRecord::outcome).collect()
}

/// Result of [`run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub preparation: PreparationReport,
    pub outcome: AnalysisOutcome,
    pub artifacts: ArtifactPaths,
}

/// Loads and prepares the survey file at `path`, analyzes it, writes all artifacts to
/// the configured output directory and prints the console report.
pub fn run(path: &Path, config: &AnalysisConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let raw = load_raw_records(
        path,
        &config.columns,
        config.input.separator as u8,
        config.input.minimum_rows,
    )?;
    let (dataset, preparation) = DataPreparer::new(&config.codebook).prepare(&raw);
    println!(
        "Prepared {} of {} respondents ({} excluded for missing or unrecognised values).",
        preparation.rows_retained,
        preparation.rows_read,
        preparation.rows_excluded()
    );
    if dataset.len() < config.input.minimum_rows {
        return Err(DataError::InsufficientRows {
            found: dataset.len(),
            required: config.input.minimum_rows,
        }
        .into());
    }

    let outcome = analyze(&dataset, config)?;
    let artifacts = write_artifacts(&config.output.directory, &outcome)?;

    println!();
    print!(
        "{}",
        ConsoleReport {
            preparation: Some(&preparation),
            outcome: &outcome,
        }
    );
    println!();
    println!("Artifacts written to '{}'.", config.output.directory.display());

    Ok(RunSummary {
        preparation,
        outcome,
        artifacts,
    })
}
