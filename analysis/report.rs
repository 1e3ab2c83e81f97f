//! Console summary and on-disk artifacts of a completed analysis.

use crate::data::PreparationReport;
use crate::diagnostics::VifEntry;
use crate::evaluate::{ConfusionMatrix, MetricError, RocCurve};
use crate::model::{FittedModel, ModelError};
use crate::pipeline::AnalysisOutcome;
use crate::summary::DescriptiveSummary;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report artifact: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write CSV table: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to save fitted model: {0}")]
    ModelError(#[from] ModelError),
}

#[derive(Debug, Serialize)]
struct CoefficientRow<'a> {
    term: &'a str,
    estimate: f64,
    std_error: f64,
    z_value: f64,
    p_value: f64,
    odds_ratio: f64,
    ci_lower: f64,
    ci_upper: f64,
}

/// Where [`write_artifacts`] put each file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub coefficients: PathBuf,
    pub vif: PathBuf,
    pub summary: PathBuf,
    pub roc_curve: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            coefficients: directory.join("coefficients.csv"),
            vif: directory.join("vif.csv"),
            summary: directory.join("descriptive_summary.csv"),
            roc_curve: directory.join("roc_curve.tsv"),
            model: directory.join("model.toml"),
        }
    }
}

pub fn write_coefficients(
    path: &Path,
    model: &FittedModel,
    confidence_level: f64,
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for term in &model.terms {
        let (ci_lower, ci_upper) = term.odds_ratio_interval(confidence_level);
        writer.serialize(CoefficientRow {
            term: &term.term,
            estimate: term.estimate,
            std_error: term.std_error,
            z_value: term.z_value,
            p_value: term.p_value,
            odds_ratio: term.odds_ratio(),
            ci_lower,
            ci_upper,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_vif(path: &Path, entries: &[VifEntry]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &DescriptiveSummary) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for group in &summary.groups {
        writer.serialize(group)?;
    }
    writer.flush()?;
    Ok(())
}

/// Tab-separated `threshold, fpr, tpr` rows, in curve order.
pub fn write_roc_curve(path: &Path, curve: &RocCurve) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    for point in curve.points() {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes every table plus the model file into `directory`, creating it if needed.
pub fn write_artifacts(
    directory: &Path,
    outcome: &AnalysisOutcome,
) -> Result<ArtifactPaths, ReportError> {
    fs::create_dir_all(directory)?;
    let paths = ArtifactPaths::in_directory(directory);
    write_coefficients(&paths.coefficients, &outcome.model, outcome.confidence_level)?;
    write_vif(&paths.vif, &outcome.vif)?;
    write_summary(&paths.summary, &outcome.summary)?;
    write_roc_curve(&paths.roc_curve, &outcome.evaluation.curve)?;
    outcome.model.save(&paths.model)?;
    log::info!("Wrote analysis artifacts to '{}'.", directory.display());
    Ok(paths)
}

/// Human-readable run summary, printed by the pipeline after a successful analysis.
pub struct ConsoleReport<'a> {
    pub preparation: Option<&'a PreparationReport>,
    pub outcome: &'a AnalysisOutcome,
}

impl fmt::Display for ConsoleReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self.outcome;

        if let Some(preparation) = self.preparation {
            writeln!(f, "Data preparation")?;
            writeln!(
                f,
                "  {} rows read, {} retained, {} excluded",
                preparation.rows_read,
                preparation.rows_retained,
                preparation.rows_excluded()
            )?;
            for (field, count) in preparation.excluded_by_field.iter().filter(|(_, c)| *c > 0) {
                writeln!(f, "    {count} without a usable '{field}'")?;
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "Stratified split: {} training ({:.1}% with condition), {} evaluation ({:.1}% with condition)",
            outcome.train_size,
            outcome.train_prevalence * 100.0,
            outcome.evaluation_size,
            outcome.evaluation_prevalence * 100.0
        )?;
        writeln!(f)?;

        let summary = &outcome.summary;
        writeln!(
            f,
            "Descriptive summary ({} respondents, prevalence {:.1}%)",
            summary.total,
            summary.prevalence * 100.0
        )?;
        writeln!(
            f,
            "  {:<18} {:>6} {:>7} {:>14} {:>14} {:>16} {:>7} {:>8}",
            "group", "n", "%", "age", "bmi", "systolic_bp", "% male", "% active"
        )?;
        for g in &summary.groups {
            writeln!(
                f,
                "  {:<18} {:>6} {:>7.1} {:>14} {:>14} {:>16} {:>7.1} {:>8.1}",
                g.group,
                g.count,
                g.percent_of_total,
                mean_sd(g.mean_age, g.sd_age),
                mean_sd(g.mean_bmi, g.sd_bmi),
                mean_sd(g.mean_systolic_bp, g.sd_systolic_bp),
                g.percent_male,
                g.percent_active
            )?;
        }
        writeln!(f)?;

        let stats = &outcome.model.statistics;
        writeln!(
            f,
            "Logistic regression ({} training respondents, {} with condition, {} IRLS iterations)",
            stats.n_obs, stats.n_events, stats.iterations
        )?;
        writeln!(
            f,
            "  {:<18} {:>10} {:>9} {:>8} {:>10} {:>9} {:>21} {:>12}",
            "term",
            "estimate",
            "std.err",
            "z",
            "p",
            "odds ratio",
            format!("{:.0}% CI", outcome.confidence_level * 100.0),
            "odds change"
        )?;
        for term in &outcome.model.terms {
            let (lo, hi) = term.odds_ratio_interval(outcome.confidence_level);
            let change = if term.is_intercept() {
                String::new()
            } else {
                format!("{:+.2}%", term.percent_change_in_odds())
            };
            writeln!(
                f,
                "  {:<18} {:>10.5} {:>9.5} {:>8.3} {:>10.3e} {:>9.4} {:>21} {:>12}",
                term.term,
                term.estimate,
                term.std_error,
                term.z_value,
                term.p_value,
                term.odds_ratio(),
                format!("[{lo:.4}, {hi:.4}]"),
                change
            )?;
        }
        writeln!(
            f,
            "  residual deviance {:.3}, null deviance {:.3}, AIC {:.3}",
            stats.deviance, stats.null_deviance, stats.aic
        )?;
        writeln!(f)?;

        writeln!(f, "Variance inflation factors")?;
        for entry in &outcome.vif {
            writeln!(
                f,
                "  {:<18} {:>8.3}{}",
                entry.term,
                entry.vif,
                if entry.concerning { "  (high)" } else { "" }
            )?;
        }
        writeln!(f)?;

        let evaluation = &outcome.evaluation;
        writeln!(f, "Discrimination on the evaluation partition")?;
        writeln!(
            f,
            "  AUC {:.4} (training {:.4})",
            evaluation.auc, outcome.train_auc
        )?;
        writeln!(
            f,
            "  Youden threshold {:.4}: J {:.4}, TPR {:.4}, FPR {:.4}",
            evaluation.youden.threshold,
            evaluation.youden.j,
            evaluation.youden.tpr,
            evaluation.youden.fpr
        )?;
        write_confusion(f, "default", evaluation.default_threshold, &evaluation.at_default)?;
        write_confusion(f, "Youden", evaluation.youden.threshold, &evaluation.at_youden)
    }
}

fn write_confusion(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    threshold: f64,
    matrix: &ConfusionMatrix,
) -> fmt::Result {
    writeln!(f, "  At the {label} threshold {threshold:.4}:")?;
    writeln!(
        f,
        "    TP {}  FP {}  TN {}  FN {}",
        matrix.true_positives,
        matrix.false_positives,
        matrix.true_negatives,
        matrix.false_negatives
    )?;
    writeln!(
        f,
        "    sensitivity {}  specificity {}  accuracy {}  PPV {}  NPV {}",
        metric(matrix.sensitivity()),
        metric(matrix.specificity()),
        metric(matrix.accuracy()),
        metric(matrix.positive_predictive_value()),
        metric(matrix.negative_predictive_value())
    )
}

fn metric(value: Result<f64, MetricError>) -> String {
    match value {
        Ok(v) => format!("{v:.4}"),
        Err(_) => "undefined".to_string(),
    }
}

fn mean_sd(mean: f64, sd: f64) -> String {
    format!("{mean:.1} ({sd:.1})")
}
