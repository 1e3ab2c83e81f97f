//! # Discrimination and Classification Metrics
//!
//! Evaluation works on [`ScoredOutcome`]s: the observed label of each held-out
//! respondent and the probability the model assigned to it.
//!
//! ### ROC curve
//!
//! The exact empirical curve is built from every distinct predicted probability plus
//! the two boundary thresholds 0 and 1. At threshold `t` a respondent is predicted
//! positive iff `p > t`, so tied probabilities always move together and the curve
//! runs from `(0, 0)` at `t = 1` to `(1, 1)` at `t = 0`. When some probability is
//! exactly 0 the point at `t = 0` cannot reach `(1, 1)`, and the curve is closed with
//! a final point at `t = -∞`. Points are stored in order of decreasing threshold,
//! which is also order of non-decreasing FPR and TPR.
//!
//! ### AUC
//!
//! Trapezoidal area under the stored points. Because tied scores form a single
//! diagonal step, this equals the Mann-Whitney probability that a random positive
//! outscores a random negative, with ties counting one half.
//!
//! ### Youden threshold
//!
//! `J = TPR - FPR` is maximized over the interior thresholds (the boundary points
//! classify everyone the same way and are only used when no interior threshold
//! exists). Values of `J` within `1e-12` of each other are ties. Ties go first to the
//! smaller `(1 - TPR) + FPR`, then to the larger threshold. Since that distance is
//! `1 - J`, the first rule can only separate points whose `J` differ by less than
//! the tie tolerance, and in practice the larger threshold wins.
//!
//! ### Confusion matrix
//!
//! Counts at a fixed threshold with the same strict `p > t` rule. Every derived rate
//! returns [`MetricError::UndefinedMetric`] when its denominator is zero instead of
//! producing NaN.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Tolerance under which two Youden indices are considered equal.
pub const YOUDEN_TIE_TOLERANCE: f64 = 1e-12;

/// A held-out respondent's observed outcome and predicted probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredOutcome {
    pub actual: bool,
    pub probability: f64,
}

/// Pairs observed labels with predicted probabilities position by position.
pub fn pair_outcomes(labels: &[bool], probabilities: &[f64]) -> Result<Vec<ScoredOutcome>, MetricError> {
    if labels.len() != probabilities.len() {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            probabilities: probabilities.len(),
        });
    }
    Ok(labels
        .iter()
        .zip(probabilities)
        .map(|(&actual, &probability)| ScoredOutcome {
            actual,
            probability,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TruePositiveRate,
    FalsePositiveRate,
    Sensitivity,
    Specificity,
    Accuracy,
    PositivePredictiveValue,
    NegativePredictiveValue,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::TruePositiveRate => "true positive rate",
            Metric::FalsePositiveRate => "false positive rate",
            Metric::Sensitivity => "sensitivity",
            Metric::Specificity => "specificity",
            Metric::Accuracy => "accuracy",
            Metric::PositivePredictiveValue => "positive predictive value",
            Metric::NegativePredictiveValue => "negative predictive value",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("The {metric} is undefined: {reason}.")]
    UndefinedMetric { metric: Metric, reason: &'static str },
    #[error("Cannot evaluate an empty set of predictions.")]
    EmptyInput,
    #[error("Prediction {index} has probability {value}, which is not a finite value in [0, 1].")]
    InvalidProbability { index: usize, value: f64 },
    #[error("Got {labels} outcome labels but {probabilities} predicted probabilities.")]
    LengthMismatch { labels: usize, probabilities: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

impl RocPoint {
    pub fn youden_j(&self) -> f64 {
        self.tpr - self.fpr
    }

    /// Manhattan distance to the perfect classifier at `(0, 1)`.
    pub fn distance_to_perfect(&self) -> f64 {
        (1.0 - self.tpr) + self.fpr
    }

    fn is_interior(&self) -> bool {
        self.threshold > 0.0 && self.threshold < 1.0
    }
}

/// The selected operating point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YoudenSelection {
    pub threshold: f64,
    pub tpr: f64,
    pub fpr: f64,
    pub j: f64,
}

/// ROC points in order of decreasing threshold, with the class sizes they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    points: Vec<RocPoint>,
    positives: usize,
    negatives: usize,
}

impl RocCurve {
    pub fn new(points: Vec<RocPoint>, positives: usize, negatives: usize) -> Self {
        Self {
            points,
            positives,
            negatives,
        }
    }

    pub fn points(&self) -> &[RocPoint] {
        &self.points
    }

    pub fn positives(&self) -> usize {
        self.positives
    }

    pub fn negatives(&self) -> usize {
        self.negatives
    }

    pub fn auc(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum()
    }

    pub fn youden(&self) -> Result<YoudenSelection, MetricError> {
        let has_interior = self.points.iter().any(RocPoint::is_interior);
        let mut candidates = self
            .points
            .iter()
            .filter(|p| !has_interior || p.is_interior());

        let mut best = *candidates.next().ok_or(MetricError::EmptyInput)?;
        for point in candidates {
            if prefers(point, &best) {
                best = *point;
            }
        }

        Ok(YoudenSelection {
            threshold: best.threshold,
            tpr: best.tpr,
            fpr: best.fpr,
            j: best.youden_j(),
        })
    }
}

fn prefers(candidate: &RocPoint, incumbent: &RocPoint) -> bool {
    let dj = candidate.youden_j() - incumbent.youden_j();
    if dj > YOUDEN_TIE_TOLERANCE {
        return true;
    }
    if dj < -YOUDEN_TIE_TOLERANCE {
        return false;
    }
    let dd = candidate.distance_to_perfect() - incumbent.distance_to_perfect();
    if dd < -YOUDEN_TIE_TOLERANCE {
        return true;
    }
    if dd > YOUDEN_TIE_TOLERANCE {
        return false;
    }
    candidate.threshold > incumbent.threshold
}

/// Builds a ROC curve from scored outcomes.
pub trait CurveBuilder {
    fn build(&self, scores: &[ScoredOutcome]) -> Result<RocCurve, MetricError>;
}

/// The exact empirical curve over all distinct scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactRocBuilder;

impl CurveBuilder for ExactRocBuilder {
    fn build(&self, scores: &[ScoredOutcome]) -> Result<RocCurve, MetricError> {
        validate(scores)?;
        let positives = scores.iter().filter(|s| s.actual).count();
        let negatives = scores.len() - positives;
        if positives == 0 {
            return Err(MetricError::UndefinedMetric {
                metric: Metric::TruePositiveRate,
                reason: "the evaluation set contains no positive cases",
            });
        }
        if negatives == 0 {
            return Err(MetricError::UndefinedMetric {
                metric: Metric::FalsePositiveRate,
                reason: "the evaluation set contains no negative cases",
            });
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        let mut thresholds: Vec<f64> = sorted.iter().map(|s| s.probability).collect();
        thresholds.push(1.0);
        thresholds.push(0.0);
        thresholds.sort_by(|a, b| b.total_cmp(a));
        thresholds.dedup();

        let (pos, neg) = (positives as f64, negatives as f64);
        let mut points = Vec::with_capacity(thresholds.len());
        let (mut tp, mut fp, mut next) = (0usize, 0usize, 0usize);
        for threshold in thresholds {
            while next < sorted.len() && sorted[next].probability > threshold {
                if sorted[next].actual {
                    tp += 1;
                } else {
                    fp += 1;
                }
                next += 1;
            }
            points.push(RocPoint {
                threshold,
                fpr: fp as f64 / neg,
                tpr: tp as f64 / pos,
            });
        }
        if next < sorted.len() {
            points.push(RocPoint {
                threshold: f64::NEG_INFINITY,
                fpr: 1.0,
                tpr: 1.0,
            });
        }

        Ok(RocCurve::new(points, positives, negatives))
    }
}

fn validate(scores: &[ScoredOutcome]) -> Result<(), MetricError> {
    if scores.is_empty() {
        return Err(MetricError::EmptyInput);
    }
    match scores
        .iter()
        .position(|s| !(s.probability.is_finite() && (0.0..=1.0).contains(&s.probability)))
    {
        Some(index) => Err(MetricError::InvalidProbability {
            index,
            value: scores[index].probability,
        }),
        None => Ok(()),
    }
}

/// Area under the exact ROC curve.
pub fn roc_auc(scores: &[ScoredOutcome]) -> Result<f64, MetricError> {
    Ok(ExactRocBuilder.build(scores)?.auc())
}

/// Two-by-two classification counts at a fixed threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Counts with "predicted positive" meaning `probability > threshold`.
    pub fn at_threshold(scores: &[ScoredOutcome], threshold: f64) -> Self {
        scores.iter().fold(Self::default(), |mut m, s| {
            match (s.probability > threshold, s.actual) {
                (true, true) => m.true_positives += 1,
                (true, false) => m.false_positives += 1,
                (false, false) => m.true_negatives += 1,
                (false, true) => m.false_negatives += 1,
            }
            m
        })
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Rows are predicted (positive, negative); columns are actual (positive, negative).
    pub fn table(&self) -> [[usize; 2]; 2] {
        [
            [self.true_positives, self.false_positives],
            [self.false_negatives, self.true_negatives],
        ]
    }

    pub fn sensitivity(&self) -> Result<f64, MetricError> {
        ratio(
            Metric::Sensitivity,
            self.true_positives,
            self.true_positives + self.false_negatives,
            "there are no actual positives",
        )
    }

    pub fn specificity(&self) -> Result<f64, MetricError> {
        ratio(
            Metric::Specificity,
            self.true_negatives,
            self.true_negatives + self.false_positives,
            "there are no actual negatives",
        )
    }

    pub fn accuracy(&self) -> Result<f64, MetricError> {
        ratio(
            Metric::Accuracy,
            self.true_positives + self.true_negatives,
            self.total(),
            "there are no predictions",
        )
    }

    pub fn positive_predictive_value(&self) -> Result<f64, MetricError> {
        ratio(
            Metric::PositivePredictiveValue,
            self.true_positives,
            self.true_positives + self.false_positives,
            "no respondent is predicted positive",
        )
    }

    pub fn negative_predictive_value(&self) -> Result<f64, MetricError> {
        ratio(
            Metric::NegativePredictiveValue,
            self.true_negatives,
            self.true_negatives + self.false_negatives,
            "no respondent is predicted negative",
        )
    }
}

fn ratio(
    metric: Metric,
    numerator: usize,
    denominator: usize,
    reason: &'static str,
) -> Result<f64, MetricError> {
    if denominator == 0 {
        Err(MetricError::UndefinedMetric { metric, reason })
    } else {
        Ok(numerator as f64 / denominator as f64)
    }
}

/// Full discrimination report for one set of held-out predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub curve: RocCurve,
    pub auc: f64,
    pub youden: YoudenSelection,
    pub default_threshold: f64,
    pub at_default: ConfusionMatrix,
    pub at_youden: ConfusionMatrix,
}

pub struct Evaluator<B = ExactRocBuilder> {
    builder: B,
    default_threshold: f64,
}

impl Evaluator<ExactRocBuilder> {
    pub fn new(default_threshold: f64) -> Self {
        Self::with_builder(ExactRocBuilder, default_threshold)
    }
}

impl<B: CurveBuilder> Evaluator<B> {
    pub fn with_builder(builder: B, default_threshold: f64) -> Self {
        Self {
            builder,
            default_threshold,
        }
    }

    pub fn evaluate(&self, scores: &[ScoredOutcome]) -> Result<Evaluation, MetricError> {
        let curve = self.builder.build(scores)?;
        let auc = curve.auc();
        let youden = curve.youden()?;
        log::info!(
            "AUC {:.4} on {} respondents; Youden threshold {:.4} (J = {:.4}).",
            auc,
            scores.len(),
            youden.threshold,
            youden.j
        );
        Ok(Evaluation {
            at_default: ConfusionMatrix::at_threshold(scores, self.default_threshold),
            at_youden: ConfusionMatrix::at_threshold(scores, youden.threshold),
            default_threshold: self.default_threshold,
            curve,
            auc,
            youden,
        })
    }
}
