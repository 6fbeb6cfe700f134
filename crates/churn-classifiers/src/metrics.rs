//! Classification metrics for churn predictions.
//!
//! Labels are `bool` with `true` meaning churned. Precision, recall and F1
//! follow the selected [`ClassificationType`]: the positive class for
//! `Binary`, the unweighted mean over both classes for `Multiple`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::ClassificationType;
use crate::error::{EvalError, Result};

fn check_lengths(y_true: &Array1<bool>, other: usize) -> Result<()> {
    if y_true.is_empty() {
        return Err(EvalError::EmptyInput);
    }
    if y_true.len() != other {
        return Err(EvalError::LengthMismatch {
            expected: y_true.len(),
            found: other,
        });
    }
    Ok(())
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &Array1<bool>, y_pred: &Array1<bool>) -> Result<f64> {
    check_lengths(y_true, y_pred.len())?;
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Accuracy of always predicting the most frequent label.
///
/// Works for any hashable label type; for a binary label with positive rate
/// `p` this is `max(p, 1 - p)`.
pub fn null_accuracy<'a, L, I>(labels: I) -> Result<f64>
where
    L: Eq + Hash + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let mut counts: HashMap<&L, usize> = HashMap::new();
    let mut total = 0usize;
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
        total += 1;
    }
    let majority = counts.values().copied().max().ok_or(EvalError::EmptyInput)?;
    Ok(majority as f64 / total as f64)
}

/// Binary confusion matrix with the positive class being churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<bool>, y_pred: &Array1<bool>) -> Result<Self> {
        check_lengths(y_true, y_pred.len())?;
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        safe_div((self.tp + self.tn) as f64, self.total() as f64)
    }

    /// Scores for one class treated as positive.
    fn class_scores(&self, positive: bool) -> ClassScores {
        let (tp, fp, fn_, support) = if positive {
            (self.tp, self.fp, self.fn_, self.tp + self.fn_)
        } else {
            (self.tn, self.fn_, self.fp, self.tn + self.fp)
        };
        let precision = safe_div(tp as f64, (tp + fp) as f64);
        let recall = safe_div(tp as f64, (tp + fn_) as f64);
        ClassScores {
            precision,
            recall,
            f1: safe_div(2.0 * precision * recall, precision + recall),
            support,
        }
    }

    pub fn precision(&self, classification: ClassificationType) -> f64 {
        self.averaged(classification, |s| s.precision)
    }

    pub fn recall(&self, classification: ClassificationType) -> f64 {
        self.averaged(classification, |s| s.recall)
    }

    pub fn f1(&self, classification: ClassificationType) -> f64 {
        self.averaged(classification, |s| s.f1)
    }

    fn averaged(&self, classification: ClassificationType, pick: impl Fn(&ClassScores) -> f64) -> f64 {
        match classification {
            ClassificationType::Binary => pick(&self.class_scores(true)),
            ClassificationType::Multiple => {
                (pick(&self.class_scores(false)) + pick(&self.class_scores(true))) / 2.0
            }
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Confusion matrix")?;
        writeln!(f, "{:>16} {:>10} {:>10}", "", "pred No", "pred Yes")?;
        writeln!(f, "{:>16} {:>10} {:>10}", "actual No", self.tn, self.fp)?;
        write!(f, "{:>16} {:>10} {:>10}", "actual Yes", self.fn_, self.tp)
    }
}

/// Precision, recall, F1 and support of one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores plus macro and support-weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub retained: ClassScores,
    pub churned: ClassScores,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn new(y_true: &Array1<bool>, y_pred: &Array1<bool>) -> Result<Self> {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
        Ok(Self::from_confusion(&cm))
    }

    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let retained = cm.class_scores(false);
        let churned = cm.class_scores(true);
        let total = cm.total();

        let mean = |pick: fn(&ClassScores) -> f64| (pick(&retained) + pick(&churned)) / 2.0;
        let weighted = |pick: fn(&ClassScores) -> f64| {
            safe_div(
                pick(&retained) * retained.support as f64 + pick(&churned) * churned.support as f64,
                total as f64,
            )
        };

        ClassificationReport {
            retained,
            churned,
            macro_avg: ClassScores {
                precision: mean(|s| s.precision),
                recall: mean(|s| s.recall),
                f1: mean(|s| s.f1),
                support: total,
            },
            weighted_avg: ClassScores {
                precision: weighted(|s| s.precision),
                recall: weighted(|s| s.recall),
                f1: weighted(|s| s.f1),
                support: total,
            },
            accuracy: cm.accuracy(),
        }
    }

    /// Rows as `(label, scores)` in display order.
    pub fn rows(&self) -> [(&'static str, &ClassScores); 4] {
        [
            ("No", &self.retained),
            ("Yes", &self.churned),
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ]
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (label, s) in self.rows().iter().take(2) {
            writeln!(
                f,
                "{:>14} {:>10.3} {:>10.3} {:>10.3} {:>10}",
                label, s.precision, s.recall, s.f1, s.support
            )?;
        }
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.3} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (label, s) in self.rows().iter().skip(2) {
            writeln!(
                f,
                "{:>14} {:>10.3} {:>10.3} {:>10.3} {:>10}",
                label, s.precision, s.recall, s.f1, s.support
            )?;
        }
        Ok(())
    }
}

/// Points of a receiver operating characteristic curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score threshold at each point; the first entry is `+inf`.
    pub thresholds: Vec<f64>,
}

/// ROC curve over decreasing score thresholds. Tied scores form a single
/// point.
pub fn roc_curve(y_true: &Array1<bool>, scores: &Array1<f64>) -> Result<RocCurve> {
    check_lengths(y_true, scores.len())?;
    if scores.iter().any(|s| s.is_nan()) {
        return Err(EvalError::Model("ROC scores contain NaN".to_string()));
    }
    let n_pos = y_true.iter().filter(|t| **t).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EvalError::SingleClass);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = order
            .get(pos + 1)
            .map(|&next| scores[next] != scores[i])
            .unwrap_or(true);
        if last_of_tie {
            curve.fpr.push(fp as f64 / n_neg as f64);
            curve.tpr.push(tp as f64 / n_pos as f64);
            curve.thresholds.push(scores[i]);
        }
    }
    Ok(curve)
}

/// Area under the ROC curve by the trapezoidal rule.
pub fn roc_auc(y_true: &Array1<bool>, scores: &Array1<f64>) -> Result<f64> {
    let curve = roc_curve(y_true, scores)?;
    Ok(curve_area(&curve))
}

fn curve_area(curve: &RocCurve) -> f64 {
    curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum()
}

/// One row of the sample-predictions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePrediction {
    pub id: String,
    pub actual: bool,
    pub predicted: bool,
    pub probability: f64,
}

/// Number of rows kept in [`Evaluation::samples`].
pub const N_SAMPLE_PREDICTIONS: usize = 10;

/// Everything reported for one model on one labeled subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub subset: String,
    pub classification: ClassificationType,
    pub n_samples: usize,
    pub accuracy: f64,
    pub null_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
    /// `None` when the subset holds a single class.
    pub auc: Option<f64>,
    pub roc: Option<RocCurve>,
    pub report: ClassificationReport,
    pub samples: Vec<SamplePrediction>,
}

impl Evaluation {
    /// Score hard predictions and positive-class probabilities against
    /// `y_true`. `ids` label the sample rows and may be empty.
    pub fn new(
        subset: &str,
        classification: ClassificationType,
        y_true: &Array1<bool>,
        y_pred: &Array1<bool>,
        probabilities: &Array1<f64>,
        ids: &[String],
    ) -> Result<Self> {
        check_lengths(y_true, probabilities.len())?;
        let confusion = ConfusionMatrix::from_predictions(y_true, y_pred)?;

        let roc = match roc_curve(y_true, probabilities) {
            Ok(curve) => Some(curve),
            Err(EvalError::SingleClass) => {
                log::warn!("Only one class present in {} subset; skipping ROC AUC", subset);
                None
            }
            Err(e) => return Err(e),
        };

        let samples = (0..y_true.len().min(N_SAMPLE_PREDICTIONS))
            .map(|i| SamplePrediction {
                id: ids.get(i).cloned().unwrap_or_else(|| i.to_string()),
                actual: y_true[i],
                predicted: y_pred[i],
                probability: probabilities[i],
            })
            .collect();

        Ok(Evaluation {
            subset: subset.to_string(),
            classification,
            n_samples: y_true.len(),
            accuracy: confusion.accuracy(),
            null_accuracy: null_accuracy(y_true.iter())?,
            precision: confusion.precision(classification),
            recall: confusion.recall(classification),
            f1: confusion.f1(classification),
            confusion,
            auc: roc.as_ref().map(curve_area),
            roc,
            report: ClassificationReport::from_confusion(&confusion),
            samples,
        })
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "== {} ({} records) ==", self.subset, self.n_samples)?;
        writeln!(f, "Accuracy:      {:.4}", self.accuracy)?;
        writeln!(f, "Null accuracy: {:.4}", self.null_accuracy)?;
        writeln!(
            f,
            "Precision / recall / F1 ({}): {:.4} / {:.4} / {:.4}",
            self.classification, self.precision, self.recall, self.f1
        )?;
        match self.auc {
            Some(auc) => writeln!(f, "ROC AUC:       {:.4}", auc)?,
            None => writeln!(f, "ROC AUC:       n/a")?,
        }
        writeln!(f, "{}", self.confusion)?;
        write!(f, "{}", self.report)?;
        writeln!(f, "First {} predictions:", self.samples.len())?;
        for s in &self.samples {
            writeln!(
                f,
                "  {:<16} actual={:<5} predicted={:<5} p={:.3}",
                s.id, s.actual, s.predicted, s.probability
            )?;
        }
        Ok(())
    }
}
