use std::fmt;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::{ClassificationType, ModelConfig};
use crate::error::{EvalError, Result};
use crate::metrics::ConfusionMatrix;
use crate::models::{fit_model, ClassifierModel};

/// Standard deviation of fold accuracies above which a warning is logged.
const FOLD_SPREAD_WARNING: f64 = 0.05;
/// Train minus validation accuracy above which a warning is logged.
const OVERFIT_GAP_WARNING: f64 = 0.10;

/// Train/validation indices of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Partition `0..n_samples` into `k` validation slices whose sizes differ by
/// at most one. The first `n % k` folds take the extra record.
pub fn k_fold_indices(n_samples: usize, k: usize, shuffle: bool, seed: u64) -> Result<Vec<Fold>> {
    if k < 2 || k > n_samples {
        return Err(EvalError::InvalidFoldCount { k, n_samples });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    }

    let base = n_samples / k;
    let remainder = n_samples % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold_idx in 0..k {
        let size = if fold_idx < remainder { base + 1 } else { base };
        let validation = indices[start..start + size].to_vec();
        let train = indices[..start]
            .iter()
            .chain(indices[start + size..].iter())
            .copied()
            .collect();
        folds.push(Fold { train, validation });
        start += size;
    }
    Ok(folds)
}

/// Scores of one fit/evaluate cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub n_validation: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub train_accuracy: f64,
}

/// Mean and population standard deviation of one metric across folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Summary { mean: f64::NAN, std: f64::NAN };
        }
        Summary {
            mean: values.iter().mean(),
            std: values.iter().population_std_dev(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.4} (+/- {:.4})", self.mean, self.std)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub algorithm: String,
    pub k: usize,
    pub folds: Vec<FoldScore>,
    pub accuracy: Summary,
    pub precision: Summary,
    pub recall: Summary,
    pub f1: Summary,
    pub train_accuracy: Summary,
}

impl CrossValidationReport {
    fn from_folds(algorithm: &str, folds: Vec<FoldScore>) -> Self {
        let column = |pick: fn(&FoldScore) -> f64| Summary::of(&folds.iter().map(pick).collect::<Vec<_>>());
        CrossValidationReport {
            algorithm: algorithm.to_string(),
            k: folds.len(),
            accuracy: column(|s| s.accuracy),
            precision: column(|s| s.precision),
            recall: column(|s| s.recall),
            f1: column(|s| s.f1),
            train_accuracy: column(|s| s.train_accuracy),
            folds,
        }
    }

    pub fn fold_accuracies(&self) -> Vec<f64> {
        self.folds.iter().map(|s| s.accuracy).collect()
    }

    /// Log fold spread and the train/validation gap. Never fails.
    pub fn log_diagnostics(&self) {
        log::info!(
            "{} {}-fold CV accuracy: {}",
            self.algorithm,
            self.k,
            self.accuracy
        );
        if self.accuracy.std > FOLD_SPREAD_WARNING {
            log::warn!(
                "{}: fold accuracies vary widely (std {:.4}); the estimate may be unstable",
                self.algorithm,
                self.accuracy.std
            );
        }
        let gap = self.train_accuracy.mean - self.accuracy.mean;
        if gap > OVERFIT_GAP_WARNING {
            log::warn!(
                "{}: training accuracy {:.4} exceeds validation accuracy {:.4}; possible overfitting",
                self.algorithm,
                self.train_accuracy.mean,
                self.accuracy.mean
            );
        }
    }
}

impl fmt::Display for CrossValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} {}-fold cross-validation", self.algorithm, self.k)?;
        writeln!(
            f,
            "{:>6} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "fold", "n", "accuracy", "precision", "recall", "f1", "train acc"
        )?;
        for s in &self.folds {
            writeln!(
                f,
                "{:>6} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                s.fold + 1,
                s.n_validation,
                s.accuracy,
                s.precision,
                s.recall,
                s.f1,
                s.train_accuracy
            )?;
        }
        writeln!(f, "Accuracy:       {}", self.accuracy)?;
        writeln!(f, "Precision:      {}", self.precision)?;
        writeln!(f, "Recall:         {}", self.recall)?;
        writeln!(f, "F1:             {}", self.f1)?;
        write!(f, "Train accuracy: {}", self.train_accuracy)
    }
}

fn check_inputs(x: &Array2<f64>, y: &Array1<bool>, k: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            expected: x.nrows(),
            found: y.len(),
        });
    }
    if k < 2 || k > x.nrows() {
        return Err(EvalError::InvalidFoldCount {
            k,
            n_samples: x.nrows(),
        });
    }
    Ok(())
}

fn score_fold(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &Array1<bool>,
    fold_idx: usize,
    fold: &Fold,
    classification: ClassificationType,
) -> Result<FoldScore> {
    let x_train = x.select(Axis(0), &fold.train);
    let y_train = y.select(Axis(0), &fold.train);
    let x_val = x.select(Axis(0), &fold.validation);
    let y_val = y.select(Axis(0), &fold.validation);

    let model = fit_model(config, &x_train, &y_train)?;
    let val_cm = ConfusionMatrix::from_predictions(&y_val, &model.predict(&x_val)?)?;
    let train_cm = ConfusionMatrix::from_predictions(&y_train, &model.predict(&x_train)?)?;

    let score = FoldScore {
        fold: fold_idx,
        n_validation: fold.validation.len(),
        accuracy: val_cm.accuracy(),
        precision: val_cm.precision(classification),
        recall: val_cm.recall(classification),
        f1: val_cm.f1(classification),
        train_accuracy: train_cm.accuracy(),
    };
    log::debug!(
        "Fold {}: accuracy {:.4}, train accuracy {:.4}",
        fold_idx + 1,
        score.accuracy,
        score.train_accuracy
    );
    Ok(score)
}

/// Run `k` fit/evaluate cycles of `config`, each holding out one shuffled
/// validation slice.
pub fn cross_validate(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &Array1<bool>,
    k: usize,
    seed: u64,
    classification: ClassificationType,
) -> Result<CrossValidationReport> {
    check_inputs(x, y, k)?;
    let folds = k_fold_indices(x.nrows(), k, true, seed)?;
    let scores = folds
        .iter()
        .enumerate()
        .map(|(i, fold)| score_fold(config, x, y, i, fold, classification))
        .collect::<Result<Vec<_>>>()?;

    let report = CrossValidationReport::from_folds(config.model_type.name(), scores);
    report.log_diagnostics();
    Ok(report)
}

/// Validation accuracy of each fold only; used to rank search candidates.
pub fn cross_val_accuracy(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &Array1<bool>,
    k: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    check_inputs(x, y, k)?;
    k_fold_indices(x.nrows(), k, true, seed)?
        .iter()
        .map(|fold| {
            let model = fit_model(
                config,
                &x.select(Axis(0), &fold.train),
                &y.select(Axis(0), &fold.train),
            )?;
            let y_val = y.select(Axis(0), &fold.validation);
            let predicted = model.predict(&x.select(Axis(0), &fold.validation))?;
            crate::metrics::accuracy(&y_val, &predicted)
        })
        .collect()
}
