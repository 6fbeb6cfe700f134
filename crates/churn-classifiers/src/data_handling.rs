//! Data structures and helpers for holding and partitioning churn datasets.
//!
//! This module defines `Dataset` and `Partition` and contains the seeded
//! splitting routines used to carve hold-out, test and training subsets.
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{EvalError, Result};

#[derive(Debug, Clone)]
pub struct Dataset {
    /// Feature matrix, one row per record; `NaN` marks a missing value
    pub x: Array2<f64>,
    /// Binary label, `true` for the positive (churned) class
    pub y: Array1<bool>,
    /// Feature names, aligned with the columns of `x`
    pub feature_names: Vec<String>,
    /// Record identifiers, aligned with the rows of `x`
    pub ids: Vec<String>,
}

impl Dataset {
    /// Build a dataset, assigning row numbers as identifiers.
    pub fn new(x: Array2<f64>, y: Array1<bool>, feature_names: Vec<String>) -> Result<Self> {
        let ids = (0..x.nrows()).map(|i| i.to_string()).collect();
        Self::with_ids(x, y, feature_names, ids)
    }

    pub fn with_ids(
        x: Array2<f64>,
        y: Array1<bool>,
        feature_names: Vec<String>,
        ids: Vec<String>,
    ) -> Result<Self> {
        if y.len() != x.nrows() {
            return Err(EvalError::LengthMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if ids.len() != x.nrows() {
            return Err(EvalError::LengthMismatch {
                expected: x.nrows(),
                found: ids.len(),
            });
        }
        if feature_names.len() != x.ncols() {
            return Err(EvalError::LengthMismatch {
                expected: x.ncols(),
                found: feature_names.len(),
            });
        }
        Ok(Dataset {
            x,
            y,
            feature_names,
            ids,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    pub fn n_positive(&self) -> usize {
        self.y.iter().filter(|&&v| v).count()
    }

    /// Fraction of records in the positive class.
    pub fn positive_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.n_positive() as f64 / self.n_samples() as f64
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Input Data Summary -----");
        log::info!(
            "{} churned and {} retained records",
            self.n_positive(),
            self.n_samples() - self.n_positive()
        );
        log::info!("{} feature columns", self.n_features());
        let missing = self.x.iter().filter(|v| v.is_nan()).count();
        if missing > 0 {
            log::warn!("{} missing feature values", missing);
        }
        log::info!("-------------------------------");
    }

    /// Copy the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            ids: indices.iter().map(|&i| self.ids[i].clone()).collect(),
        }
    }

    /// Keep rows where `mask[i]` is true.
    pub fn filter(&self, mask: &[bool]) -> Dataset {
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| if keep { Some(i) } else { None })
            .collect();
        self.select(&selected)
    }
}

/// Train / test / hold-out subsets of one dataset.
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: Dataset,
    pub test: Dataset,
    pub holdout: Dataset,
}

impl Partition {
    pub fn log_summary(&self) {
        log::info!(
            "Partitioned into {} train, {} test and {} hold-out records",
            self.train.n_samples(),
            self.test.n_samples(),
            self.holdout.n_samples()
        );
    }
}

fn carved_size(n_samples: usize, fraction: f64) -> Result<usize> {
    let invalid = EvalError::InvalidFraction {
        fraction,
        n_samples,
    };
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(invalid);
    }
    let n_carved = (fraction * n_samples as f64).round() as usize;
    if n_carved == 0 || n_carved >= n_samples {
        return Err(invalid);
    }
    Ok(n_carved)
}

/// Shuffle `0..n_samples` with `seed` and cut off `round(fraction * n)` indices.
///
/// # Returns
///
/// `(rest, carved)` index vectors in permutation order.
pub fn split_indices(n_samples: usize, fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_carved = carved_size(n_samples, fraction)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);

    let rest = indices.split_off(n_carved);
    Ok((rest, indices))
}

/// Per-class variant of [`split_indices`]; each class contributes
/// `round(fraction * class_size)` records to the carved side.
pub fn stratified_split_indices(
    labels: &Array1<bool>,
    fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    carved_size(labels.len(), fraction)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut rest = Vec::with_capacity(labels.len());
    let mut carved = Vec::new();
    for class in [false, true] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let n_carved = (fraction * members.len() as f64).round() as usize;
        carved.extend_from_slice(&members[..n_carved]);
        rest.extend_from_slice(&members[n_carved..]);
    }

    if rest.is_empty() || carved.is_empty() {
        return Err(EvalError::InvalidFraction {
            fraction,
            n_samples: labels.len(),
        });
    }
    Ok((rest, carved))
}

/// Split a dataset into `(rest, carved)` where `carved` holds about
/// `fraction` of the records. The same seed always yields the same split.
pub fn split(dataset: &Dataset, fraction: f64, seed: u64, stratify: bool) -> Result<(Dataset, Dataset)> {
    let (rest, carved) = if stratify {
        stratified_split_indices(&dataset.y, fraction, seed)?
    } else {
        split_indices(dataset.n_samples(), fraction, seed)?
    };
    Ok((dataset.select(&rest), dataset.select(&carved)))
}

/// Carve the hold-out set first, then split the remainder into train and test.
pub fn partition(
    dataset: &Dataset,
    holdout_fraction: f64,
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<Partition> {
    if dataset.is_empty() {
        return Err(EvalError::EmptyInput);
    }
    let (remainder, holdout) = split(dataset, holdout_fraction, seed, stratify)?;
    let (train, test) = split(&remainder, test_fraction, seed.wrapping_add(1), stratify)?;

    let partition = Partition {
        train,
        test,
        holdout,
    };
    partition.log_summary();
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 2), |(r, c)| (r * 2 + c) as f64);
        let y = Array1::from_iter((0..n).map(|i| i % 3 == 0));
        Dataset::new(x, y, vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn split_rejects_degenerate_fractions() {
        assert!(split_indices(10, 0.0, 1).is_err());
        assert!(split_indices(10, 1.0, 1).is_err());
        assert!(split_indices(10, 0.01, 1).is_err());
        assert!(split_indices(10, 1.5, 1).is_err());
    }

    #[test]
    fn select_keeps_ids_aligned() {
        let ds = toy(5);
        let sub = ds.select(&[4, 1]);
        assert_eq!(sub.ids, vec!["4".to_string(), "1".to_string()]);
        assert_eq!(sub.x[(0, 0)], 8.0);
        assert_eq!(sub.y[1], false);
    }

    #[test]
    fn stratified_split_preserves_class_ratio() {
        let labels = Array1::from_iter((0..100).map(|i| i < 30));
        let (_, carved) = stratified_split_indices(&labels, 0.2, 9).unwrap();
        let positives = carved.iter().filter(|&&i| labels[i]).count();
        assert_eq!(carved.len(), 20);
        assert_eq!(positives, 6);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let x = Array2::<f64>::zeros((3, 1));
        let y = Array1::from_vec(vec![true, false]);
        assert!(Dataset::new(x, y, vec!["f".into()]).is_err());
    }
}
