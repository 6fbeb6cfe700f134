//! Feature transforms fit once on a reference subset and reused unchanged.
//!
//! Provides mean imputation, a standard scaler, and an optional PCA
//! projection, bundled as `FeatureTransform`. All statistics are learned from
//! the reference (training) rows only; applying the transform to other rows
//! never refits it.

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Per-column fill values for missing (`NaN`) cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub fill: Vec<f64>,
}

impl MeanImputer {
    /// Learn column means over the non-missing cells. A column that is
    /// entirely missing is filled with 0.
    pub fn fit(x: &Array2<f64>) -> Self {
        let fill = x
            .axis_iter(Axis(1))
            .map(|column| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();
        MeanImputer { fill }
    }

    pub fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (mut column, &fill) in out.axis_iter_mut(Axis(1)).zip(&self.fill) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        out
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero on constant columns.
    const MIN_STD: f64 = 1e-12;
}

/// Fit a `Scaler` from a matrix where rows are samples and columns are
/// features. Uses the population standard deviation.
pub fn fit_scaler(x: &Array2<f64>) -> Result<Scaler> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 || ncols == 0 {
        return Err(EvalError::EmptyInput);
    }

    let mean = x.mean_axis(Axis(0)).ok_or(EvalError::EmptyInput)?;
    let std = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s.is_finite() { s.max(Scaler::MIN_STD) } else { Scaler::MIN_STD });

    Ok(Scaler {
        mean: mean.to_vec(),
        std: std.to_vec(),
    })
}

/// Transform all rows using the provided `Scaler`.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Array2<f64> {
    let mut out = x.clone();
    for (c, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
        let (mean, std) = (sc.mean[c], sc.std[c]);
        column.mapv_inplace(|v| (v - mean) / std);
    }
    out
}

/// Imputation, standardization and optional PCA, fit on one reference set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureTransform {
    pub imputer: MeanImputer,
    pub scaler: Scaler,
    pub pca: Option<Pca<f64>>,
    n_input_features: usize,
}

impl FeatureTransform {
    /// Fit every stage on `reference`. `pca_components` is clamped to the
    /// number of features and to one less than the number of rows.
    pub fn fit(reference: &Array2<f64>, pca_components: Option<usize>) -> Result<Self> {
        let imputer = MeanImputer::fit(reference);
        let imputed = imputer.apply(reference);
        let scaler = fit_scaler(&imputed)?;

        let pca = match pca_components {
            None => None,
            Some(requested) => {
                let limit = reference.ncols().min(reference.nrows().saturating_sub(1));
                let n_components = requested.clamp(1, limit.max(1));
                if n_components != requested {
                    log::warn!(
                        "Requested {} principal components, using {}",
                        requested,
                        n_components
                    );
                }
                let scaled = transform_all(&imputed, &scaler);
                let dataset = DatasetBase::from(scaled);
                let pca = Pca::params(n_components)
                    .fit(&dataset)
                    .map_err(|e| EvalError::Model(format!("PCA fit failed: {}", e)))?;
                log::debug!(
                    "PCA explained variance ratio: {:?}",
                    pca.explained_variance_ratio()
                );
                Some(pca)
            }
        };

        Ok(FeatureTransform {
            imputer,
            scaler,
            pca,
            n_input_features: reference.ncols(),
        })
    }

    /// Apply the frozen transform to any subset with the reference layout.
    pub fn apply(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_input_features {
            return Err(EvalError::LengthMismatch {
                expected: self.n_input_features,
                found: x.ncols(),
            });
        }
        let scaled = transform_all(&self.imputer.apply(x), &self.scaler);
        Ok(match &self.pca {
            Some(pca) => {
                let projected: Array2<f64> = pca.predict(&scaled);
                projected
            }
            None => scaled,
        })
    }

    pub fn n_input_features(&self) -> usize {
        self.n_input_features
    }

    /// Variance captured by each principal component, when PCA is enabled.
    pub fn explained_variance(&self) -> Option<Array1<f64>> {
        self.pca.as_ref().map(|p| p.explained_variance())
    }

    pub fn explained_variance_ratio(&self) -> Option<Array1<f64>> {
        self.pca.as_ref().map(|p| p.explained_variance_ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn imputer_fills_with_reference_means() {
        let x = array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]];
        let imp = MeanImputer::fit(&x);
        assert_eq!(imp.fill, vec![2.0, 6.0]);
        let out = imp.apply(&x);
        assert_eq!(out[(2, 0)], 2.0);
        assert_eq!(out[(0, 1)], 6.0);
    }

    #[test]
    fn constant_column_scales_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let sc = fit_scaler(&x).unwrap();
        let out = transform_all(&x, &sc);
        assert!(out.column(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn apply_rejects_wrong_width() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let t = FeatureTransform::fit(&x, None).unwrap();
        assert!(t.apply(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn pca_reduces_width_and_reports_variance() {
        let x = Array2::from_shape_fn((20, 4), |(r, c)| (r as f64) * (c as f64 + 1.0) + (r % 3) as f64);
        let t = FeatureTransform::fit(&x, Some(2)).unwrap();
        let out = t.apply(&x).unwrap();
        assert_eq!(out.ncols(), 2);
        let ratio = t.explained_variance_ratio().unwrap();
        assert_eq!(ratio.len(), 2);
        assert!(ratio.iter().all(|r| *r >= 0.0 && *r <= 1.0 + 1e-9));
    }
}
