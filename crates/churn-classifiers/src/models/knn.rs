use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::NeighborWeighting;
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// K-nearest-neighbor classifier. Fitting memorizes the training rows; the
/// k-d tree index is built per prediction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    records: Array2<f64>,
    labels: Array1<bool>,
    k: usize,
    weighting: NeighborWeighting,
}

impl KnnClassifier {
    pub fn fit(x: &Array2<f64>, y: &Array1<bool>, k: usize, weighting: NeighborWeighting) -> Result<Self> {
        if k == 0 {
            return Err(EvalError::Model("k must be at least 1".to_string()));
        }
        if x.nrows() == 0 {
            return Err(EvalError::EmptyInput);
        }
        let k = if k > x.nrows() {
            log::warn!(
                "k = {} exceeds the {} training rows; using k = {}",
                k,
                x.nrows(),
                x.nrows()
            );
            x.nrows()
        } else {
            k
        };

        Ok(KnnClassifier {
            records: x.clone(),
            labels: y.clone(),
            k,
            weighting,
        })
    }
}

impl ClassifierModel for KnnClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.records.ncols() {
            return Err(EvalError::LengthMismatch {
                expected: self.records.ncols(),
                found: x.ncols(),
            });
        }
        let index = CommonNearestNeighbour::KdTree
            .from_batch(&self.records, L2Dist)
            .map_err(|e| EvalError::Model(format!("failed to build neighbor index: {}", e)))?;

        let mut probs = Vec::with_capacity(x.nrows());
        for row in x.rows() {
            let neighbours = index
                .k_nearest(row, self.k)
                .map_err(|e| EvalError::Model(format!("neighbor query failed: {}", e)))?;

            let votes: Vec<(f64, bool)> = neighbours
                .iter()
                .map(|(point, idx)| {
                    let distance = point
                        .iter()
                        .zip(row.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    (distance, self.labels[*idx])
                })
                .collect();

            let prob = match self.weighting {
                NeighborWeighting::Uniform => {
                    votes.iter().filter(|(_, label)| *label).count() as f64 / votes.len() as f64
                }
                NeighborWeighting::Distance => {
                    // Exact matches take all the weight
                    let exact: Vec<bool> = votes
                        .iter()
                        .filter(|(d, _)| *d == 0.0)
                        .map(|(_, label)| *label)
                        .collect();
                    if !exact.is_empty() {
                        exact.iter().filter(|l| **l).count() as f64 / exact.len() as f64
                    } else {
                        let total: f64 = votes.iter().map(|(d, _)| 1.0 / d).sum();
                        let positive: f64 = votes
                            .iter()
                            .filter(|(_, label)| *label)
                            .map(|(d, _)| 1.0 / d)
                            .sum();
                        positive / total
                    }
                }
            };
            probs.push(prob);
        }

        Ok(Array1::from_vec(probs))
    }

    fn name(&self) -> &str {
        "KNearestNeighbors"
    }
}
