use linfa::traits::Predict;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SplitCriterion;
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::decision_tree::grow_tree;

/// One bagged tree and the feature columns it was grown on.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestMember {
    features: Vec<usize>,
    tree: DecisionTree<f64, bool>,
}

/// Bagged ensemble of linfa decision trees. Each tree sees a bootstrap
/// sample of the rows and a random subset of the columns; the positive
/// probability is the fraction of trees voting positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    members: Vec<ForestMember>,
    n_features: usize,
}

impl RandomForestClassifier {
    /// Trees are grown in parallel. Tree `i` draws from its own RNG seeded
    /// with `seed + i`, so the forest does not depend on the thread count.
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        n_trees: usize,
        max_depth: Option<usize>,
        max_features: Option<usize>,
        bootstrap: bool,
        seed: u64,
    ) -> Result<Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(EvalError::EmptyInput);
        }
        if n_trees == 0 {
            return Err(EvalError::Model("random forest needs at least one tree".to_string()));
        }
        let per_tree = max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().round() as usize)
            .clamp(1, n_features);

        let members = (0..n_trees)
            .into_par_iter()
            .map(|i| -> Result<ForestMember> {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let rows: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut features = sample(&mut rng, n_features, per_tree).into_vec();
                features.sort_unstable();

                let sub_x = x.select(Axis(0), &rows).select(Axis(1), &features);
                let sub_y = y.select(Axis(0), &rows);
                let tree = grow_tree(&sub_x, &sub_y, max_depth, 2, SplitCriterion::Gini)?;
                Ok(ForestMember { features, tree })
            })
            .collect::<Result<Vec<_>>>()?;

        log::trace!(
            "Fitted random forest of {} trees on {} of {} features each",
            n_trees,
            per_tree,
            n_features
        );

        Ok(RandomForestClassifier {
            members,
            n_features,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(EvalError::LengthMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        let mut votes = Array1::<f64>::zeros(x.nrows());
        for member in &self.members {
            let sub_x = x.select(Axis(1), &member.features);
            let labels: Array1<bool> = member.tree.predict(&sub_x);
            votes
                .iter_mut()
                .zip(labels.iter())
                .for_each(|(v, &l)| *v += if l { 1.0 } else { 0.0 });
        }
        let n_trees = self.members.len() as f64;
        Ok(votes.mapv(|v| v / n_trees))
    }

    fn name(&self) -> &str {
        "RandomForest"
    }
}
