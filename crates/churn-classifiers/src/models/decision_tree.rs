use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::SplitCriterion;
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Fit a single linfa decision tree on the given rows.
pub(crate) fn grow_tree(
    x: &Array2<f64>,
    y: &Array1<bool>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    criterion: SplitCriterion,
) -> Result<DecisionTree<f64, bool>> {
    if x.nrows() == 0 {
        return Err(EvalError::EmptyInput);
    }
    let split_quality = match criterion {
        SplitCriterion::Gini => SplitQuality::Gini,
        SplitCriterion::Entropy => SplitQuality::Entropy,
    };
    let dataset = Dataset::new(x.clone(), y.clone());
    DecisionTree::params()
        .split_quality(split_quality)
        .max_depth(max_depth)
        .min_weight_split(min_samples_split.max(2) as f32)
        .min_weight_leaf(1.0)
        .fit(&dataset)
        .map_err(|e| EvalError::Model(format!("decision tree fit failed: {}", e)))
}

/// Single decision tree. Probabilities are the hard 0/1 vote of the leaf the
/// row lands in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    tree: DecisionTree<f64, bool>,
    n_features: usize,
}

impl DecisionTreeClassifier {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        max_depth: Option<usize>,
        min_samples_split: usize,
        criterion: SplitCriterion,
    ) -> Result<Self> {
        let tree = grow_tree(x, y, max_depth, min_samples_split, criterion)?;
        Ok(DecisionTreeClassifier {
            tree,
            n_features: x.ncols(),
        })
    }
}

impl ClassifierModel for DecisionTreeClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(EvalError::LengthMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        let labels: Array1<bool> = self.tree.predict(x);
        Ok(labels.mapv(|l| if l { 1.0 } else { 0.0 }))
    }

    fn name(&self) -> &str {
        "DecisionTree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separable_threshold_is_learned() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![false, false, false, true, true, true];
        let clf = DecisionTreeClassifier::fit(&x, &y, Some(3), 2, SplitCriterion::Gini).unwrap();
        let probs = clf.predict_proba(&array![[0.0], [20.0]]).unwrap();
        assert_eq!(probs.to_vec(), vec![0.0, 1.0]);
    }
}
