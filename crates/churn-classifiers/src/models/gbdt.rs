use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Gradient Boosting Decision Tree (GBDT) classifier
#[derive(Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    model: GBDT,
    feature_size: usize,
}

fn to_data_vec(x: &Array2<f64>, labels: Option<&Array1<bool>>) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for (i, row) in x.rows().into_iter().enumerate() {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        // LogLikelyhood loss expects labels in {-1, 1}
        let label = match labels {
            Some(y) if y[i] => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        };
        data.push(Data::new_training_data(features, 1.0, label, None));
    }
    data
}

impl GradientBoostingClassifier {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        learning_rate: f32,
        n_estimators: usize,
        max_depth: u32,
        min_leaf_size: usize,
    ) -> Result<Self> {
        if n_estimators == 0 {
            return Err(EvalError::Model(
                "gradient boosting needs at least one estimator".to_string(),
            ));
        }
        let feature_size = x.ncols();

        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(learning_rate);
        config.set_max_depth(max_depth);
        config.set_iterations(n_estimators);
        config.set_min_leaf_size(min_leaf_size.max(1));
        config.set_debug(false);
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);
        let mut train_x = to_data_vec(x, Some(y));
        gbdt.fit(&mut train_x);

        log::trace!(
            "Fitted GBDT with {} rounds of depth {} on {} rows",
            n_estimators,
            max_depth,
            x.nrows()
        );

        Ok(GradientBoostingClassifier {
            model: gbdt,
            feature_size,
        })
    }
}

impl ClassifierModel for GradientBoostingClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.feature_size {
            return Err(EvalError::LengthMismatch {
                expected: self.feature_size,
                found: x.ncols(),
            });
        }
        let test_x = to_data_vec(x, None);
        let predictions = self.model.predict(&test_x);
        Ok(predictions
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect())
    }

    fn name(&self) -> &str {
        "GradientBoosting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbdt_classifier() {
        // Create a feature matrix with 5 features and 10 samples
        let x = Array2::from_shape_vec(
            (10, 5),
            vec![
                0.1, 1.0, 5.0, 0.2, -0.3, 0.4, -1.0, 5.0, 0.8, 0.1, 0.6, 1.0, 5.0, 1.2, 0.2, 0.9,
                -1.0, 5.0, 1.8, -0.1, 1.2, 1.0, 5.0, 2.4, 0.3, 1.5, -1.0, 5.0, 3.0, 0.0, 1.8, 1.0,
                5.0, 3.6, -0.2, 2.1, -1.0, 5.0, 4.2, 0.4, 2.4, 1.0, 5.0, 4.8, -0.1, 2.7, -1.0, 5.0,
                5.4, 0.2,
            ],
        )
        .unwrap();

        // Target perfectly correlated with the second feature
        let y = x.column(1).mapv(|v| v > 0.0);

        let classifier = GradientBoostingClassifier::fit(&x, &y, 0.3, 20, 3, 1).unwrap();
        let probs = classifier.predict_proba(&x).unwrap();

        assert_eq!(probs.len(), y.len());
        for (p, &label) in probs.iter().zip(y.iter()) {
            assert!(*p >= 0.0 && *p <= 1.0);
            assert_eq!(*p >= 0.5, label);
        }
    }

    #[test]
    fn rejects_wrong_width() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = Array1::from_vec(vec![false, false, true, true]);
        let classifier = GradientBoostingClassifier::fit(&x, &y, 0.1, 5, 2, 1).unwrap();
        assert!(classifier.predict_proba(&Array2::zeros((2, 3))).is_err());
    }
}
