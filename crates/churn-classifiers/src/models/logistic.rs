use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// L2-regularized logistic regression backed by `linfa-logistic`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    model: FittedLogisticRegression<f64, bool>,
    n_features: usize,
}

impl LogisticRegressionClassifier {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        alpha: f64,
        max_iterations: u64,
        gradient_tolerance: f64,
    ) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(EvalError::EmptyInput);
        }
        let dataset = Dataset::new(x.clone(), y.clone());
        let model = LogisticRegression::default()
            .alpha(alpha)
            .max_iterations(max_iterations)
            .gradient_tolerance(gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| EvalError::Model(format!("logistic regression fit failed: {}", e)))?;

        log::trace!("Logistic regression intercept: {}", model.intercept());

        Ok(LogisticRegressionClassifier {
            model,
            n_features: x.ncols(),
        })
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        self.model.params()
    }
}

impl ClassifierModel for LogisticRegressionClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(EvalError::LengthMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        let probs = self.model.predict_probabilities(x);
        // linfa reports the probability of its own positive class
        if self.model.labels().pos.class {
            Ok(probs)
        } else {
            Ok(probs.mapv(|p| 1.0 - p))
        }
    }

    fn name(&self) -> &str {
        "LogisticRegression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn probabilities_increase_with_signal() {
        let x = array![[-3.0], [-2.0], [-1.0], [-0.5], [0.5], [1.0], [2.0], [3.0]];
        let y = array![false, false, false, true, false, true, true, true];
        let clf = LogisticRegressionClassifier::fit(&x, &y, 0.1, 200, 1e-6).unwrap();
        let probs = clf.predict_proba(&array![[-5.0], [5.0]]).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
        assert_eq!(clf.coefficients().len(), 1);
    }
}
