use ndarray::{Array1, Array2};

use crate::error::Result;

/// Shared contract of every fitted classifier: positive-class probabilities
/// and hard labels for a feature matrix with the training layout.
pub trait ClassifierModel {
    /// Probability (0..1) of the positive class for each row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels at the conventional 0.5 threshold.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        Ok(self.predict_proba(x)?.mapv(|p| p >= 0.5))
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
