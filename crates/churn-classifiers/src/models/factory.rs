use ndarray::{stack, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::decision_tree::DecisionTreeClassifier;
use crate::models::gbdt::GradientBoostingClassifier;
use crate::models::knn::KnnClassifier;
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::random_forest::RandomForestClassifier;

/// Fitted state of one of the supported algorithms.
#[derive(Serialize, Deserialize)]
pub enum FittedClassifier {
    KNearestNeighbors(KnnClassifier),
    DecisionTree(DecisionTreeClassifier),
    RandomForest(RandomForestClassifier),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegressionClassifier),
}

impl FittedClassifier {
    fn as_model(&self) -> &dyn ClassifierModel {
        match self {
            FittedClassifier::KNearestNeighbors(m) => m,
            FittedClassifier::DecisionTree(m) => m,
            FittedClassifier::RandomForest(m) => m,
            FittedClassifier::GradientBoosting(m) => m,
            FittedClassifier::LogisticRegression(m) => m,
        }
    }
}

/// Immutable result of fitting a `ModelConfig` on one training set.
#[derive(Serialize, Deserialize)]
pub struct TrainedModel {
    config: ModelConfig,
    n_features: usize,
    classifier: FittedClassifier,
}

impl TrainedModel {
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &'static str {
        self.config.model_type.name()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Per-class probability vectors, columns ordered `[negative, positive]`.
    pub fn predict_class_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let positive = self.predict_proba(x)?;
        let negative = positive.mapv(|p| 1.0 - p);
        stack(Axis(1), &[negative.view(), positive.view()])
            .map_err(|e| EvalError::Model(e.to_string()))
    }
}

impl ClassifierModel for TrainedModel {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.classifier.as_model().predict_proba(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        let threshold = self.config.threshold;
        Ok(self.predict_proba(x)?.mapv(|p| p >= threshold))
    }

    fn name(&self) -> &str {
        self.algorithm()
    }
}

/// Fit the classifier described by `config` on `(x, y)`.
pub fn fit_model(config: &ModelConfig, x: &Array2<f64>, y: &Array1<bool>) -> Result<TrainedModel> {
    if x.nrows() == 0 {
        return Err(EvalError::EmptyInput);
    }
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            expected: x.nrows(),
            found: y.len(),
        });
    }
    if x.iter().any(|v| v.is_nan()) {
        return Err(EvalError::Model(
            "feature matrix contains missing values; apply the feature transform first".to_string(),
        ));
    }

    let classifier = match &config.model_type {
        ModelType::KNearestNeighbors { k, weighting } => {
            FittedClassifier::KNearestNeighbors(KnnClassifier::fit(x, y, *k, *weighting)?)
        }
        ModelType::DecisionTree {
            max_depth,
            min_samples_split,
            criterion,
        } => FittedClassifier::DecisionTree(DecisionTreeClassifier::fit(
            x,
            y,
            *max_depth,
            *min_samples_split,
            *criterion,
        )?),
        ModelType::RandomForest {
            n_trees,
            max_depth,
            max_features,
            bootstrap,
            seed,
        } => FittedClassifier::RandomForest(RandomForestClassifier::fit(
            x,
            y,
            *n_trees,
            *max_depth,
            *max_features,
            *bootstrap,
            *seed,
        )?),
        ModelType::GradientBoosting {
            learning_rate,
            n_estimators,
            max_depth,
            min_leaf_size,
        } => FittedClassifier::GradientBoosting(GradientBoostingClassifier::fit(
            x,
            y,
            *learning_rate,
            *n_estimators,
            *max_depth,
            *min_leaf_size,
        )?),
        ModelType::LogisticRegression {
            alpha,
            max_iterations,
            gradient_tolerance,
        } => FittedClassifier::LogisticRegression(LogisticRegressionClassifier::fit(
            x,
            y,
            *alpha,
            *max_iterations,
            *gradient_tolerance,
        )?),
    };

    Ok(TrainedModel {
        config: config.clone(),
        n_features: x.ncols(),
        classifier,
    })
}

impl ModelConfig {
    /// Fit this configuration; see [`fit_model`].
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<bool>) -> Result<TrainedModel> {
        fit_model(self, x, y)
    }
}
