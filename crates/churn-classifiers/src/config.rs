use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::io::TableReaderConfig;
use crate::search::{ParamValue, SearchConfig};

/// Central configuration for a single classifier.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Probability above which `predict` reports the positive class.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

fn default_threshold() -> f64 {
    0.5
}

/// Neighbor vote weighting for k-nearest neighbors.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeighting {
    Uniform,
    Distance,
}

/// Impurity measure used when growing decision trees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

/// Supported algorithms and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    KNearestNeighbors {
        k: usize,
        weighting: NeighborWeighting,
    },
    DecisionTree {
        max_depth: Option<usize>,
        min_samples_split: usize,
        criterion: SplitCriterion,
    },
    RandomForest {
        n_trees: usize,
        max_depth: Option<usize>,
        /// Features drawn per tree; `None` uses round(sqrt(n_features)).
        max_features: Option<usize>,
        bootstrap: bool,
        seed: u64,
    },
    GradientBoosting {
        learning_rate: f32,
        n_estimators: usize,
        max_depth: u32,
        min_leaf_size: usize,
    },
    LogisticRegression {
        alpha: f64,
        max_iterations: u64,
        gradient_tolerance: f64,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GradientBoosting {
            learning_rate: 0.1,
            n_estimators: 100,
            max_depth: 3,
            min_leaf_size: 1,
        }
    }
}

impl ModelType {
    /// Algorithm identifier used in reports and exported file names.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::KNearestNeighbors { .. } => "KNearestNeighbors",
            ModelType::DecisionTree { .. } => "DecisionTree",
            ModelType::RandomForest { .. } => "RandomForest",
            ModelType::GradientBoosting { .. } => "GradientBoosting",
            ModelType::LogisticRegression { .. } => "LogisticRegression",
        }
    }

    /// Every algorithm with its default hyper-parameters.
    pub fn all_defaults() -> Vec<ModelType> {
        ["knn", "decision_tree", "random_forest", "gradient_boosting", "logistic_regression"]
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    /// Overwrite one hyper-parameter by name.
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let algorithm = self.name();
        let unknown = || EvalError::UnknownParameter {
            algorithm: algorithm.to_string(),
            name: name.to_string(),
        };

        match self {
            ModelType::KNearestNeighbors { k, weighting } => match name {
                "k" | "n_neighbors" => *k = value.as_usize(name)?,
                "weighting" | "weights" => {
                    *weighting = match value.as_str(name)? {
                        "uniform" => NeighborWeighting::Uniform,
                        "distance" => NeighborWeighting::Distance,
                        _ => {
                            return Err(EvalError::InvalidParameterValue {
                                name: name.to_string(),
                                expected: "\"uniform\" or \"distance\"",
                            })
                        }
                    }
                }
                _ => return Err(unknown()),
            },
            ModelType::DecisionTree {
                max_depth,
                min_samples_split,
                criterion,
            } => match name {
                "max_depth" => *max_depth = value.as_opt_usize(name)?,
                "min_samples_split" => *min_samples_split = value.as_usize(name)?,
                "criterion" => *criterion = parse_criterion(name, value)?,
                _ => return Err(unknown()),
            },
            ModelType::RandomForest {
                n_trees,
                max_depth,
                max_features,
                bootstrap,
                seed,
            } => match name {
                "n_trees" | "n_estimators" => *n_trees = value.as_usize(name)?,
                "max_depth" => *max_depth = value.as_opt_usize(name)?,
                "max_features" => *max_features = value.as_opt_usize(name)?,
                "bootstrap" => *bootstrap = value.as_bool(name)?,
                "seed" | "random_state" => *seed = value.as_usize(name)? as u64,
                _ => return Err(unknown()),
            },
            ModelType::GradientBoosting {
                learning_rate,
                n_estimators,
                max_depth,
                min_leaf_size,
            } => match name {
                "learning_rate" => *learning_rate = value.as_f64(name)? as f32,
                "n_estimators" => *n_estimators = value.as_usize(name)?,
                "max_depth" => *max_depth = value.as_usize(name)? as u32,
                "min_leaf_size" => *min_leaf_size = value.as_usize(name)?,
                _ => return Err(unknown()),
            },
            ModelType::LogisticRegression {
                alpha,
                max_iterations,
                gradient_tolerance,
            } => match name {
                "alpha" => *alpha = value.as_f64(name)?,
                "max_iterations" | "max_iter" => *max_iterations = value.as_usize(name)? as u64,
                "gradient_tolerance" | "tol" => *gradient_tolerance = value.as_f64(name)?,
                _ => return Err(unknown()),
            },
        }
        Ok(())
    }
}

fn parse_criterion(name: &str, value: &ParamValue) -> Result<SplitCriterion> {
    match value.as_str(name)? {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        _ => Err(EvalError::InvalidParameterValue {
            name: name.to_string(),
            expected: "\"gini\" or \"entropy\"",
        }),
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "knn" | "k_nearest_neighbors" | "knearestneighbors" => Ok(ModelType::KNearestNeighbors {
                k: 5,
                weighting: NeighborWeighting::Uniform,
            }),
            "decision_tree" | "decisiontree" | "tree" => Ok(ModelType::DecisionTree {
                max_depth: None,
                min_samples_split: 2,
                criterion: SplitCriterion::Gini,
            }),
            "random_forest" | "randomforest" | "forest" => Ok(ModelType::RandomForest {
                n_trees: 100,
                max_depth: None,
                max_features: None,
                bootstrap: true,
                seed: 42,
            }),
            "gradient_boosting" | "gradientboosting" | "gbdt" => Ok(ModelType::default()),
            "logistic_regression" | "logisticregression" | "logistic" => {
                Ok(ModelType::LogisticRegression {
                    alpha: 1.0,
                    max_iterations: 100,
                    gradient_tolerance: 1e-4,
                })
            }
            _ => Err(format!(
                "Unknown model type: {}. Expected one of knn, decision_tree, random_forest, gradient_boosting, logistic_regression",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            threshold: default_threshold(),
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(ModelType::default())
    }
}

/// Whether scores treat the label as binary or average across classes.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationType {
    /// Precision, recall and F1 of the positive class.
    #[default]
    Binary,
    /// Macro-averaged precision, recall and F1.
    Multiple,
}

impl FromStr for ClassificationType {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary" => Ok(ClassificationType::Binary),
            "multiple" => Ok(ClassificationType::Multiple),
            _ => Err(EvalError::InvalidClassificationType(s.to_string())),
        }
    }
}

impl fmt::Display for ClassificationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassificationType::Binary => write!(f, "Binary"),
            ClassificationType::Multiple => write!(f, "Multiple"),
        }
    }
}

/// Parameters for a full evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path: String,
    pub reader: TableReaderConfig,
    pub classification: ClassificationType,
    pub holdout_fraction: f64,
    pub test_fraction: f64,
    pub stratify: bool,
    pub seed: u64,
    pub cv_folds: usize,
    pub pca_components: Option<usize>,
    pub models: Vec<ModelConfig>,
    pub searches: Vec<SearchConfig>,
    pub output_dir: String,
    pub report_file: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: String::new(),
            reader: TableReaderConfig::default(),
            classification: ClassificationType::Binary,
            holdout_fraction: 0.2,
            test_fraction: 0.2,
            stratify: false,
            seed: 42,
            cv_folds: 10,
            pca_components: None,
            models: ModelType::all_defaults()
                .into_iter()
                .map(ModelConfig::new)
                .collect(),
            searches: Vec::new(),
            output_dir: ".".to_string(),
            report_file: Some("churn_evaluation_report.html".to_string()),
        }
    }
}

/// Load a pipeline configuration from a JSON file.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> anyhow::Result<PipelineConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
