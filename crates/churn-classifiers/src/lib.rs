//! churn-classifiers: model evaluation and selection for customer churn.
//!
//! The crate loads a labeled churn table, partitions it into train, test and
//! hold-out subsets, fits a frozen feature transform on the training rows,
//! trains and tunes several classifiers (nearest neighbors, decision tree,
//! random forest, gradient boosting, logistic regression), scores them with
//! hold-out and k-fold protocols, and exports the winner as JSON.
//!
//! The classifiers themselves come from `linfa` and `gbdt`; this crate only
//! wires them into a reproducible evaluation discipline.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod export;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod search;

pub use config::{ClassificationType, ModelConfig, ModelType, PipelineConfig};
pub use data_handling::{Dataset, Partition};
pub use error::EvalError;
pub use models::{ClassifierModel, TrainedModel};
pub use pipeline::{run_pipeline, run_pipeline_on_table, PipelineOutcome};
