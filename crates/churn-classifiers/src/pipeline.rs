//! End-to-end evaluation run: partition, transform, train, search, evaluate,
//! export.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};

use crate::config::{ClassificationType, ModelConfig, PipelineConfig};
use crate::cross_validation::{cross_validate, CrossValidationReport};
use crate::data_handling::{partition, Dataset};
use crate::export::{export_model, ExportedModel};
use crate::io::{LoadedTable, TableReaderConfig, TableSchema};
use crate::metrics::Evaluation;
use crate::models::{fit_model, ClassifierModel, TrainedModel};
use crate::preprocessing::FeatureTransform;
use crate::report::summary::build_evaluation_report;
use crate::search::{run_search, SearchResult};

/// Score `model` on one labeled subset.
pub fn evaluate_model(
    model: &TrainedModel,
    subset: &str,
    x: &Array2<f64>,
    y: &Array1<bool>,
    ids: &[String],
    classification: ClassificationType,
) -> crate::error::Result<Evaluation> {
    let probabilities = model.predict_proba(x)?;
    let predicted = model.predict(x)?;
    Evaluation::new(subset, classification, y, &predicted, &probabilities, ids)
}

/// Evaluation of one trained candidate.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    /// Algorithm name, suffixed with the search strategy for tuned models.
    pub label: String,
    pub config: ModelConfig,
    pub test: Evaluation,
    pub holdout: Evaluation,
    pub cross_validation: CrossValidationReport,
}

impl fmt::Display for ModelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "######## {} ########", self.label)?;
        writeln!(f, "{}", self.test)?;
        writeln!(f, "{}", self.holdout)?;
        write!(f, "{}", self.cross_validation)
    }
}

/// Subset sizes of the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSizes {
    pub train: usize,
    pub test: usize,
    pub holdout: usize,
}

pub struct PipelineOutcome {
    pub classification: ClassificationType,
    pub sizes: PartitionSizes,
    pub explained_variance_ratio: Option<Array1<f64>>,
    pub models: Vec<ModelOutcome>,
    pub searches: Vec<SearchResult>,
    /// Index into `models` of the highest test accuracy.
    pub best_index: usize,
    pub best_model: ExportedModel,
    /// Path of the written `Customer_Churn_<Algorithm>.json`.
    pub exported: PathBuf,
    pub report: Option<PathBuf>,
}

impl PipelineOutcome {
    pub fn best(&self) -> &ModelOutcome {
        &self.models[self.best_index]
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Partition: {} train / {} test / {} hold-out",
            self.sizes.train, self.sizes.test, self.sizes.holdout
        )?;
        for search in &self.searches {
            writeln!(f, "{}\n", search)?;
        }
        for model in &self.models {
            writeln!(f, "{}\n", model)?;
        }
        writeln!(f, "{:<40} {:>10} {:>10} {:>12}", "model", "test acc", "test AUC", "CV acc")?;
        for model in &self.models {
            writeln!(
                f,
                "{:<40} {:>10.4} {:>10} {:>12}",
                model.label,
                model.test.accuracy,
                model
                    .test
                    .auc
                    .map(|a| format!("{:.4}", a))
                    .unwrap_or_else(|| "n/a".to_string()),
                format!("{:.4}", model.cross_validation.accuracy.mean)
            )?;
        }
        write!(f, "Best model: {}", self.best().label)
    }
}

struct Subsets<'a> {
    train: (&'a Array2<f64>, &'a Dataset),
    test: (&'a Array2<f64>, &'a Dataset),
    holdout: (&'a Array2<f64>, &'a Dataset),
}

fn assess(
    label: String,
    model: &TrainedModel,
    subsets: &Subsets,
    config: &PipelineConfig,
) -> Result<ModelOutcome> {
    let (x_test, test) = subsets.test;
    let (x_holdout, holdout) = subsets.holdout;
    let (x_train, train) = subsets.train;

    let test_eval = evaluate_model(model, "test", x_test, &test.y, &test.ids, config.classification)?;
    let holdout_eval = evaluate_model(
        model,
        "hold-out",
        x_holdout,
        &holdout.y,
        &holdout.ids,
        config.classification,
    )?;
    let cv = cross_validate(
        model.config(),
        x_train,
        &train.y,
        config.cv_folds,
        config.seed,
        config.classification,
    )
    .with_context(|| format!("Cross-validation of {} failed", label))?;

    log::info!(
        "{}: test accuracy {:.4}, hold-out accuracy {:.4}, CV accuracy {}",
        label,
        test_eval.accuracy,
        holdout_eval.accuracy,
        cv.accuracy
    );

    Ok(ModelOutcome {
        label,
        config: model.config().clone(),
        test: test_eval,
        holdout: holdout_eval,
        cross_validation: cv,
    })
}

/// Run the full evaluation on `dataset`. `table` carries the schema and
/// reader settings stored with the exported model when the data came from
/// a file.
pub fn run_pipeline(
    dataset: &Dataset,
    table: Option<(&TableSchema, &TableReaderConfig)>,
    config: &PipelineConfig,
) -> Result<PipelineOutcome> {
    if config.models.is_empty() && config.searches.is_empty() {
        anyhow::bail!("Nothing to evaluate: no models or searches configured");
    }
    dataset.log_input_data_summary();
    log::info!(
        "Null accuracy of the full dataset: {:.4}",
        crate::metrics::null_accuracy(dataset.y.iter())?
    );

    let parts = partition(
        dataset,
        config.holdout_fraction,
        config.test_fraction,
        config.seed,
        config.stratify,
    )?;
    let sizes = PartitionSizes {
        train: parts.train.n_samples(),
        test: parts.test.n_samples(),
        holdout: parts.holdout.n_samples(),
    };

    let transform = FeatureTransform::fit(&parts.train.x, config.pca_components)?;
    let x_train = transform.apply(&parts.train.x)?;
    let x_test = transform.apply(&parts.test.x)?;
    let x_holdout = transform.apply(&parts.holdout.x)?;
    let subsets = Subsets {
        train: (&x_train, &parts.train),
        test: (&x_test, &parts.test),
        holdout: (&x_holdout, &parts.holdout),
    };

    let mut trained: Vec<TrainedModel> = Vec::new();
    let mut models: Vec<ModelOutcome> = Vec::new();

    for model_config in &config.models {
        let name = model_config.model_type.name();
        log::info!("Training {}", name);
        let model = fit_model(model_config, &x_train, &parts.train.y)
            .with_context(|| format!("Failed to train {}", name))?;
        models.push(assess(name.to_string(), &model, &subsets, config)?);
        trained.push(model);
    }

    let mut searches = Vec::new();
    for search in &config.searches {
        let result = run_search(search, &x_train, &parts.train.y, config.seed)
            .with_context(|| format!("{} for {} failed", search.strategy, search.model.model_type.name()))?;
        let model = fit_model(&result.best_config, &x_train, &parts.train.y)
            .with_context(|| format!("Failed to refit tuned {}", result.algorithm))?;
        let label = format!("{} ({})", result.algorithm, result.strategy);
        models.push(assess(label, &model, &subsets, config)?);
        trained.push(model);
        searches.push(result);
    }

    let mut best_index = 0;
    for (i, m) in models.iter().enumerate() {
        if m.test.accuracy > models[best_index].test.accuracy {
            best_index = i;
        }
    }
    log::info!(
        "Best model by test accuracy: {} ({:.4})",
        models[best_index].label,
        models[best_index].test.accuracy
    );

    let best_trained = trained.swap_remove(best_index);
    let algorithm = best_trained.algorithm().to_string();
    let mut best_model = ExportedModel::new(transform, best_trained, dataset.feature_names.clone());
    best_model.test_accuracy = Some(models[best_index].test.accuracy);
    if let Some((schema, reader)) = table {
        best_model = best_model.with_table(schema.clone(), reader.clone());
    }

    let output_dir = Path::new(&config.output_dir);
    let exported = export_model(&best_model, output_dir, &algorithm)?;

    let mut outcome = PipelineOutcome {
        classification: config.classification,
        sizes,
        explained_variance_ratio: best_model.transform.explained_variance_ratio(),
        models,
        searches,
        best_index,
        best_model,
        exported,
        report: None,
    };

    if let Some(report_file) = &config.report_file {
        let path = output_dir.join(report_file);
        build_evaluation_report(&outcome, config).save_to_file(&path)?;
        outcome.report = Some(path);
    }

    Ok(outcome)
}

/// Run the pipeline on a table read from disk.
pub fn run_pipeline_on_table(loaded: &LoadedTable, config: &PipelineConfig) -> Result<PipelineOutcome> {
    run_pipeline(&loaded.dataset, Some((&loaded.schema, &config.reader)), config)
}
