//! `churn evaluate`: run the evaluation pipeline from a JSON config.
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;

use churn_classifiers::config::{load_pipeline_config, ClassificationType, ModelConfig, ModelType, PipelineConfig};
use churn_classifiers::io::read_churn_table;
use churn_classifiers::pipeline::{run_pipeline_on_table, PipelineOutcome};

/// Load the config (or defaults) and apply command line overrides.
pub fn config_from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => load_pipeline_config(path)?,
        None => {
            log::info!("No config provided; using defaults");
            PipelineConfig::default()
        }
    };

    if let Some(data) = matches.get_one::<String>("data") {
        config.data_path = data.clone();
    }
    validate_tsv_or_csv_file(&config.data_path)?;

    if let Some(model_type) = matches.get_one::<String>("model_type") {
        let model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
        config.models = vec![ModelConfig::new(model_type)];
    }

    if let Some(classification) = matches.get_one::<String>("classification") {
        config.classification = ClassificationType::from_str(classification)?;
    }

    if let Some(output_dir) = matches.get_one::<String>("output_dir") {
        config.output_dir = output_dir.clone();
    }

    if matches.get_flag("no_report") {
        config.report_file = None;
    }

    Ok(config)
}

pub fn validate_tsv_or_csv_file(path: &str) -> Result<()> {
    let ext = Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => Ok(()),
        _ => anyhow::bail!("Data file must have a .tsv or .csv extension: '{}'", path),
    }
}

/// Read the configured table and run the full pipeline on it.
pub fn run_evaluation(config: &PipelineConfig) -> Result<PipelineOutcome> {
    log::info!("Reading churn table: {}", config.data_path);
    let table = read_churn_table(&config.data_path, &config.reader)
        .with_context(|| format!("Failed to load data from {}", config.data_path))?;
    run_pipeline_on_table(&table, config)
}
