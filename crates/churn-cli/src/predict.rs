//! `churn predict`: score a new table with an exported model.
use std::io;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::WriterBuilder;

use churn_classifiers::export::load_model;
use churn_classifiers::io::read_features_with_schema;
use churn_classifiers::metrics::accuracy;

/// Counts reported after scoring a table.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub n_records: usize,
    pub n_churn: usize,
    /// Present when the scored table carried labels.
    pub accuracy: Option<f64>,
}

/// Score `data_path` with the model at `model_path` and write
/// `id, probability, label` rows to `output` (stdout when `None`).
pub fn predict_table<P: AsRef<Path>, Q: AsRef<Path>>(
    model_path: P,
    data_path: Q,
    output: Option<&Path>,
) -> Result<PredictionSummary> {
    let bundle = load_model(&model_path)?;
    let (schema, reader) = bundle
        .schema
        .as_ref()
        .zip(bundle.reader.as_ref())
        .ok_or_else(|| anyhow!("Model {} carries no table schema", model_path.as_ref().display()))?;

    let table = read_features_with_schema(&data_path, reader, schema)
        .with_context(|| format!("Failed to read {}", data_path.as_ref().display()))?;
    let probabilities = bundle.predict_proba(&table.x)?;
    let threshold = bundle.model.config().threshold;
    let labels = probabilities.mapv(|p| p >= threshold);

    let sink: Box<dyn io::Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let is_tsv = output
        .and_then(|p| p.extension())
        .map(|e| e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    let mut writer = WriterBuilder::new()
        .delimiter(if is_tsv { b'\t' } else { b',' })
        .from_writer(sink);

    writer.write_record(["id", "probability", "label"])?;
    for ((id, p), label) in table.ids.iter().zip(probabilities.iter()).zip(labels.iter()) {
        writer.write_record([
            id.as_str(),
            format!("{:.6}", p).as_str(),
            if *label { "Yes" } else { "No" },
        ])?;
    }
    writer.flush().context("Failed to flush predictions")?;

    let accuracy = match &table.y {
        Some(y) => Some(accuracy(y, &labels)?),
        None => None,
    };
    let summary = PredictionSummary {
        n_records: labels.len(),
        n_churn: labels.iter().filter(|l| **l).count(),
        accuracy,
    };
    log::info!(
        "Scored {} records with {}; {} predicted to churn",
        summary.n_records,
        bundle.algorithm,
        summary.n_churn
    );
    if let Some(acc) = summary.accuracy {
        log::info!("Accuracy against the table's labels: {:.4}", acc);
    }
    Ok(summary)
}
