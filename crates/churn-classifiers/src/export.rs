//! Persist a fitted model together with the transform it expects.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::io::{TableReaderConfig, TableSchema};
use crate::models::{ClassifierModel, TrainedModel};
use crate::preprocessing::FeatureTransform;

/// Everything needed to score raw feature rows without retraining.
#[derive(Serialize, Deserialize)]
pub struct ExportedModel {
    pub algorithm: String,
    pub created: String,
    pub feature_names: Vec<String>,
    /// Layout of the source table; absent when the model was trained on an
    /// in-memory dataset.
    pub schema: Option<TableSchema>,
    pub reader: Option<TableReaderConfig>,
    pub transform: FeatureTransform,
    pub model: TrainedModel,
    pub test_accuracy: Option<f64>,
}

impl ExportedModel {
    pub fn new(transform: FeatureTransform, model: TrainedModel, feature_names: Vec<String>) -> Self {
        ExportedModel {
            algorithm: model.algorithm().to_string(),
            created: Local::now().to_rfc3339(),
            feature_names,
            schema: None,
            reader: None,
            transform,
            model,
            test_accuracy: None,
        }
    }

    pub fn with_table(mut self, schema: TableSchema, reader: TableReaderConfig) -> Self {
        self.schema = Some(schema);
        self.reader = Some(reader);
        self
    }

    /// Positive-class probability for untransformed feature rows.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let transformed = self.transform.apply(x)?;
        Ok(self.model.predict_proba(&transformed)?)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        let transformed = self.transform.apply(x)?;
        Ok(self.model.predict(&transformed)?)
    }
}

/// `Customer_Churn_<AlgorithmName>.json`
pub fn model_file_name(algorithm_name: &str) -> String {
    format!("Customer_Churn_{}.json", algorithm_name)
}

/// Write `bundle` into `dir` and return the file path.
pub fn export_model<P: AsRef<Path>>(bundle: &ExportedModel, dir: P, algorithm_name: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if algorithm_name.is_empty() || algorithm_name.contains(['/', '\\']) {
        return Err(anyhow!("Invalid algorithm name for export: '{}'", algorithm_name));
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(model_file_name(algorithm_name));
    let file = File::create(&path).with_context(|| format!("Failed to create model file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, bundle)
        .with_context(|| format!("Failed to serialize model to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write model file: {}", path.display()))?;

    log::info!("Exported {} model to {}", bundle.algorithm, path.display());
    Ok(path)
}

/// Read a bundle written by [`export_model`].
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ExportedModel> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open model file: {}", path.display()))?;
    let bundle: ExportedModel = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse model file: {}", path.display()))?;
    log::debug!("Loaded {} model created {}", bundle.algorithm, bundle.created);
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ModelType};
    use crate::models::fit_model;

    #[test]
    fn file_name_follows_algorithm() {
        assert_eq!(model_file_name("RandomForest"), "Customer_Churn_RandomForest.json");
    }

    fn overlapping_rows(n: usize) -> (Array2<f64>, Array1<bool>) {
        let x = Array2::from_shape_fn((n, 3), |(r, c)| {
            ((r * 31 + c * 17) % 23) as f64 / 7.0 + (r % 2) as f64 * 0.9 - c as f64 * 0.3
        });
        let y = Array1::from_iter((0..n).map(|r| r % 2 == 0 || r % 7 == 0));
        (x, y)
    }

    #[test]
    fn loaded_model_predicts_like_the_original() {
        let (x, y) = overlapping_rows(60);
        let dir = std::env::temp_dir().join("churn_export_roundtrip");
        for model_type in ModelType::all_defaults() {
            let transform = FeatureTransform::fit(&x, None).unwrap();
            let xt = transform.apply(&x).unwrap();
            let model = fit_model(&ModelConfig::new(model_type), &xt, &y).unwrap();
            let bundle = ExportedModel::new(transform, model, vec!["a".into(), "b".into(), "c".into()]);

            let path = export_model(&bundle, &dir, &bundle.algorithm).unwrap();
            assert!(path.ends_with(model_file_name(&bundle.algorithm)));

            let loaded = load_model(&path).unwrap();
            assert_eq!(loaded.feature_names, bundle.feature_names);
            assert_eq!(
                loaded.predict_proba(&x).unwrap(),
                bundle.predict_proba(&x).unwrap(),
                "{} changed after reload",
                bundle.algorithm
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_is_reported() {
        let dir = std::env::temp_dir().join("churn_export_full_device");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.join(model_file_name("KNearestNeighbors"))).unwrap();

        let (x, y) = overlapping_rows(12);
        let transform = FeatureTransform::fit(&x, None).unwrap();
        let xt = transform.apply(&x).unwrap();
        let model = fit_model(&ModelConfig::new("knn".parse().unwrap()), &xt, &y).unwrap();
        let bundle = ExportedModel::new(transform, model, vec!["a".into(), "b".into(), "c".into()]);

        let err = export_model(&bundle, &dir, "KNearestNeighbors").unwrap_err();
        assert!(format!("{:#}", err).contains("Customer_Churn_KNearestNeighbors.json"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_model("/nonexistent/Customer_Churn_X.json").err().unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/Customer_Churn_X.json"));
    }
}
