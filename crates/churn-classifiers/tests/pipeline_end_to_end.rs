use std::collections::BTreeMap;
use std::path::PathBuf;

use churn_classifiers::config::{ClassificationType, ModelConfig, PipelineConfig};
use churn_classifiers::export::load_model;
use churn_classifiers::search::{ParamValue, SearchConfig, SearchStrategy};
use churn_classifiers::{run_pipeline, Dataset};
use ndarray::{Array1, Array2};

fn churn_like(n: usize) -> Dataset {
    // tenure, monthly charges, contract length; short tenure and high charges churn
    let x = Array2::from_shape_fn((n, 3), |(r, c)| match c {
        0 => ((r * 37) % 72) as f64,
        1 => 20.0 + ((r * 53) % 100) as f64,
        _ => ((r * 7) % 3) as f64,
    });
    let y = Array1::from_iter(x.rows().into_iter().map(|row| row[0] < 24.0 && row[1] > 50.0));
    let names = vec!["tenure".into(), "MonthlyCharges".into(), "Contract".into()];
    Dataset::new(x, y, names).unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn one_hundred_record_scenario() {
    let _ = env_logger::builder().is_test(true).try_init();
    let out = temp_dir("churn_pipeline_e2e");

    let mut space = BTreeMap::new();
    space.insert(
        "k".to_string(),
        vec![ParamValue::Int(1), ParamValue::Int(3), ParamValue::Int(5)],
    );
    let config = PipelineConfig {
        models: vec![
            ModelConfig::new("decision_tree".parse().unwrap()),
            ModelConfig::new("logistic_regression".parse().unwrap()),
        ],
        searches: vec![SearchConfig {
            strategy: SearchStrategy::Grid,
            model: ModelConfig::new("knn".parse().unwrap()),
            space,
            folds: 5,
        }],
        output_dir: out.to_string_lossy().to_string(),
        ..PipelineConfig::default()
    };

    let outcome = run_pipeline(&churn_like(100), None, &config).unwrap();
    assert_eq!(outcome.sizes.holdout, 20);
    assert_eq!(outcome.sizes.train, 64);
    assert_eq!(outcome.sizes.test, 16);

    assert_eq!(outcome.models.len(), 3);
    for model in &outcome.models {
        assert_eq!(model.cross_validation.folds.len(), 10);
        assert_eq!(model.test.n_samples, 16);
        assert_eq!(model.holdout.n_samples, 20);
        assert_eq!(model.test.confusion.total(), 16);
    }
    assert_eq!(outcome.searches.len(), 1);
    assert_eq!(outcome.searches[0].candidates.len(), 3);

    let best = outcome.best();
    assert!(outcome.models.iter().all(|m| m.test.accuracy <= best.test.accuracy));

    let exported = outcome.exported.clone();
    let file_name = exported.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(
        file_name,
        format!("Customer_Churn_{}.json", best.config.model_type.name())
    );
    assert!(outcome.report.as_ref().unwrap().exists());

    // The exported model scores raw rows without retraining.
    let loaded = load_model(&exported).unwrap();
    let data = churn_like(100);
    let reloaded = loaded.predict(&data.x).unwrap();
    let original = outcome.best_model.predict(&data.x).unwrap();
    assert_eq!(reloaded, original);
}

#[test]
fn multiple_classification_and_pca() {
    let out = temp_dir("churn_pipeline_pca");
    let config = PipelineConfig {
        classification: ClassificationType::Multiple,
        pca_components: Some(2),
        cv_folds: 5,
        models: vec![ModelConfig::new("knn".parse().unwrap())],
        output_dir: out.to_string_lossy().to_string(),
        report_file: None,
        ..PipelineConfig::default()
    };
    let outcome = run_pipeline(&churn_like(100), None, &config).unwrap();
    assert_eq!(outcome.classification, ClassificationType::Multiple);
    assert_eq!(outcome.explained_variance_ratio.as_ref().unwrap().len(), 2);
    assert_eq!(outcome.models[0].cross_validation.folds.len(), 5);
    assert!(outcome.report.is_none());
    assert!(out.join("Customer_Churn_KNearestNeighbors.json").exists());
}

#[test]
fn empty_configuration_is_rejected() {
    let config = PipelineConfig {
        models: vec![],
        report_file: None,
        ..PipelineConfig::default()
    };
    assert!(run_pipeline(&churn_like(30), None, &config).is_err());
}
