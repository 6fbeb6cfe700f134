use churn_classifiers::config::{ClassificationType, ModelConfig};
use churn_classifiers::cross_validation::{cross_validate, k_fold_indices};
use churn_classifiers::metrics::{roc_auc, ConfusionMatrix};
use churn_classifiers::search::{
    grid_search, randomized_search, run_search, ConfigSpace, ParamValue, SearchConfig, SearchStrategy,
};
use churn_classifiers::EvalError;
use ndarray::{Array1, Array2};

fn noisy_data(n: usize) -> (Array2<f64>, Array1<bool>) {
    let x = Array2::from_shape_fn((n, 2), |(r, c)| {
        let signal = if r % 3 == 0 { 1.0 } else { -1.0 };
        signal * (c as f64 + 1.0) + ((r * 13 + c * 5) % 11) as f64 * 0.3 - 1.5
    });
    let y = Array1::from_iter((0..n).map(|r| r % 3 == 0));
    (x, y)
}

fn tree_space(depths: &[i64], criteria: &[&str]) -> ConfigSpace {
    let mut space = ConfigSpace::new();
    space.insert(
        "max_depth".to_string(),
        depths.iter().map(|d| ParamValue::Int(*d)).collect(),
    );
    if !criteria.is_empty() {
        space.insert(
            "criterion".to_string(),
            criteria.iter().map(|c| ParamValue::Text(c.to_string())).collect(),
        );
    }
    space
}

fn tree() -> ModelConfig {
    ModelConfig::new("decision_tree".parse().unwrap())
}

#[test]
fn grid_search_scores_every_combination() {
    let (x, y) = noisy_data(60);
    let one = grid_search(&tree(), &tree_space(&[1, 2, 3], &[]), &x, &y, 5, 0).unwrap();
    assert_eq!(one.candidates.len(), 3);

    let two = grid_search(&tree(), &tree_space(&[1, 2, 3], &["gini", "entropy"]), &x, &y, 5, 0).unwrap();
    assert_eq!(two.candidates.len(), 6);
    for c in &two.candidates {
        assert_eq!(c.fold_scores.len(), 5);
    }
    let best = two.best_score();
    assert!(two.candidates.iter().all(|c| c.score.mean <= best));
    // ties resolve to the earliest candidate
    let first_best = two
        .candidates
        .iter()
        .position(|c| c.score.mean == best)
        .unwrap();
    assert_eq!(two.best_index, first_best);
}

#[test]
fn randomized_search_samples_without_duplicates() {
    let (x, y) = noisy_data(60);
    let space = tree_space(&[1, 2, 3, 4], &["gini", "entropy"]);

    let three = randomized_search(&tree(), &space, 3, 7, &x, &y, 4, 0).unwrap();
    assert_eq!(three.candidates.len(), 3);

    let all = randomized_search(&tree(), &space, 100, 7, &x, &y, 4, 0).unwrap();
    assert_eq!(all.candidates.len(), 8);
    for i in 0..all.candidates.len() {
        for j in (i + 1)..all.candidates.len() {
            assert_ne!(all.candidates[i].params, all.candidates[j].params);
        }
    }
}

#[test]
fn search_results_are_reproducible() {
    let (x, y) = noisy_data(60);
    let config = SearchConfig {
        strategy: SearchStrategy::Randomized { n_iter: 4, seed: 1 },
        model: tree(),
        space: tree_space(&[1, 2, 3, 4, 5], &["gini", "entropy"]),
        folds: 3,
    };
    let a = run_search(&config, &x, &y, 11).unwrap();
    let b = run_search(&config, &x, &y, 11).unwrap();
    assert_eq!(a, b);
}

#[test]
fn search_rejects_bad_inputs() {
    let (x, y) = noisy_data(20);
    assert_eq!(
        grid_search(&tree(), &ConfigSpace::new(), &x, &y, 5, 0),
        Err(EvalError::EmptySearchSpace)
    );
    assert_eq!(
        grid_search(&tree(), &tree_space(&[2], &[]), &x, &y, 1, 0),
        Err(EvalError::InvalidFoldCount { k: 1, n_samples: 20 })
    );
    assert!(matches!(
        grid_search(&tree(), &tree_space(&[2], &[]), &x, &y, 21, 0),
        Err(EvalError::InvalidFoldCount { .. })
    ));

    let mut unknown = ConfigSpace::new();
    unknown.insert("n_neighbors".to_string(), vec![ParamValue::Int(3)]);
    assert!(matches!(
        grid_search(&tree(), &unknown, &x, &y, 5, 0),
        Err(EvalError::UnknownParameter { .. })
    ));

    let mut wrong_type = ConfigSpace::new();
    wrong_type.insert("max_depth".to_string(), vec![ParamValue::Text("deep".into())]);
    assert!(matches!(
        grid_search(&tree(), &wrong_type, &x, &y, 5, 0),
        Err(EvalError::InvalidParameterValue { .. })
    ));
}

#[test]
fn ten_fold_cross_validation_runs_ten_cycles() {
    let (x, y) = noisy_data(64);
    let report = cross_validate(&tree(), &x, &y, 10, 42, ClassificationType::Binary).unwrap();
    assert_eq!(report.folds.len(), 10);
    assert_eq!(report.folds.iter().map(|f| f.n_validation).sum::<usize>(), 64);
    assert!(report.folds.iter().all(|f| f.n_validation == 6 || f.n_validation == 7));
    assert!(report.accuracy.std >= 0.0);

    let folds = k_fold_indices(64, 10, true, 42).unwrap();
    let mut covered: Vec<usize> = folds.iter().flat_map(|f| f.validation.clone()).collect();
    covered.sort_unstable();
    assert_eq!(covered, (0..64).collect::<Vec<_>>());
}

#[test]
fn cross_validation_respects_classification_type() {
    let (x, y) = noisy_data(60);
    let binary = cross_validate(&tree(), &x, &y, 5, 1, ClassificationType::Binary).unwrap();
    let multiple = cross_validate(&tree(), &x, &y, 5, 1, ClassificationType::Multiple).unwrap();
    assert_eq!(binary.accuracy, multiple.accuracy);
    assert_eq!(binary.folds.len(), multiple.folds.len());
}

#[test]
fn confusion_matrix_and_auc_properties() {
    let y_true = Array1::from_vec(vec![true, false, true, false, true, false, false]);
    let scores = Array1::from_vec(vec![0.9, 0.4, 0.35, 0.1, 0.8, 0.7, 0.2]);
    let y_pred = scores.mapv(|s| s >= 0.5);

    let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
    assert_eq!(cm.total(), y_true.len());

    let auc = roc_auc(&y_true, &scores).unwrap();
    assert!((0.0..=1.0).contains(&auc));

    let separated = Array1::from_vec(vec![0.9, 0.1, 0.8, 0.2, 0.7, 0.3, 0.25]);
    assert_eq!(roc_auc(&y_true, &separated).unwrap(), 1.0);
}
