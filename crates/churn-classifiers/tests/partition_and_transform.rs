use std::collections::HashSet;

use churn_classifiers::data_handling::{partition, split, Dataset};
use churn_classifiers::metrics::null_accuracy;
use churn_classifiers::preprocessing::FeatureTransform;
use churn_classifiers::EvalError;
use ndarray::{Array1, Array2, Axis};

fn dataset(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 3), |(r, c)| (r as f64) * (c as f64 + 1.0) + (r % 7) as f64);
    let y = Array1::from_iter((0..n).map(|r| r % 4 == 0));
    let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    Dataset::new(x, y, names).unwrap()
}

#[test]
fn split_is_reproducible_and_disjoint() {
    let data = dataset(50);
    let (rest_a, carved_a) = split(&data, 0.3, 9, false).unwrap();
    let (rest_b, carved_b) = split(&data, 0.3, 9, false).unwrap();
    assert_eq!(carved_a.ids, carved_b.ids);
    assert_eq!(rest_a.ids, rest_b.ids);
    assert_eq!(carved_a.n_samples(), 15);

    let carved: HashSet<_> = carved_a.ids.iter().collect();
    assert!(rest_a.ids.iter().all(|id| !carved.contains(id)));
    assert_eq!(carved.len() + rest_a.n_samples(), 50);

    let (_, other_seed) = split(&data, 0.3, 10, false).unwrap();
    assert_ne!(other_seed.ids, carved_a.ids);
}

#[test]
fn partition_of_one_hundred_records() {
    let parts = partition(&dataset(100), 0.2, 0.2, 42, false).unwrap();
    assert_eq!(parts.holdout.n_samples(), 20);
    assert_eq!(parts.train.n_samples(), 64);
    assert_eq!(parts.test.n_samples(), 16);

    let mut all: Vec<&String> = parts
        .train
        .ids
        .iter()
        .chain(&parts.test.ids)
        .chain(&parts.holdout.ids)
        .collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 100);
}

#[test]
fn stratified_partition_keeps_class_balance() {
    let parts = partition(&dataset(100), 0.2, 0.2, 3, true).unwrap();
    assert_eq!(parts.holdout.n_positive(), 5);
    assert_eq!(parts.holdout.n_samples(), 20);
}

#[test]
fn invalid_fractions_fail_fast() {
    let data = dataset(10);
    assert!(matches!(split(&data, 0.0, 1, false), Err(EvalError::InvalidFraction { .. })));
    assert!(matches!(split(&data, 1.0, 1, false), Err(EvalError::InvalidFraction { .. })));
    assert!(matches!(split(&data, 0.01, 1, false), Err(EvalError::InvalidFraction { .. })));
}

#[test]
fn null_accuracy_of_binary_labels() {
    let y = Array1::from_vec(vec![true, true, true, false]);
    assert_eq!(null_accuracy(y.iter()).unwrap(), 0.75);
}

#[test]
fn scaler_is_fit_on_reference_only() {
    let parts = partition(&dataset(100), 0.2, 0.2, 42, false).unwrap();
    let transform = FeatureTransform::fit(&parts.train.x, None).unwrap();
    let train = transform.apply(&parts.train.x).unwrap();

    for column in train.axis_iter(Axis(1)) {
        let mean = column.mean().unwrap();
        let std = column.std(0.0);
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);
    }

    // Applying to another subset leaves the fitted statistics untouched.
    let before = transform.scaler.clone();
    let test = transform.apply(&parts.test.x).unwrap();
    assert_eq!(transform.scaler, before);
    let expected = (parts.test.x[(0, 0)] - before.mean[0]) / before.std[0];
    assert!((test[(0, 0)] - expected).abs() < 1e-12);
}
