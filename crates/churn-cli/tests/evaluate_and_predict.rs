use std::fmt::Write as _;
use std::path::PathBuf;

use churn_classifiers::config::ClassificationType;
use churn_cli::build_cli;
use churn_cli::evaluate::{config_from_arguments, run_evaluation, validate_tsv_or_csv_file};
use churn_cli::predict::predict_table;

fn write_churn_csv(dir: &PathBuf, n: usize) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let mut csv = String::from("customerID,gender,SeniorCitizen,Contract,tenure,MonthlyCharges,TotalCharges,Churn\n");
    let contracts = ["Month-to-month", "One year", "Two year"];
    for r in 0..n {
        let tenure = (r * 37) % 72;
        let monthly = 20.0 + ((r * 53) % 100) as f64;
        // blank TotalCharges for brand-new customers, as in the public churn data
        let total = if tenure == 0 {
            String::new()
        } else {
            format!("{:.2}", monthly * tenure as f64)
        };
        let churn = tenure < 24 && monthly > 50.0;
        writeln!(
            csv,
            "C{:04},{},{},{},{},{:.2},{},{}",
            r,
            if r % 2 == 0 { "Male" } else { "Female" },
            (r % 5 == 0) as u8,
            contracts[r % 3],
            tenure,
            monthly,
            total,
            if churn { "Yes" } else { "No" }
        )
        .unwrap();
    }
    let path = dir.join("churn.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

#[test]
fn overrides_replace_config_values() {
    let matches = build_cli()
        .try_get_matches_from([
            "churn",
            "evaluate",
            "--data",
            "customers.csv",
            "--model-type",
            "random_forest",
            "--classification",
            "multiple",
            "--output-dir",
            "out",
            "--no-report",
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let config = config_from_arguments(None, sub).unwrap();

    assert_eq!(config.data_path, "customers.csv");
    assert_eq!(config.models.len(), 1);
    assert_eq!(config.models[0].model_type.name(), "RandomForest");
    assert_eq!(config.classification, ClassificationType::Multiple);
    assert_eq!(config.output_dir, "out");
    assert!(config.report_file.is_none());
}

#[test]
fn invalid_classification_type_is_rejected_before_running() {
    let matches = build_cli()
        .try_get_matches_from(["churn", "evaluate", "-d", "customers.csv", "-c", "Ternary"])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let err = config_from_arguments(None, sub).unwrap_err();
    assert!(err.to_string().contains("Ternary"));
}

#[test]
fn data_file_extension_is_checked() {
    assert!(validate_tsv_or_csv_file("table.tsv").is_ok());
    assert!(validate_tsv_or_csv_file("table.CSV").is_ok());
    assert!(validate_tsv_or_csv_file("table.xlsx").is_err());
}

#[test]
fn evaluate_then_predict_from_csv() {
    let dir = std::env::temp_dir().join("churn_cli_roundtrip");
    let _ = std::fs::remove_dir_all(&dir);
    let data = write_churn_csv(&dir, 100);

    let matches = build_cli()
        .try_get_matches_from([
            "churn",
            "evaluate",
            "--data",
            data.to_str().unwrap(),
            "--model-type",
            "decision_tree",
            "--output-dir",
            dir.to_str().unwrap(),
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let config = config_from_arguments(None, sub).unwrap();
    let outcome = run_evaluation(&config).unwrap();

    assert_eq!(outcome.sizes.train + outcome.sizes.test + outcome.sizes.holdout, 100);
    let model_path = dir.join("Customer_Churn_DecisionTree.json");
    assert_eq!(outcome.exported, model_path);
    assert!(dir.join("churn_evaluation_report.html").exists());

    let predictions = dir.join("predictions.csv");
    let summary = predict_table(&model_path, &data, Some(predictions.as_path())).unwrap();
    assert_eq!(summary.n_records, 100);
    assert!(summary.accuracy.unwrap() > 0.5);

    let written = std::fs::read_to_string(&predictions).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 101);
    assert_eq!(lines[0], "id,probability,label");
    assert!(lines[1].starts_with("C0000,"));
}
