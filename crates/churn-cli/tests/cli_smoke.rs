//! Smoke tests against the compiled `churn` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("churn").unwrap()
}

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("predict"));
}

#[test]
fn unknown_model_type_is_rejected() {
    cmd()
        .args(["evaluate", "--data", "customers.csv", "--model-type", "svm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn non_table_data_file_errors() {
    cmd()
        .args(["evaluate", "--data", "customers.xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(".tsv or .csv"));
}

#[test]
fn invalid_classification_type_errors() {
    cmd()
        .args(["evaluate", "--data", "customers.csv", "--classification", "Ternary"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ternary"));
}

#[test]
fn predict_with_missing_model_errors() {
    cmd()
        .args(["predict", "/nonexistent/Customer_Churn_X.json", "/nonexistent/data.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open model file"));
}
