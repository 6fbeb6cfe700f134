use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;
use std::path::PathBuf;

use churn_cli::build_cli;
use churn_cli::evaluate::{config_from_arguments, run_evaluation};
use churn_cli::predict::predict_table;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CHURN_LOG", "error,churn_classifiers=info,churn_cli=info"))
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("evaluate", sub_m)) => handle_evaluate(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    if let Some(path) = config_path {
        log::info!("[Churn::Evaluate] Using config: {:?}", path);
    }
    let config = config_from_arguments(config_path, matches)?;
    if config_path.is_none() {
        let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
        eprintln!("[Churn::Evaluate] No config provided; using:\n{}", default_json);
    }

    match run_evaluation(&config) {
        Ok(outcome) => {
            println!("{}", outcome);
            println!("Exported best model to {}", outcome.exported.display());
            if let Some(path) = &outcome.report {
                println!("Report written to {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            log::error!("Evaluation failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let model_path: &PathBuf = matches
        .get_one("model")
        .ok_or_else(|| anyhow::anyhow!("Missing model path"))?;
    let data_path: &PathBuf = matches
        .get_one("data")
        .ok_or_else(|| anyhow::anyhow!("Missing data path"))?;
    let output: Option<&PathBuf> = matches.get_one("output_file");

    let summary = predict_table(model_path, data_path, output.map(|p| p.as_path()))?;
    eprintln!(
        "[Churn::Predict] Scored {} records; {} predicted to churn.",
        summary.n_records, summary.n_churn
    );
    Ok(())
}
