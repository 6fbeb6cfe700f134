pub mod evaluate;
pub mod predict;

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, ValueHint};

/// Command line definition shared by the binary and its tests.
pub fn build_cli() -> Command {
    Command::new("churn")
        .version(clap::crate_version!())
        .about("Customer churn model evaluation and selection")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("evaluate")
                .about("Partition, train, tune, evaluate and export churn classifiers")
                .arg(
                    Arg::new("config")
                        .help("Path to the pipeline JSON configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the churn table (*.csv or *.tsv). \
                             Overrides the data file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_type")
                        .short('m')
                        .long("model-type")
                        .help("Evaluate only this algorithm instead of the configured models.")
                        .value_parser([
                            "knn",
                            "decision_tree",
                            "random_forest",
                            "gradient_boosting",
                            "logistic_regression",
                        ])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("classification")
                        .short('c')
                        .long("classification")
                        .help("Averaging for precision, recall and F1: 'Binary' or 'Multiple'.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .help("Directory for the exported model and report.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Score a churn table with an exported model")
                .arg(
                    Arg::new("model")
                        .help("Path to an exported Customer_Churn_<Algorithm>.json model")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data")
                        .help("Path to the table to score (*.csv or *.tsv)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write predictions. Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}
