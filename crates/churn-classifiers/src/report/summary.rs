use maud::html;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineOutcome;
use crate::report::plots::{plot_explained_variance, plot_roc, plot_search_scores};
use crate::report::{text_block, Report, ReportSection};

/// HTML report of a finished pipeline run.
pub fn build_evaluation_report(outcome: &PipelineOutcome, config: &PipelineConfig) -> Report {
    let mut report = Report::new(
        "churn",
        env!("CARGO_PKG_VERSION"),
        "Customer Churn Model Evaluation",
    );

    /* Overview */
    {
        let mut section = ReportSection::new("Overview");
        section.add_content(html! {
            p {
                "Records were split into " (outcome.sizes.train) " training, "
                (outcome.sizes.test) " test and " (outcome.sizes.holdout)
                " hold-out rows. Scores use " (outcome.classification) " averaging."
            }
            table {
                tr {
                    th { "model" } th { "test accuracy" } th { "null accuracy" }
                    th { "precision" } th { "recall" } th { "F1" } th { "AUC" }
                    th { "hold-out accuracy" } th { "CV accuracy" }
                }
                @for (i, m) in outcome.models.iter().enumerate() {
                    tr {
                        td { @if i == outcome.best_index { b { (m.label) } } @else { (m.label) } }
                        td { (format!("{:.4}", m.test.accuracy)) }
                        td { (format!("{:.4}", m.test.null_accuracy)) }
                        td { (format!("{:.4}", m.test.precision)) }
                        td { (format!("{:.4}", m.test.recall)) }
                        td { (format!("{:.4}", m.test.f1)) }
                        td { (m.test.auc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".to_string())) }
                        td { (format!("{:.4}", m.holdout.accuracy)) }
                        td { (m.cross_validation.accuracy.to_string()) }
                    }
                }
            }
        });

        let curves: Vec<_> = outcome
            .models
            .iter()
            .filter_map(|m| m.test.roc.as_ref().map(|roc| (m.label.clone(), roc)))
            .collect();
        if !curves.is_empty() {
            section.add_plot(plot_roc(&curves, "ROC curves on the test subset"));
        }
        report.add_section(section);
    }

    /* Per-model detail */
    for m in &outcome.models {
        let mut section = ReportSection::new(&m.label);
        section.add_content(text_block(&m.test.to_string()));
        section.add_content(text_block(&m.holdout.to_string()));
        section.add_content(text_block(&m.cross_validation.to_string()));
        report.add_section(section);
    }

    /* Searches */
    if !outcome.searches.is_empty() {
        let mut section = ReportSection::new("Hyperparameter search");
        for search in &outcome.searches {
            section.add_content(text_block(&search.to_string()));
            let names: Vec<&String> = search.best_params().keys().collect();
            for name in names {
                match plot_search_scores(search, name) {
                    Ok(plot) => section.add_plot(plot),
                    Err(reason) => log::debug!("Skipping search plot: {}", reason),
                }
            }
        }
        report.add_section(section);
    }

    if let Some(ratio) = &outcome.explained_variance_ratio {
        let mut section = ReportSection::new("Principal components");
        section.add_plot(plot_explained_variance(ratio, "Explained variance per component"));
        report.add_section(section);
    }

    /* Configuration */
    {
        let mut section = ReportSection::new("Configuration");
        let rendered = serde_json::to_string_pretty(config).unwrap_or_else(|e| e.to_string());
        section.add_content(html! {
            pre { code { (rendered) } }
        });
        report.add_section(section);
    }

    report
}
