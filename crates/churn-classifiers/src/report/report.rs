use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Titled block of HTML content and plots.
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
    plots: Vec<Plot>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            content: Vec::new(),
            plots: Vec::new(),
        }
    }

    pub fn add_content(&mut self, markup: Markup) {
        self.content.push(markup);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        self.plots.push(plot);
    }

    fn render(&self, index: usize) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.content {
                    div class="content" { (block) }
                }
                @for (i, plot) in self.plots.iter().enumerate() {
                    @let div_id = format!("plot-{}-{}", index, i);
                    div class="plot" {
                        (PreEscaped(plot.to_inline_html(Some(div_id.as_str()))))
                    }
                }
            }
        }
    }
}

/// Self-contained HTML report; plots load plotly.js from its CDN.
pub struct Report {
    software: String,
    version: String,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software: &str, version: &str, title: &str) -> Self {
        Report {
            software: software.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em; }
                         table { border-collapse: collapse; margin: 1em 0; }
                         th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: right; }
                         pre { background-color: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; }"
                    }
                }
                body {
                    h1 { (self.title) }
                    p class="meta" { (self.software) " " (self.version) " | generated " (generated) }
                    @for (i, section) in self.sections.iter().enumerate() {
                        (section.render(i))
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
            }
        }
        fs::write(path, self.render().into_string())
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Preformatted block for the `Display` output of a metric type.
pub fn text_block(text: &str) -> Markup {
    html! { pre { (text) } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_report_contains_sections() {
        let mut report = Report::new("churn", "0.1.0", "Churn evaluation");
        let mut section = ReportSection::new("Metrics");
        section.add_content(text_block("accuracy 0.8"));
        report.add_section(section);
        let html = report.render().into_string();
        assert!(html.contains("<h2>Metrics</h2>"));
        assert!(html.contains("accuracy 0.8"));
        assert!(html.contains(PLOTLY_CDN));
    }
}
