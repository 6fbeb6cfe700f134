use itertools_num::linspace;
use ndarray::Array1;
use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

use crate::metrics::RocCurve;
use crate::search::SearchResult;

/// Scatter of the variance ratio captured by each principal component, with
/// the cumulative ratio as a line.
pub fn plot_explained_variance(ratio: &Array1<f64>, title: &str) -> Plot {
    let components: Vec<usize> = (1..=ratio.len()).collect();
    let cumulative: Vec<f64> = ratio
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(*acc)
        })
        .collect();

    let per_component = Scatter::new(components.clone(), ratio.to_vec())
        .mode(Mode::Markers)
        .name("Explained variance ratio");
    let running = Scatter::new(components, cumulative)
        .mode(Mode::LinesMarkers)
        .name("Cumulative");

    let mut plot = Plot::new();
    plot.add_trace(per_component);
    plot.add_trace(running);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Principal component"))
            .y_axis(Axis::new().title("Explained variance ratio")),
    );
    plot
}

/// Mean CV accuracy against one numeric hyperparameter of a search.
///
/// Candidates sharing a value of `param` are drawn as one line per setting
/// of the remaining hyperparameters.
pub fn plot_search_scores(result: &SearchResult, param: &str) -> Result<Plot, String> {
    let mut series: Vec<(String, Vec<f64>, Vec<f64>)> = Vec::new();
    for candidate in &result.candidates {
        let x = candidate
            .params
            .get(param)
            .ok_or_else(|| format!("Hyperparameter '{}' is not part of the search", param))?
            .as_plot_value()
            .ok_or_else(|| format!("Hyperparameter '{}' is not numeric", param))?;

        let others = candidate
            .params
            .iter()
            .filter(|(name, _)| name.as_str() != param)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        let label = if others.is_empty() {
            "mean accuracy".to_string()
        } else {
            others
        };

        match series.iter_mut().find(|(name, _, _)| *name == label) {
            Some((_, xs, ys)) => {
                xs.push(x);
                ys.push(candidate.score.mean);
            }
            None => series.push((label, vec![x], vec![candidate.score.mean])),
        }
    }

    let mut plot = Plot::new();
    for (label, xs, ys) in series {
        let mut points: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        plot.add_trace(Scatter::new(xs, ys).mode(Mode::LinesMarkers).name(&label));
    }
    plot.set_layout(
        Layout::new()
            .title(format!("{} {}: accuracy vs {}", result.algorithm, result.strategy, param).as_str())
            .x_axis(Axis::new().title(param))
            .y_axis(Axis::new().title("Mean CV accuracy")),
    );
    Ok(plot)
}

/// ROC curves of one or more models with the chance diagonal.
pub fn plot_roc(curves: &[(String, &RocCurve)], title: &str) -> Plot {
    let mut plot = Plot::new();
    for (name, curve) in curves {
        plot.add_trace(
            Scatter::new(curve.fpr.clone(), curve.tpr.clone())
                .mode(Mode::Lines)
                .name(name),
        );
    }

    let diagonal: Vec<f64> = linspace(0.0, 1.0, 11).collect();
    plot.add_trace(
        Scatter::new(diagonal.clone(), diagonal)
            .mode(Mode::Lines)
            .name("Chance")
            .line(Line::new().color("grey").dash(DashType::Dash)),
    );
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False positive rate"))
            .y_axis(Axis::new().title("True positive rate")),
    );
    plot
}
