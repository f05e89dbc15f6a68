//! Text rendering of dashboard state. Everything here is a pure function of
//! its inputs.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use crate::api::sample_image_url;
use crate::dashboard::{DashboardSnapshot, InsightsState};
use crate::error::DashboardError;
use crate::flow::{Flow, FlowState, Outcome};
use crate::models::{DataInsights, ImageDimensions, PredictionResult, RetrainResult};

pub const NO_DISTRIBUTION: &str = "No class distribution data available.";
pub const NO_SAMPLES: &str = "No sample images available.";
pub const NO_DIMENSIONS: &str = "No image dimension data available.";
pub const PLACEHOLDER_IMAGE: &str = "[image unavailable]";

const BAR_WIDTH: usize = 40;
const RULE: &str = "------------------------------------------------------------";

/// Where a sample image is displayed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(String),
    Placeholder,
}

impl ImageSource {
    pub fn display(&self) -> &str {
        match self {
            ImageSource::Remote(url) => url,
            ImageSource::Placeholder => PLACEHOLDER_IMAGE,
        }
    }
}

/// (label, count) pairs for the distribution chart, ordered by label.
pub fn chart_series(distribution: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut series: Vec<(String, u64)> = distribution
        .iter()
        .map(|(label, count)| (label.clone(), *count))
        .collect();
    series.sort_by(|a, b| a.0.cmp(&b.0));
    series
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

pub fn format_new_classes(classes: &[String]) -> String {
    classes.join(", ")
}

pub fn format_raw_output(raw: &serde_json::Value) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| raw.to_string())
}

/// Horizontal bar chart, or the no-data placeholder for an empty series.
pub fn render_bar_chart(series: &[(String, u64)]) -> String {
    if series.is_empty() {
        return NO_DISTRIBUTION.to_string();
    }
    let label_width = series.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let max = series.iter().map(|(_, count)| *count).max().unwrap_or(0);

    let mut out = String::new();
    for (label, count) in series {
        let filled = if max == 0 {
            0
        } else {
            ((*count as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
        };
        let _ = writeln!(
            out,
            "{:<width$} | {} {}",
            label,
            "█".repeat(filled),
            count,
            width = label_width
        );
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn render_prediction(result: &PredictionResult) -> String {
    format!(
        "Prediction Result:\n  Predicted Class: {}\n  Confidence: {}\n  Raw Output: {}",
        result.predicted_class,
        format_confidence(result.confidence),
        format_raw_output(&result.raw_predictions)
    )
}

pub fn render_retrain(result: &RetrainResult) -> String {
    let mut out = format!("Retraining Status:\n  {}", result.message);
    if let Some(classes) = &result.new_classes {
        let _ = write!(out, "\n  Detected classes: {}", format_new_classes(classes));
    }
    out
}

fn render_flow<T>(
    flow: Flow,
    title: &str,
    state: &FlowState<T>,
    render_result: impl Fn(&T) -> String,
) -> String {
    let mut out = format!("{}\n{}\n", title, RULE);
    match &state.selected {
        Some(file) => {
            let _ = writeln!(out, "Selected file: {}", file.name());
        }
        None => {
            let _ = writeln!(out, "No file selected (accepts {}).", flow.accept());
        }
    }
    match &state.outcome {
        Outcome::Idle => {}
        Outcome::InFlight => {
            let _ = writeln!(out, "{}", flow.in_flight_label());
        }
        Outcome::Succeeded(value) => {
            let _ = writeln!(out, "{}", render_result(value));
        }
        Outcome::Failed(message) => {
            let _ = writeln!(out, "Error: {}", message);
        }
    }
    out
}

pub fn render_dimensions(dimensions: Option<&ImageDimensions>) -> String {
    match dimensions {
        Some(d) if d.total_images > 0 => format!(
            "Total images: {}\n  Width:  min {} / max {} / avg {:.2} px\n  Height: min {} / max {} / avg {:.2} px",
            d.total_images, d.min_width, d.max_width, d.avg_width, d.min_height, d.max_height, d.avg_height
        ),
        _ => NO_DIMENSIONS.to_string(),
    }
}

/// Lists sample image URLs per class without checking that they load.
pub fn render_sample_urls(base_url: &str, insights: &DataInsights) -> String {
    let resolved: Vec<(String, Vec<ImageSource>)> = sorted_samples(&insights.sample_images)
        .into_iter()
        .map(|(label, paths)| {
            let sources = paths
                .iter()
                .map(|path| ImageSource::Remote(sample_image_url(base_url, path)))
                .collect();
            (label, sources)
        })
        .collect();
    render_sample_images(&resolved)
}

pub fn render_sample_images(samples: &[(String, Vec<ImageSource>)]) -> String {
    if samples.iter().all(|(_, sources)| sources.is_empty()) {
        return NO_SAMPLES.to_string();
    }
    let mut out = String::new();
    for (label, sources) in samples {
        if sources.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", label);
        for source in sources {
            let _ = writeln!(out, "  {}", source.display());
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn sorted_samples(samples: &HashMap<String, Vec<String>>) -> Vec<(String, Vec<String>)> {
    let mut sorted: Vec<_> = samples.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

/// Renders the insights section. `samples` overrides the unchecked URL list
/// when sample images have already been resolved.
pub fn render_insights(
    base_url: &str,
    insights: &InsightsState,
    samples: Option<&[(String, Vec<ImageSource>)]>,
) -> String {
    let mut out = format!("Data Insights\n{}\n", RULE);
    if insights.loading {
        let _ = writeln!(out, "Loading insights...");
    }
    if let Some(error) = &insights.error {
        let _ = writeln!(out, "Error: {}", error);
    }
    let Some(data) = &insights.data else {
        if !insights.loading && insights.error.is_none() {
            let _ = writeln!(out, "Insights not loaded.");
        }
        return out;
    };

    let _ = writeln!(out, "Class Distribution:");
    let _ = writeln!(out, "{}", render_bar_chart(&chart_series(&data.class_distribution)));
    let _ = writeln!(out, "\nSample Images:");
    let sample_text = match samples {
        Some(resolved) => render_sample_images(resolved),
        None => render_sample_urls(base_url, data),
    };
    let _ = writeln!(out, "{}", sample_text);
    let _ = writeln!(out, "\nImage Dimensions:");
    let _ = writeln!(out, "  {}", render_dimensions(data.image_dimensions.as_ref()));
    out
}

pub fn render_dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    out.push_str("ML Pipeline Dashboard\n\n");
    out.push_str(&render_flow(Flow::Predict, "Model Prediction", &snapshot.prediction, render_prediction));
    out.push('\n');
    out.push_str(&render_flow(Flow::Retrain, "Model Retraining", &snapshot.retrain, render_retrain));
    out.push('\n');
    out.push_str(&render_insights(&snapshot.base_url, &snapshot.insights, None));
    out.push('\n');
    out.push_str(&render_monitoring(snapshot.last_retrained));
    out
}

pub fn render_monitoring(last_retrained: Option<Duration>) -> String {
    let last = match last_retrained {
        Some(age) => format_age(age),
        None => "N/A".to_string(),
    };
    format!("Model Monitoring\n{}\nLast Retrained: {}\n", RULE, last)
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m {}s ago", secs / 60, secs % 60),
        _ => format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60),
    }
}

/// One-line service status for the monitoring panel.
pub fn render_status(base_url: &str, status: &Result<String, DashboardError>) -> String {
    match status {
        Ok(banner) if banner.is_empty() => format!("API Status: Online ({})", base_url),
        Ok(banner) => format!("API Status: Online ({}): {}", base_url, banner),
        Err(e) => format!("API Status: Offline ({}): {}", base_url, e),
    }
}
