use crate::pipeline::{PredictionError, StagePrediction};
use crate::presentation::{Presentation, Stage, present};
use crate::reference::REFERENCE_RANGES;
use clap::ValueEnum;
use itertools::Itertools;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text with the color as a hex code
    Text,
    /// Text on a 24-bit colored terminal background
    Ansi,
    /// The colored result box as an HTML fragment
    Html,
    /// One JSON object per result
    Json,
}

/// Renders the outcome of one prediction request.
pub fn render_outcome(
    outcome: &Result<StagePrediction, PredictionError>,
    format: OutputFormat,
) -> String {
    match outcome {
        Ok(prediction) => render_presentation(&present(prediction), format),
        Err(err) => render_error(&err.to_string(), format),
    }
}

pub fn render_presentation(shown: &Presentation, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Predicted Stage: {} ({})", shown.label, shown.color),
        OutputFormat::Ansi => {
            let c = shown.color;
            format!(
                "\x1b[1;97;48;2;{};{};{}m  Predicted Stage: {}  \x1b[0m",
                c.r, c.g, c.b, shown.label
            )
        }
        OutputFormat::Html => format!(
            "<div class='prediction-box' style='background-color: {}; color: white;'>\n    Predicted Stage: <b>{}</b>\n</div>",
            shown.color,
            escape_html(&shown.label)
        ),
        OutputFormat::Json => json!(shown).to_string(),
    }
}

pub fn render_error(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text | OutputFormat::Ansi => format!("Prediction Error: {message}"),
        OutputFormat::Html => format!(
            "<div class='prediction-error'>Prediction Error: {}</div>",
            escape_html(message)
        ),
        OutputFormat::Json => json!({ "error": message }).to_string(),
    }
}

/// The stage list and reference ranges shown beside the form.
pub fn render_overview() -> String {
    let stages = Stage::ALL
        .iter()
        .map(|stage| format!("- {}", stage.title()))
        .join("\n");
    let ranges = REFERENCE_RANGES
        .iter()
        .map(|r| format!("{}: {} – {}", r.field.display_name(), r.min, r.max))
        .join("\n");
    format!(
        "Predicts 5 stages of liver disease:\n{stages}\n\nNormal Range (Min–Max) Based on Dataset\n{ranges}"
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
