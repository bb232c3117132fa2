//! # Interactive Form
//!
//! A terminal rendition of the input form. Each of the 12 fields is prompted in
//! canonical order with its default shown in brackets; an empty line accepts the
//! default, and an invalid entry re-prompts the same field with the bound it
//! violated. A complete form triggers one prediction, whose result (or error) is
//! rendered inline before the next form starts. End of input ends the session.

use super::render::{OutputFormat, render_error, render_outcome};
use crate::features::{Field, ObservationBuilder};
use crate::pipeline::{Classify, FeatureTransform, LabelDecode, Predictor};
use crate::reference::outside_reference;
use log::info;
use std::io::{self, BufRead, Write};

/// Counts for one interactive session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormSummary {
    pub completed: usize,
    pub failed: usize,
}

pub fn run_form<S, C, D, R, W>(
    predictor: &Predictor<S, C, D>,
    mut input: R,
    mut output: W,
    format: OutputFormat,
) -> io::Result<FormSummary>
where
    S: FeatureTransform,
    C: Classify,
    D: LabelDecode,
    R: BufRead,
    W: Write,
{
    let mut summary = FormSummary::default();
    writeln!(output, "Provide the patient's test details below:")?;

    loop {
        let Some(builder) = read_form(&mut input, &mut output)? else {
            break;
        };
        let observation = match builder.build() {
            Ok(observation) => observation,
            Err(err) => {
                writeln!(output, "{}", render_error(&err.to_string(), format))?;
                summary.failed += 1;
                continue;
            }
        };
        for deviation in outside_reference(&observation) {
            info!(
                "{} = {} is outside the dataset reference range {} – {}",
                deviation.range.field, deviation.value, deviation.range.min, deviation.range.max
            );
        }

        let outcome = predictor.predict_observation(&observation);
        if outcome.is_ok() {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }
        writeln!(output, "{}", render_outcome(&outcome, format))?;
        writeln!(output)?;
    }

    writeln!(output)?;
    Ok(summary)
}

/// Prompts every field once. Returns `None` when input ends before the form is
/// complete.
fn read_form<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<ObservationBuilder>> {
    let mut builder = ObservationBuilder::new();
    let mut line = String::new();

    for field in Field::ALL {
        loop {
            write!(output, "{} [{}]: ", field.display_name(), field.default_text())?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            let entry = line.trim();
            let parsed = if entry.is_empty() {
                Ok(field.default_value())
            } else {
                field.parse(entry)
            };
            match parsed.and_then(|value| builder.set(field, value).map(|_| ())) {
                Ok(()) => break,
                Err(err) => writeln!(output, "  {err}")?,
            }
        }
    }
    Ok(Some(builder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassificationError, RawClass};
    use crate::scaler::ScalingError;
    use ndarray::{Array1, ArrayView1};
    use std::io::Cursor;

    struct Identity;

    impl FeatureTransform for Identity {
        fn n_features(&self) -> usize {
            12
        }

        fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ScalingError> {
            Ok(features.to_owned())
        }
    }

    /// Predicts cirrhosis when bilirubin is high, fails on zero albumin.
    struct BilirubinRule;

    impl Classify for BilirubinRule {
        fn predict(&self, scaled: ArrayView1<f64>) -> Result<RawClass, ClassificationError> {
            if scaled[Field::Albumin.index()] == 0.0 {
                return Err(ClassificationError::Model("albumin of zero".to_string()));
            }
            let code = if scaled[Field::Bilirubin.index()] > 50.0 { 1 } else { 0 };
            Ok(RawClass::Code(code))
        }
    }

    struct TwoStages;

    impl LabelDecode for TwoStages {
        fn decode(&self, raw: &RawClass) -> Option<String> {
            match raw {
                RawClass::Code(0) => Some("no disease".to_string()),
                RawClass::Code(1) => Some("cirrhosis".to_string()),
                _ => None,
            }
        }
    }

    fn run(script: &str) -> (FormSummary, String) {
        let predictor = Predictor::new(Identity, BilirubinRule, TwoStages);
        let mut out = Vec::new();
        let summary =
            run_form(&predictor, Cursor::new(script), &mut out, OutputFormat::Text).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn form_lines(overrides: &[(Field, &str)]) -> String {
        Field::ALL
            .iter()
            .map(|field| {
                overrides
                    .iter()
                    .find(|(f, _)| f == field)
                    .map_or("", |(_, v)| *v)
            })
            .map(|v| format!("{v}\n"))
            .collect()
    }

    #[test]
    fn empty_lines_accept_defaults() {
        let (summary, out) = run(&form_lines(&[]));
        assert_eq!(summary, FormSummary { completed: 1, failed: 0 });
        assert!(out.contains("Age [30]: "));
        assert!(out.contains("Cholesterol [180.0]: "));
        assert!(out.contains("Predicted Stage: NO DISEASE (#27ae60)"));
    }

    #[test]
    fn invalid_entry_reprompts_same_field() {
        let mut script = String::from("200\n");
        script.push_str(&form_lines(&[(Field::Bilirubin, "80")]));
        let (summary, out) = run(&script);
        assert_eq!(summary.completed, 1);
        assert!(out.contains("Age must be a whole number between 1 and 120, got 200."));
        // Rejected entry, retry, then the next form's prompt before end of input.
        assert_eq!(out.matches("Age [30]: ").count(), 3);
        assert!(out.contains("Predicted Stage: CIRRHOSIS (#c0392b)"));
    }

    #[test]
    fn failed_prediction_is_inline_and_session_continues() {
        let mut script = form_lines(&[(Field::Albumin, "0")]);
        script.push_str(&form_lines(&[]));
        let (summary, out) = run(&script);
        assert_eq!(summary, FormSummary { completed: 1, failed: 1 });
        assert!(out.contains("Prediction Error: Classification failed"));
        assert!(out.contains("Predicted Stage: NO DISEASE"));
    }

    #[test]
    fn partial_form_at_end_of_input_predicts_nothing() {
        let (summary, out) = run("45\n1\n");
        assert_eq!(summary, FormSummary::default());
        assert!(!out.contains("Predicted Stage"));
    }
}
