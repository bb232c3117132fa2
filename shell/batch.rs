//! # Batch Prediction
//!
//! Runs the pipeline over every row of a delimited file. The header must name
//! all 12 columns (see `Field::column_name`); extra columns are ignored and
//! column order in the file does not matter. Rows are independent: a row with
//! an out-of-bounds value or a failed prediction is reported in the output and
//! the rest of the file carries on. Rows are predicted in parallel against the
//! shared read-only predictor and written back in input order.

use crate::features::{ClinicalObservation, Field, InputError, NUM_FEATURES, ObservationBuilder};
use crate::pipeline::{Classify, FeatureTransform, LabelDecode, Predictor};
use crate::presentation::{Presentation, present};
use log::{info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Error reading or writing delimited data: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input header. Please check spelling."
    )]
    ColumnNotFound(&'static str),
}

/// Result for one input row. `row` is 1-based, counting data rows only.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub row: usize,
    pub result: Result<Presentation, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub failed: usize,
}

/// Parses every data row into an observation, keeping per-row input errors.
pub fn read_observations<R: Read>(
    reader: R,
    delimiter: u8,
) -> Result<Vec<Result<ClinicalObservation, InputError>>, BatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut columns = [0usize; NUM_FEATURES];
    for field in Field::ALL {
        columns[field.index()] = headers
            .iter()
            .position(|h| Field::from_column_name(h) == Some(field))
            .ok_or(BatchError::ColumnNotFound(field.column_name()))?;
    }

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record?;
        let parsed = Field::ALL
            .iter()
            .try_fold(ObservationBuilder::new(), |builder, &field| {
                let raw = record.get(columns[field.index()]).unwrap_or("");
                builder.with(field, field.parse(raw)?)
            })
            .and_then(|builder| builder.build());
        observations.push(parsed);
    }
    Ok(observations)
}

/// Predicts all observations in parallel, preserving input order.
pub fn predict_all<S, C, D>(
    predictor: &Predictor<S, C, D>,
    observations: &[Result<ClinicalObservation, InputError>],
) -> Vec<BatchOutcome>
where
    S: FeatureTransform + Sync,
    C: Classify + Sync,
    D: LabelDecode + Sync,
{
    observations
        .par_iter()
        .enumerate()
        .map(|(i, observation)| {
            let result = match observation {
                Ok(observation) => predictor
                    .predict_observation(observation)
                    .map(|prediction| present(&prediction))
                    .map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            BatchOutcome { row: i + 1, result }
        })
        .collect()
}

pub fn write_outcomes<W: Write>(
    writer: W,
    outcomes: &[BatchOutcome],
    delimiter: u8,
) -> Result<(), BatchError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    writer.write_record(["row", "label", "decoded", "color", "error"])?;
    for outcome in outcomes {
        let row = outcome.row.to_string();
        match &outcome.result {
            Ok(shown) => writer.write_record([
                row.as_str(),
                shown.label.as_str(),
                if shown.decoded { "true" } else { "false" },
                shown.color.hex().as_str(),
                "",
            ])?,
            Err(message) => writer.write_record([row.as_str(), "", "", "", message.as_str()])?,
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads `input`, predicts every row, and writes the results to `output`.
pub fn run_batch<S, C, D>(
    predictor: &Predictor<S, C, D>,
    input: &Path,
    output: &Path,
    delimiter: u8,
) -> Result<BatchSummary, BatchError>
where
    S: FeatureTransform + Sync,
    C: Classify + Sync,
    D: LabelDecode + Sync,
{
    info!("Reading observations from: {}", input.display());
    let observations = read_observations(File::open(input)?, delimiter)?;
    info!("Loaded {} rows for prediction", observations.len());

    let outcomes = predict_all(predictor, &observations);
    for outcome in &outcomes {
        if let Err(message) = &outcome.result {
            warn!("Row {}: {}", outcome.row, message);
        }
    }

    write_outcomes(File::create(output)?, &outcomes, delimiter)?;
    info!("Predictions saved to: {}", output.display());

    Ok(BatchSummary {
        rows: outcomes.len(),
        failed: outcomes.iter().filter(|o| o.result.is_err()).count(),
    })
}
