#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use log::info;
use std::io;
use std::path::PathBuf;
use std::process;

use liverstage::artifacts::ArtifactPaths;
use liverstage::features::{ClinicalObservation, Field, ObservationBuilder};
use liverstage::pipeline::LoadedPredictor;
use liverstage::reference::outside_reference;
use liverstage::shell::batch::run_batch;
use liverstage::shell::form::run_form;
use liverstage::shell::render::{OutputFormat, render_outcome, render_overview};

#[derive(Args)]
pub struct ArtifactArgs {
    /// Directory holding best_liver_model.toml, scaler.toml and label_encoder.toml
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub artifacts: PathBuf,

    /// Override the classifier artifact path
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Override the scaler artifact path
    #[arg(long, value_name = "PATH")]
    pub scaler: Option<PathBuf>,

    /// Override the label encoder artifact path
    #[arg(long, value_name = "PATH")]
    pub encoder: Option<PathBuf>,
}

impl ArtifactArgs {
    fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.artifacts).with_overrides(
            self.scaler.clone(),
            self.model.clone(),
            self.encoder.clone(),
        )
    }

    /// Loads every artifact or fails before any input is accepted.
    fn load(&self) -> Result<LoadedPredictor, Box<dyn std::error::Error>> {
        let paths = self.paths();
        info!(
            "Loading artifacts: model={}, scaler={}, encoder={}",
            paths.classifier.display(),
            paths.scaler.display(),
            paths.encoder.display()
        );
        Ok(LoadedPredictor::load(&paths)?)
    }
}

#[derive(Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Age in years (1-120)
    #[arg(long, default_value_t = 30.0, allow_negative_numbers = true)]
    pub age: f64,

    /// Sex (0 = Female, 1 = Male)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub sex: f64,

    #[arg(long, default_value_t = 4.0, allow_negative_numbers = true)]
    pub albumin: f64,

    #[arg(long, default_value_t = 80.0, allow_negative_numbers = true)]
    pub alkaline_phosphatase: f64,

    /// Alanine aminotransferase (ALT)
    #[arg(long, alias = "alt", default_value_t = 25.0, allow_negative_numbers = true)]
    pub alanine_aminotransferase: f64,

    /// Aspartate aminotransferase (AST)
    #[arg(long, alias = "ast", default_value_t = 22.0, allow_negative_numbers = true)]
    pub aspartate_aminotransferase: f64,

    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub bilirubin: f64,

    #[arg(long, default_value_t = 6.0, allow_negative_numbers = true)]
    pub cholinesterase: f64,

    #[arg(long, default_value_t = 180.0, allow_negative_numbers = true)]
    pub cholesterol: f64,

    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub creatinine: f64,

    #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
    pub gamma_gt: f64,

    #[arg(long, default_value_t = 7.0, allow_negative_numbers = true)]
    pub protein: f64,
}

impl PredictArgs {
    fn observation(&self) -> Result<ClinicalObservation, Box<dyn std::error::Error>> {
        let values = [
            (Field::Age, self.age),
            (Field::Sex, self.sex),
            (Field::Albumin, self.albumin),
            (Field::AlkalinePhosphatase, self.alkaline_phosphatase),
            (Field::AlanineAminotransferase, self.alanine_aminotransferase),
            (Field::AspartateAminotransferase, self.aspartate_aminotransferase),
            (Field::Bilirubin, self.bilirubin),
            (Field::Cholinesterase, self.cholinesterase),
            (Field::Cholesterol, self.cholesterol),
            (Field::Creatinine, self.creatinine),
            (Field::GammaGt, self.gamma_gt),
            (Field::Protein, self.protein),
        ];
        let mut builder = ObservationBuilder::new();
        for (field, value) in values {
            builder.set(field, value)?;
        }
        Ok(builder.build()?)
    }
}

#[derive(Args)]
pub struct FormArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Ansi)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Delimited file whose header names the 12 input columns
    pub input: PathBuf,

    /// Where to write one result per input row
    #[arg(long, default_value = "predictions.tsv")]
    pub output: PathBuf,

    /// Field delimiter for both input and output
    #[arg(long, default_value_t = '\t')]
    pub delimiter: char,
}

#[derive(Parser)]
#[command(
    name = "liverstage",
    about = "Liver disease stage prediction from clinical laboratory values",
    long_about = "Predicts one of five liver disease stages (no disease, suspect disease, hepatitis, \
                 fibrosis, cirrhosis) by running 12 laboratory values through a pre-fitted scaler, \
                 classifier and label encoder."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the stage for one patient given as flags
    #[command(about = "Predict one patient's stage from flags")]
    Predict(PredictArgs),

    /// Fill in the form interactively, predicting after each completed form
    #[command(about = "Interactive form (reads stdin until end of input)")]
    Form(FormArgs),

    /// Predict every row of a delimited file
    #[command(about = "Predict a file of patients (outputs: predictions.tsv)")]
    Batch(BatchArgs),

    /// Show the stage list and dataset reference ranges
    #[command(about = "Show stages and reference ranges")]
    Ranges,

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Predict(args)) => predict(args),
        Some(Commands::Form(args)) => form(args),
        Some(Commands::Batch(args)) => batch(args),
        Some(Commands::Ranges) => {
            println!("{}", render_overview());
            Ok(())
        }
        Some(Commands::Version) => {
            println!("liverstage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let predictor = args.artifacts.load()?;
    let observation = args.observation()?;
    for deviation in outside_reference(&observation) {
        info!(
            "{} = {} is outside the dataset reference range {} – {}",
            deviation.range.field, deviation.value, deviation.range.min, deviation.range.max
        );
    }

    let outcome = predictor.predict_observation(&observation);
    println!("{}", render_outcome(&outcome, args.format));
    outcome?;
    Ok(())
}

fn form(args: FormArgs) -> Result<(), Box<dyn std::error::Error>> {
    let predictor = args.artifacts.load()?;
    let stdin = io::stdin();
    let summary = run_form(&predictor, stdin.lock(), io::stdout().lock(), args.format)?;
    info!(
        "Session ended: {} predictions, {} failed",
        summary.completed, summary.failed
    );
    Ok(())
}

fn batch(args: BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.delimiter.is_ascii() {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--delimiter must be a single ASCII character",
        )));
    }
    let predictor = args.artifacts.load()?;
    let summary = run_batch(&predictor, &args.input, &args.output, args.delimiter as u8)?;
    println!(
        "Predicted {} rows ({} failed). Results written to {}",
        summary.rows,
        summary.failed,
        args.output.display()
    );
    Ok(())
}
