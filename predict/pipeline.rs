//! # The Inference Pipeline
//!
//! One prediction is three synchronous steps over read-only artifacts:
//!
//! 1. Scale the feature vector with the fitted scaler.
//! 2. Classify the scaled vector, keeping the single raw class identifier.
//! 3. Decode the identifier with the label encoder. A failed decode is not an
//!    error: the raw identifier is kept and reported as such.
//!
//! The artifacts are held by a `Predictor`, built once at startup and borrowed
//! by every request. Each step sits behind a small trait so the pipeline can be
//! driven with stand-in artifacts.

use crate::artifacts::{ArtifactLoadError, ArtifactPaths, Artifacts};
use crate::classifier::{ClassificationError, Classifier, RawClass};
use crate::encoder::LabelEncoder;
use crate::features::{ClinicalObservation, FeatureVector};
use crate::scaler::{Scaler, ScalingError};
use log::debug;
use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Step 1: a fitted per-feature transform.
pub trait FeatureTransform {
    /// Width of the vector this transform was fitted on.
    fn n_features(&self) -> usize;
    fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ScalingError>;
}

/// Step 2: a fitted classifier producing one raw class per vector.
pub trait Classify {
    fn predict(&self, scaled: ArrayView1<f64>) -> Result<RawClass, ClassificationError>;
}

/// Step 3: inverse label mapping. `None` means the identifier is not a known code.
pub trait LabelDecode {
    fn decode(&self, raw: &RawClass) -> Option<String>;
}

/// A failure of one prediction request. The predictor stays usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Scaling failed: {0}")]
    Scaling(#[from] ScalingError),
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),
}

/// The outcome of a successful prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum StagePrediction {
    /// The label encoder mapped the class code to a stage name.
    Decoded(String),
    /// Decoding was unavailable; the classifier's identifier is kept as-is.
    Raw(RawClass),
}

impl StagePrediction {
    /// Text shown to the user, before any case normalization.
    pub fn text(&self) -> String {
        match self {
            StagePrediction::Decoded(label) => label.clone(),
            StagePrediction::Raw(raw) => raw.to_string(),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, StagePrediction::Decoded(_))
    }
}

impl fmt::Display for StagePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagePrediction::Decoded(label) => f.write_str(label),
            StagePrediction::Raw(raw) => write!(f, "{raw}"),
        }
    }
}

/// Read-only handle over the three fitted artifacts.
#[derive(Debug, Clone)]
pub struct Predictor<S = Scaler, C = Classifier, D = LabelEncoder> {
    scaler: S,
    classifier: C,
    decoder: D,
}

/// The predictor as assembled from artifact files.
pub type LoadedPredictor = Predictor<Scaler, Classifier, LabelEncoder>;

impl LoadedPredictor {
    /// Loads and cross-checks all three artifacts. Any failure is fatal: no
    /// predictor exists until every artifact is in place.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactLoadError> {
        Artifacts::load(paths).map(Predictor::from)
    }
}

impl From<Artifacts> for LoadedPredictor {
    fn from(artifacts: Artifacts) -> Self {
        Predictor::new(artifacts.scaler, artifacts.classifier, artifacts.encoder)
    }
}

impl<S, C, D> Predictor<S, C, D>
where
    S: FeatureTransform,
    C: Classify,
    D: LabelDecode,
{
    pub fn new(scaler: S, classifier: C, decoder: D) -> Self {
        Predictor {
            scaler,
            classifier,
            decoder,
        }
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Runs scale → classify → decode on one vector.
    pub fn predict(&self, features: &FeatureVector) -> Result<StagePrediction, PredictionError> {
        let scaled = self.scaler.transform(features.view())?;
        let raw = self.classifier.predict(scaled.view())?;
        match self.decoder.decode(&raw) {
            Some(label) => Ok(StagePrediction::Decoded(label)),
            None => {
                debug!("Class '{raw}' has no encoder mapping; reporting it undecoded");
                Ok(StagePrediction::Raw(raw))
            }
        }
    }

    /// Builds the canonical feature vector for an observation and predicts it.
    pub fn predict_observation(
        &self,
        observation: &ClinicalObservation,
    ) -> Result<StagePrediction, PredictionError> {
        self.predict(&observation.to_feature_vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::NUM_FEATURES;
    use std::cell::Cell;

    /// Identity scaler that also counts calls.
    struct CountingScaler {
        width: usize,
        calls: Cell<usize>,
    }

    impl FeatureTransform for CountingScaler {
        fn n_features(&self) -> usize {
            self.width
        }

        fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ScalingError> {
            self.calls.set(self.calls.get() + 1);
            if features.len() != self.width {
                return Err(ScalingError::ShapeMismatch {
                    expected: self.width,
                    found: features.len(),
                });
            }
            Ok(features.to_owned())
        }
    }

    /// Returns the code stored in the first scaled position.
    struct FirstValueClassifier;

    impl Classify for FirstValueClassifier {
        fn predict(&self, scaled: ArrayView1<f64>) -> Result<RawClass, ClassificationError> {
            match scaled.first() {
                Some(v) if *v >= 0.0 => Ok(RawClass::Code(*v as i64)),
                Some(_) => Err(ClassificationError::Model("negative code".to_string())),
                None => Err(ClassificationError::ShapeMismatch {
                    expected: 1,
                    found: 0,
                }),
            }
        }
    }

    struct FixedDecoder(Vec<&'static str>);

    impl LabelDecode for FixedDecoder {
        fn decode(&self, raw: &RawClass) -> Option<String> {
            match raw {
                RawClass::Code(code) => self.0.get(*code as usize).map(|s| s.to_string()),
                RawClass::Label(_) => None,
            }
        }
    }

    fn mock_predictor() -> Predictor<CountingScaler, FirstValueClassifier, FixedDecoder> {
        Predictor::new(
            CountingScaler {
                width: NUM_FEATURES,
                calls: Cell::new(0),
            },
            FirstValueClassifier,
            FixedDecoder(vec!["no disease", "hepatitis"]),
        )
    }

    fn vector_with_code(code: f64, width: usize) -> FeatureVector {
        let mut values = vec![0.0; width];
        values[0] = code;
        FeatureVector::from_values(values)
    }

    #[test]
    fn known_code_is_decoded() {
        let predictor = mock_predictor();
        let prediction = predictor
            .predict(&vector_with_code(1.0, NUM_FEATURES))
            .unwrap();
        assert_eq!(prediction, StagePrediction::Decoded("hepatitis".to_string()));
        assert!(prediction.is_decoded());
    }

    #[test]
    fn unknown_code_falls_back_to_raw() {
        let predictor = mock_predictor();
        let prediction = predictor
            .predict(&vector_with_code(7.0, NUM_FEATURES))
            .unwrap();
        assert_eq!(prediction, StagePrediction::Raw(RawClass::Code(7)));
        assert_eq!(prediction.text(), "7");
    }

    #[test]
    fn wrong_width_stops_at_scaling() {
        let predictor = mock_predictor();
        for width in [NUM_FEATURES - 1, NUM_FEATURES + 1] {
            let err = predictor.predict(&vector_with_code(0.0, width)).unwrap_err();
            assert_eq!(
                err,
                PredictionError::Scaling(ScalingError::ShapeMismatch {
                    expected: NUM_FEATURES,
                    found: width,
                })
            );
        }
    }

    #[test]
    fn classifier_failure_does_not_poison_later_requests() {
        let predictor = mock_predictor();
        let err = predictor
            .predict(&vector_with_code(-1.0, NUM_FEATURES))
            .unwrap_err();
        assert!(matches!(err, PredictionError::Classification(_)));
        assert!(predictor.predict(&vector_with_code(0.0, NUM_FEATURES)).is_ok());
        assert_eq!(predictor.scaler.calls.get(), 2);
    }

    #[test]
    fn repeated_predictions_are_identical() {
        let predictor = mock_predictor();
        let observation = ClinicalObservation::default();
        let first = predictor.predict_observation(&observation).unwrap();
        for _ in 0..5 {
            assert_eq!(predictor.predict_observation(&observation).unwrap(), first);
        }
    }

    #[test]
    fn prediction_serializes_with_source_tag() {
        let decoded = serde_json::to_string(&StagePrediction::Decoded("fibrosis".into())).unwrap();
        assert_eq!(decoded, r#"{"source":"decoded","value":"fibrosis"}"#);
        let raw = serde_json::to_string(&StagePrediction::Raw(RawClass::Code(9))).unwrap();
        assert_eq!(raw, r#"{"source":"raw","value":9}"#);
    }
}
