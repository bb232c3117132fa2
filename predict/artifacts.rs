//! # Artifact Loading
//!
//! The scaler, classifier and label encoder are produced by an external training
//! process and saved as TOML. They are read once at startup and never mutated.
//! Loading is all-or-nothing: a missing file, a parse failure, or an artifact
//! whose shape disagrees with the canonical feature order is reported as an
//! `ArtifactLoadError`, and no predictor is constructed.

use crate::classifier::Classifier;
use crate::encoder::LabelEncoder;
use crate::features::{Field, NUM_FEATURES};
use crate::pipeline::FeatureTransform;
use crate::scaler::Scaler;
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CLASSIFIER_FILE: &str = "best_liver_model.toml";
pub const DEFAULT_SCALER_FILE: &str = "scaler.toml";
pub const DEFAULT_ENCODER_FILE: &str = "label_encoder.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Scaler,
    Classifier,
    LabelEncoder,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Classifier => "classifier",
            ArtifactKind::LabelEncoder => "label encoder",
        })
    }
}

#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("Failed to read or write the {kind} artifact at '{}': {source}", .path.display())]
    Io {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse the {kind} artifact at '{}': {source}", .path.display())]
    Parse {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize the {kind} artifact to TOML: {source}")]
    Serialize {
        kind: ArtifactKind,
        #[source]
        source: toml::ser::Error,
    },
    #[error("The {kind} artifact at '{}' is malformed: {reason}", .path.display())]
    Invalid {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
    #[error(
        "The scaler was fitted on columns [{}] but predictions are assembled as [{}]. Refusing to load mismatched artifacts.",
        .found.join(", "),
        .expected.join(", ")
    )]
    FeatureOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("The {kind} artifact expects {found} features, but predictions supply {expected}.")]
    WidthMismatch {
        kind: ArtifactKind,
        expected: usize,
        found: usize,
    },
}

/// Where the three artifact files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub classifier: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    /// The default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        ArtifactPaths {
            scaler: dir.join(DEFAULT_SCALER_FILE),
            classifier: dir.join(DEFAULT_CLASSIFIER_FILE),
            encoder: dir.join(DEFAULT_ENCODER_FILE),
        }
    }

    /// Replaces any path for which an override is given.
    pub fn with_overrides(
        mut self,
        scaler: Option<PathBuf>,
        classifier: Option<PathBuf>,
        encoder: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = scaler {
            self.scaler = path;
        }
        if let Some(path) = classifier {
            self.classifier = path;
        }
        if let Some(path) = encoder {
            self.encoder = path;
        }
        self
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        ArtifactPaths::in_dir(".")
    }
}

/// The three fitted artifacts, loaded and cross-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub scaler: Scaler,
    pub classifier: Classifier,
    pub encoder: LabelEncoder,
}

impl Artifacts {
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactLoadError> {
        let scaler: Scaler = read_toml(ArtifactKind::Scaler, &paths.scaler)?;
        scaler
            .validate()
            .map_err(|reason| invalid(ArtifactKind::Scaler, &paths.scaler, reason))?;

        let classifier: Classifier = read_toml(ArtifactKind::Classifier, &paths.classifier)?;
        classifier
            .validate()
            .map_err(|reason| invalid(ArtifactKind::Classifier, &paths.classifier, reason))?;

        let encoder: LabelEncoder = read_toml(ArtifactKind::LabelEncoder, &paths.encoder)?;
        encoder
            .validate()
            .map_err(|reason| invalid(ArtifactKind::LabelEncoder, &paths.encoder, reason))?;

        let artifacts = Artifacts {
            scaler,
            classifier,
            encoder,
        };
        artifacts.check_feature_contract()?;

        info!(
            "Loaded artifacts: {} features, {} classes, {} encoded labels",
            artifacts.scaler.n_features(),
            artifacts.classifier.classes().len(),
            artifacts.encoder.classes.len()
        );
        Ok(artifacts)
    }

    /// Writes all three artifacts as pretty TOML.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactLoadError> {
        write_toml(ArtifactKind::Scaler, &paths.scaler, &self.scaler)?;
        write_toml(ArtifactKind::Classifier, &paths.classifier, &self.classifier)?;
        write_toml(ArtifactKind::LabelEncoder, &paths.encoder, &self.encoder)?;
        Ok(())
    }

    /// The positional contract between the feature builder and the fitted
    /// artifacts: both must be exactly as wide as `Field::ALL`, and if the scaler
    /// recorded its column names they must appear in the same order.
    fn check_feature_contract(&self) -> Result<(), ArtifactLoadError> {
        let scaler_width = self.scaler.n_features();
        if scaler_width != NUM_FEATURES {
            return Err(ArtifactLoadError::WidthMismatch {
                kind: ArtifactKind::Scaler,
                expected: NUM_FEATURES,
                found: scaler_width,
            });
        }
        let classifier_width = self.classifier.n_features();
        if classifier_width != NUM_FEATURES {
            return Err(ArtifactLoadError::WidthMismatch {
                kind: ArtifactKind::Classifier,
                expected: NUM_FEATURES,
                found: classifier_width,
            });
        }
        if let Some(names) = self.scaler.feature_names() {
            let matches = names
                .iter()
                .zip(Field::ALL)
                .all(|(name, field)| name.trim().eq_ignore_ascii_case(field.column_name()));
            if !matches {
                return Err(ArtifactLoadError::FeatureOrder {
                    expected: Field::ALL
                        .iter()
                        .map(|f| f.column_name().to_string())
                        .collect(),
                    found: names.to_vec(),
                });
            }
        }
        Ok(())
    }
}

fn invalid(kind: ArtifactKind, path: &Path, reason: String) -> ArtifactLoadError {
    ArtifactLoadError::Invalid {
        kind,
        path: path.to_path_buf(),
        reason,
    }
}

fn read_toml<T: DeserializeOwned>(kind: ArtifactKind, path: &Path) -> Result<T, ArtifactLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ArtifactLoadError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ArtifactLoadError::Parse {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

fn write_toml<T: Serialize>(kind: ArtifactKind, path: &Path, value: &T) -> Result<(), ArtifactLoadError> {
    let text = toml::to_string_pretty(value)
        .map_err(|source| ArtifactLoadError::Serialize { kind, source })?;
    let io_err = |source| ArtifactLoadError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    };
    let mut file = BufWriter::new(fs::File::create(path).map_err(io_err)?);
    file.write_all(text.as_bytes()).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LogisticRegression, RawClass};
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    fn artifacts(width: usize, names: Option<Vec<String>>) -> Artifacts {
        Artifacts {
            scaler: Scaler::Standard {
                feature_names: names,
                mean: Array1::zeros(width),
                scale: Array1::ones(width),
            },
            classifier: Classifier::LogisticRegression(LogisticRegression {
                classes: vec![RawClass::Code(0), RawClass::Code(1)],
                coefficients: Array2::from_elem((2, width), 0.5),
                intercepts: Array1::from(vec![0.0, 1.0]),
            }),
            encoder: LabelEncoder::new(vec!["no disease".into(), "cirrhosis".into()]),
        }
    }

    fn canonical_names() -> Vec<String> {
        Field::ALL.iter().map(|f| f.column_name().to_string()).collect()
    }

    #[test]
    fn saved_artifacts_load_back_identically() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let original = artifacts(NUM_FEATURES, Some(canonical_names()));
        original.save(&paths).unwrap();
        let loaded = Artifacts::load(&paths).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_file_names_the_artifact() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        artifacts(NUM_FEATURES, None).save(&paths).unwrap();
        std::fs::remove_file(&paths.encoder).unwrap();
        match Artifacts::load(&paths) {
            Err(ArtifactLoadError::Io { kind, path, .. }) => {
                assert_eq!(kind, ArtifactKind::LabelEncoder);
                assert_eq!(path, paths.encoder);
            }
            other => panic!("Expected Io error for the encoder, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        artifacts(NUM_FEATURES, None).save(&paths).unwrap();
        std::fs::write(&paths.classifier, "kind = \"gradient_boosting\"\n").unwrap();
        assert!(matches!(
            Artifacts::load(&paths),
            Err(ArtifactLoadError::Parse {
                kind: ArtifactKind::Classifier,
                ..
            })
        ));
    }

    #[test]
    fn narrow_artifacts_are_rejected_at_load() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        artifacts(NUM_FEATURES - 1, None).save(&paths).unwrap();
        assert!(matches!(
            Artifacts::load(&paths),
            Err(ArtifactLoadError::WidthMismatch {
                kind: ArtifactKind::Scaler,
                expected: NUM_FEATURES,
                found: 11,
            })
        ));
    }

    #[test]
    fn reordered_feature_names_are_rejected() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let mut names = canonical_names();
        names.swap(4, 5);
        artifacts(NUM_FEATURES, Some(names)).save(&paths).unwrap();
        let err = Artifacts::load(&paths).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::FeatureOrder { .. }));
        assert!(err.to_string().contains("aspartate_aminotransferase, alanine_aminotransferase"));
    }

    #[test]
    fn malformed_scaler_is_invalid() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let mut bad = artifacts(NUM_FEATURES, None);
        bad.scaler = Scaler::Standard {
            feature_names: None,
            mean: Array1::zeros(NUM_FEATURES),
            scale: Array1::zeros(NUM_FEATURES),
        };
        bad.save(&paths).unwrap();
        assert!(matches!(
            Artifacts::load(&paths),
            Err(ArtifactLoadError::Invalid {
                kind: ArtifactKind::Scaler,
                ..
            })
        ));
    }

    #[test]
    fn overrides_replace_individual_paths() {
        let paths = ArtifactPaths::in_dir("models").with_overrides(
            None,
            Some(PathBuf::from("other/forest.toml")),
            None,
        );
        assert_eq!(paths.scaler, Path::new("models").join(DEFAULT_SCALER_FILE));
        assert_eq!(paths.classifier, PathBuf::from("other/forest.toml"));
        assert_eq!(paths.encoder, Path::new("models").join(DEFAULT_ENCODER_FILE));
    }
}
