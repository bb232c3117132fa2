use crate::pipeline::FeatureTransform;
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pre-fitted per-feature normalization, as saved by the training process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard {
        /// Column names in the order the scaler was fitted on, when the
        /// training process recorded them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
        mean: Array1<f64>,
        scale: Array1<f64>,
    },
    /// `(x - data_min) / data_range`, stretched onto `feature_range`.
    MinMax {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
        data_min: Array1<f64>,
        data_range: Array1<f64>,
    },
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScalingError {
    #[error("Feature vector has {found} values, but the scaler was fitted on {expected}.")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("Feature at position {index} is not a finite number after scaling.")]
    NonFinite { index: usize },
    #[error("Scaler parameters are inconsistent: {0}")]
    Parameters(String),
}

impl Scaler {
    pub fn feature_names(&self) -> Option<&[String]> {
        match self {
            Scaler::Standard { feature_names, .. } | Scaler::MinMax { feature_names, .. } => {
                feature_names.as_deref()
            }
        }
    }

    /// Structural checks run once at load time. Returns a description of the
    /// first inconsistency found.
    pub fn validate(&self) -> Result<(), String> {
        let (name_a, a, name_b, b) = match self {
            Scaler::Standard { mean, scale, .. } => ("mean", mean, "scale", scale),
            Scaler::MinMax {
                data_min,
                data_range,
                feature_range,
                ..
            } => {
                if !(feature_range.0 < feature_range.1) {
                    return Err(format!(
                        "feature_range ({}, {}) must be increasing",
                        feature_range.0, feature_range.1
                    ));
                }
                ("data_min", data_min, "data_range", data_range)
            }
        };
        if a.is_empty() {
            return Err(format!("'{name_a}' is empty"));
        }
        if a.len() != b.len() {
            return Err(format!(
                "'{name_a}' has {} entries but '{name_b}' has {}",
                a.len(),
                b.len()
            ));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err("contains non-finite parameters".to_string());
        }
        if b.iter().any(|&v| v == 0.0) {
            return Err(format!("'{name_b}' contains a zero divisor"));
        }
        if let Some(names) = self.feature_names() {
            if names.len() != a.len() {
                return Err(format!(
                    "lists {} feature names for {} features",
                    names.len(),
                    a.len()
                ));
            }
        }
        Ok(())
    }
}

impl FeatureTransform for Scaler {
    fn n_features(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { data_min, .. } => data_min.len(),
        }
    }

    fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ScalingError> {
        let expected = self.n_features();
        if features.len() != expected {
            return Err(ScalingError::ShapeMismatch {
                expected,
                found: features.len(),
            });
        }
        let divisors = match self {
            Scaler::Standard { scale, .. } => scale.len(),
            Scaler::MinMax { data_range, .. } => data_range.len(),
        };
        if divisors != expected {
            return Err(ScalingError::Parameters(format!(
                "{expected} offsets but {divisors} divisors"
            )));
        }

        let scaled = match self {
            Scaler::Standard { mean, scale, .. } => {
                Zip::from(&features)
                    .and(mean)
                    .and(scale)
                    .map_collect(|&x, &m, &s| (x - m) / s)
            }
            Scaler::MinMax {
                feature_range: (lo, hi),
                data_min,
                data_range,
                ..
            } => Zip::from(&features)
                .and(data_min)
                .and(data_range)
                .map_collect(|&x, &min, &range| (x - min) / range * (hi - lo) + lo),
        };

        if let Some(index) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ScalingError::NonFinite { index });
        }
        Ok(scaled)
    }
}
