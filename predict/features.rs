//! # Clinical Observations and Feature Order
//!
//! This module is the exclusive entry point for the 12 clinical values that make
//! up one prediction request. It owns two contracts:
//!
//! - Input bounds: age is a whole number in [1, 120], sex is 0 or 1, and every
//!   laboratory value is finite and non-negative. Violations surface as
//!   `InputError` before any artifact is touched.
//! - Feature order: `Field::ALL` is the canonical column order the scaler and
//!   classifier were fitted on. A `FeatureVector` is only ever produced from it,
//!   so the positional layout never has to be spelled out anywhere else.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of features in the canonical vector.
pub const NUM_FEATURES: usize = 12;

pub const AGE_MIN: u32 = 1;
pub const AGE_MAX: u32 = 120;

/// One named input of the form, in canonical feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Age,
    Sex,
    Albumin,
    AlkalinePhosphatase,
    AlanineAminotransferase,
    AspartateAminotransferase,
    Bilirubin,
    Cholinesterase,
    Cholesterol,
    Creatinine,
    GammaGt,
    Protein,
}

impl Field {
    /// The order the fitted artifacts expect. Reordering this array silently
    /// corrupts every prediction.
    pub const ALL: [Field; NUM_FEATURES] = [
        Field::Age,
        Field::Sex,
        Field::Albumin,
        Field::AlkalinePhosphatase,
        Field::AlanineAminotransferase,
        Field::AspartateAminotransferase,
        Field::Bilirubin,
        Field::Cholinesterase,
        Field::Cholesterol,
        Field::Creatinine,
        Field::GammaGt,
        Field::Protein,
    ];

    /// Position of this field in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Machine-readable column name, used for batch headers and for the optional
    /// `feature_names` recorded in the scaler artifact.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::Age => "age",
            Field::Sex => "sex",
            Field::Albumin => "albumin",
            Field::AlkalinePhosphatase => "alkaline_phosphatase",
            Field::AlanineAminotransferase => "alanine_aminotransferase",
            Field::AspartateAminotransferase => "aspartate_aminotransferase",
            Field::Bilirubin => "bilirubin",
            Field::Cholinesterase => "cholinesterase",
            Field::Cholesterol => "cholesterol",
            Field::Creatinine => "creatinine",
            Field::GammaGt => "gamma_gt",
            Field::Protein => "protein",
        }
    }

    /// Human-readable label shown next to the input.
    pub fn display_name(self) -> &'static str {
        match self {
            Field::Age => "Age",
            Field::Sex => "Sex (0 = Female, 1 = Male)",
            Field::Albumin => "Albumin",
            Field::AlkalinePhosphatase => "Alkaline Phosphatase",
            Field::AlanineAminotransferase => "Alanine Aminotransferase (ALT)",
            Field::AspartateAminotransferase => "Aspartate Aminotransferase (AST)",
            Field::Bilirubin => "Bilirubin",
            Field::Cholinesterase => "Cholinesterase",
            Field::Cholesterol => "Cholesterol",
            Field::Creatinine => "Creatinine",
            Field::GammaGt => "Gamma GT",
            Field::Protein => "Protein",
        }
    }

    /// Value pre-filled in the form.
    pub fn default_value(self) -> f64 {
        match self {
            Field::Age => 30.0,
            Field::Sex => 0.0,
            Field::Albumin => 4.0,
            Field::AlkalinePhosphatase => 80.0,
            Field::AlanineAminotransferase => 25.0,
            Field::AspartateAminotransferase => 22.0,
            Field::Bilirubin => 1.0,
            Field::Cholinesterase => 6.0,
            Field::Cholesterol => 180.0,
            Field::Creatinine => 1.0,
            Field::GammaGt => 20.0,
            Field::Protein => 7.0,
        }
    }

    /// The default formatted the way a user would type it.
    pub fn default_text(self) -> String {
        match self {
            Field::Age | Field::Sex => format!("{}", self.default_value() as i64),
            _ => format!("{:?}", self.default_value()),
        }
    }

    /// Looks a field up by its column name, ignoring case and surrounding whitespace.
    pub fn from_column_name(name: &str) -> Option<Field> {
        let name = name.trim();
        Field::ALL
            .into_iter()
            .find(|field| field.column_name().eq_ignore_ascii_case(name))
    }

    /// Checks a numeric value against this field's acceptance bounds.
    pub fn validate(self, value: f64) -> Result<f64, InputError> {
        if !value.is_finite() {
            return Err(InputError::NonFinite {
                field: self.display_name(),
            });
        }
        match self {
            Field::Age => {
                if value.fract() != 0.0 || value < AGE_MIN as f64 || value > AGE_MAX as f64 {
                    return Err(InputError::AgeOutOfRange {
                        found: value,
                        min: AGE_MIN,
                        max: AGE_MAX,
                    });
                }
            }
            Field::Sex => {
                Sex::from_value(value)?;
            }
            _ => {
                if value < 0.0 {
                    return Err(InputError::Negative {
                        field: self.display_name(),
                        found: value,
                    });
                }
            }
        }
        Ok(value)
    }

    /// Parses raw text typed by a user or read from a file, then validates it.
    pub fn parse(self, raw: &str) -> Result<f64, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::Missing(self.display_name()));
        }
        let value: f64 = trimmed.parse().map_err(|_| InputError::Unparsable {
            field: self.display_name(),
            raw: trimmed.to_string(),
        })?;
        self.validate(value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Sex as the binary code the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female = 0,
    Male = 1,
}

impl Sex {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: f64) -> Result<Sex, InputError> {
        if value == 0.0 {
            Ok(Sex::Female)
        } else if value == 1.0 {
            Ok(Sex::Male)
        } else {
            Err(InputError::InvalidSex(value))
        }
    }
}

/// Failures of the input layer. Each one names the offending field so the form
/// can re-prompt for just that value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Age must be a whole number between {min} and {max}, got {found}.")]
    AgeOutOfRange { found: f64, min: u32, max: u32 },
    #[error("Sex must be 0 (female) or 1 (male), got {0}.")]
    InvalidSex(f64),
    #[error("{field} must be non-negative, got {found}.")]
    Negative { field: &'static str, found: f64 },
    #[error("{field} must be a finite number.")]
    NonFinite { field: &'static str },
    #[error("Could not read '{raw}' as a number for {field}.")]
    Unparsable { field: &'static str, raw: String },
    #[error("No value was supplied for {0}.")]
    Missing(&'static str),
}

/// One patient's validated laboratory panel.
///
/// Fields are private: the only ways to obtain one are `ObservationBuilder` and
/// `Default`, both of which enforce the input bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalObservation {
    age: u32,
    sex: Sex,
    albumin: f64,
    alkaline_phosphatase: f64,
    alanine_aminotransferase: f64,
    aspartate_aminotransferase: f64,
    bilirubin: f64,
    cholinesterase: f64,
    cholesterol: f64,
    creatinine: f64,
    gamma_gt: f64,
    protein: f64,
}

impl ClinicalObservation {
    pub fn builder() -> ObservationBuilder {
        ObservationBuilder::new()
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    /// The numeric value of any field, as it enters the feature vector.
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Age => self.age as f64,
            Field::Sex => self.sex.code() as f64,
            Field::Albumin => self.albumin,
            Field::AlkalinePhosphatase => self.alkaline_phosphatase,
            Field::AlanineAminotransferase => self.alanine_aminotransferase,
            Field::AspartateAminotransferase => self.aspartate_aminotransferase,
            Field::Bilirubin => self.bilirubin,
            Field::Cholinesterase => self.cholinesterase,
            Field::Cholesterol => self.cholesterol,
            Field::Creatinine => self.creatinine,
            Field::GammaGt => self.gamma_gt,
            Field::Protein => self.protein,
        }
    }

    /// Assembles the canonical-order vector for this observation.
    pub fn to_feature_vector(&self) -> FeatureVector {
        FeatureVector::from(self)
    }
}

impl Default for ClinicalObservation {
    /// The form's pre-filled values.
    fn default() -> Self {
        ClinicalObservation {
            age: Field::Age.default_value() as u32,
            sex: Sex::Female,
            albumin: Field::Albumin.default_value(),
            alkaline_phosphatase: Field::AlkalinePhosphatase.default_value(),
            alanine_aminotransferase: Field::AlanineAminotransferase.default_value(),
            aspartate_aminotransferase: Field::AspartateAminotransferase.default_value(),
            bilirubin: Field::Bilirubin.default_value(),
            cholinesterase: Field::Cholinesterase.default_value(),
            cholesterol: Field::Cholesterol.default_value(),
            creatinine: Field::Creatinine.default_value(),
            gamma_gt: Field::GammaGt.default_value(),
            protein: Field::Protein.default_value(),
        }
    }
}

/// Collects field values one at a time, validating each as it arrives.
#[derive(Debug, Clone, Default)]
pub struct ObservationBuilder {
    values: [Option<f64>; NUM_FEATURES],
}

impl ObservationBuilder {
    /// An empty builder; every field must be set before `build`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-filled with every field's default.
    pub fn with_defaults() -> Self {
        let mut values = [None; NUM_FEATURES];
        for field in Field::ALL {
            values[field.index()] = Some(field.default_value());
        }
        ObservationBuilder { values }
    }

    pub fn set(&mut self, field: Field, value: f64) -> Result<&mut Self, InputError> {
        self.values[field.index()] = Some(field.validate(value)?);
        Ok(self)
    }

    /// Chaining form of `set`.
    pub fn with(mut self, field: Field, value: f64) -> Result<Self, InputError> {
        self.set(field, value)?;
        Ok(self)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values[field.index()].is_some()
    }

    pub fn build(&self) -> Result<ClinicalObservation, InputError> {
        let get = |field: Field| {
            self.values[field.index()].ok_or(InputError::Missing(field.display_name()))
        };
        Ok(ClinicalObservation {
            age: get(Field::Age)? as u32,
            sex: Sex::from_value(get(Field::Sex)?)?,
            albumin: get(Field::Albumin)?,
            alkaline_phosphatase: get(Field::AlkalinePhosphatase)?,
            alanine_aminotransferase: get(Field::AlanineAminotransferase)?,
            aspartate_aminotransferase: get(Field::AspartateAminotransferase)?,
            bilirubin: get(Field::Bilirubin)?,
            cholinesterase: get(Field::Cholinesterase)?,
            cholesterol: get(Field::Cholesterol)?,
            creatinine: get(Field::Creatinine)?,
            gamma_gt: get(Field::GammaGt)?,
            protein: get(Field::Protein)?,
        })
    }
}

/// Positional feature values handed to the scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    /// Wraps raw values without checking their count. The scaler rejects a
    /// vector whose width differs from what it was fitted on.
    pub fn from_values(values: Vec<f64>) -> Self {
        FeatureVector(Array1::from_vec(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl From<&ClinicalObservation> for FeatureVector {
    fn from(observation: &ClinicalObservation) -> Self {
        FeatureVector(Array1::from_iter(
            Field::ALL.iter().map(|&field| observation.value(field)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_observation() -> ClinicalObservation {
        ObservationBuilder::new()
            .with(Field::Age, 45.0)
            .and_then(|b| b.with(Field::Sex, 1.0))
            .and_then(|b| b.with(Field::Albumin, 35.0))
            .and_then(|b| b.with(Field::AlkalinePhosphatase, 90.0))
            .and_then(|b| b.with(Field::AlanineAminotransferase, 30.0))
            .and_then(|b| b.with(Field::AspartateAminotransferase, 28.0))
            .and_then(|b| b.with(Field::Bilirubin, 1.2))
            .and_then(|b| b.with(Field::Cholinesterase, 7.0))
            .and_then(|b| b.with(Field::Cholesterol, 190.0))
            .and_then(|b| b.with(Field::Creatinine, 1.1))
            .and_then(|b| b.with(Field::GammaGt, 25.0))
            .and_then(|b| b.with(Field::Protein, 7.2))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn feature_vector_follows_canonical_order() {
        let vector = reference_observation().to_feature_vector();
        assert_eq!(vector.len(), NUM_FEATURES);
        assert_eq!(
            vector.to_vec(),
            vec![45.0, 1.0, 35.0, 90.0, 30.0, 28.0, 1.2, 7.0, 190.0, 1.1, 25.0, 7.2]
        );
    }

    #[test]
    fn field_indices_match_all_order() {
        for (position, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), position);
        }
    }

    #[test]
    fn default_observation_uses_form_defaults() {
        let vector = ClinicalObservation::default().to_feature_vector();
        assert_eq!(
            vector.to_vec(),
            vec![30.0, 0.0, 4.0, 80.0, 25.0, 22.0, 1.0, 6.0, 180.0, 1.0, 20.0, 7.0]
        );
        let built = ObservationBuilder::with_defaults().build().unwrap();
        assert_eq!(built, ClinicalObservation::default());
    }

    #[test]
    fn age_bounds_are_enforced() {
        assert!(Field::Age.validate(1.0).is_ok());
        assert!(Field::Age.validate(120.0).is_ok());
        assert!(matches!(
            Field::Age.validate(0.0),
            Err(InputError::AgeOutOfRange { .. })
        ));
        assert!(matches!(
            Field::Age.validate(121.0),
            Err(InputError::AgeOutOfRange { .. })
        ));
        assert!(matches!(
            Field::Age.validate(30.5),
            Err(InputError::AgeOutOfRange { .. })
        ));
    }

    #[test]
    fn sex_must_be_binary() {
        assert_eq!(Sex::from_value(0.0), Ok(Sex::Female));
        assert_eq!(Sex::from_value(1.0), Ok(Sex::Male));
        assert_eq!(Field::Sex.validate(2.0), Err(InputError::InvalidSex(2.0)));
    }

    #[test]
    fn lab_values_reject_negative_and_non_finite() {
        assert!(matches!(
            Field::Bilirubin.validate(-0.1),
            Err(InputError::Negative { field: "Bilirubin", .. })
        ));
        assert!(matches!(
            Field::Protein.validate(f64::NAN),
            Err(InputError::NonFinite { .. })
        ));
        assert_eq!(Field::Creatinine.validate(0.0), Ok(0.0));
    }

    #[test]
    fn parse_reports_unparsable_and_missing_text() {
        assert_eq!(Field::Albumin.parse(" 4.5 "), Ok(4.5));
        assert!(matches!(
            Field::Albumin.parse("four"),
            Err(InputError::Unparsable { .. })
        ));
        assert_eq!(
            Field::Albumin.parse("   "),
            Err(InputError::Missing("Albumin"))
        );
        assert_eq!(Field::Age.parse("45.0"), Ok(45.0));
    }

    #[test]
    fn build_requires_every_field() {
        let mut builder = ObservationBuilder::new();
        builder.set(Field::Age, 50.0).unwrap();
        assert!(builder.is_set(Field::Age));
        assert_eq!(builder.build(), Err(InputError::Missing(Field::Sex.display_name())));
    }

    #[test]
    fn column_names_round_trip_through_lookup() {
        for field in Field::ALL {
            assert_eq!(Field::from_column_name(field.column_name()), Some(field));
        }
        assert_eq!(Field::from_column_name(" Gamma_GT "), Some(Field::GammaGt));
        assert_eq!(Field::from_column_name("weight"), None);
    }

    #[test]
    fn default_text_matches_form_display() {
        assert_eq!(Field::Age.default_text(), "30");
        assert_eq!(Field::Sex.default_text(), "0");
        assert_eq!(Field::Albumin.default_text(), "4.0");
        assert_eq!(Field::Cholesterol.default_text(), "180.0");
    }
}
