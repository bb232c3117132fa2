//! Dataset-derived min–max ranges shown beside the form.
//!
//! These are reference figures only. Values outside them are accepted; callers
//! may surface them as a note but never reject an observation because of them.

use crate::features::{ClinicalObservation, Field};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub field: Field,
    pub min: f64,
    pub max: f64,
}

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub static REFERENCE_RANGES: [ReferenceRange; 10] = [
    ReferenceRange {
        field: Field::Age,
        min: 19.0,
        max: 77.0,
    },
    ReferenceRange {
        field: Field::Albumin,
        min: 14.9,
        max: 82.2,
    },
    ReferenceRange {
        field: Field::AlkalinePhosphatase,
        min: 11.3,
        max: 416.6,
    },
    ReferenceRange {
        field: Field::AlanineAminotransferase,
        min: 0.9,
        max: 325.3,
    },
    ReferenceRange {
        field: Field::AspartateAminotransferase,
        min: 10.6,
        max: 324.0,
    },
    ReferenceRange {
        field: Field::Bilirubin,
        min: 0.8,
        max: 254.0,
    },
    ReferenceRange {
        field: Field::Cholinesterase,
        min: 1.42,
        max: 16.41,
    },
    ReferenceRange {
        field: Field::Cholesterol,
        min: 1.43,
        max: 9.67,
    },
    ReferenceRange {
        field: Field::Creatinine,
        min: 8.0,
        max: 1079.1,
    },
    ReferenceRange {
        field: Field::GammaGt,
        min: 4.5,
        max: 650.9,
    },
];

pub fn range_for(field: Field) -> Option<&'static ReferenceRange> {
    REFERENCE_RANGES.iter().find(|range| range.field == field)
}

/// A field of an observation lying outside its reference range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceDeviation {
    pub range: &'static ReferenceRange,
    pub value: f64,
}

/// Fields of `observation` outside their reference range, in feature order.
pub fn outside_reference(observation: &ClinicalObservation) -> Vec<ReferenceDeviation> {
    REFERENCE_RANGES
        .iter()
        .filter_map(|range| {
            let value = observation.value(range.field);
            (!range.contains(value)).then_some(ReferenceDeviation { range, value })
        })
        .collect()
}
