//! Stage labels to display colors.
//!
//! The mapping is total: every prediction, including labels the model was never
//! expected to emit and undecoded raw codes, resolves to some color.

use crate::pipeline::StagePrediction;
use serde::{Serialize, Serializer};
use std::fmt;

/// An sRGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const GREEN: Color = Color::rgb(0x27, 0xae, 0x60);
pub const YELLOW: Color = Color::rgb(0xf1, 0xc4, 0x0f);
pub const ORANGE: Color = Color::rgb(0xe6, 0x7e, 0x22);
pub const DARK_ORANGE: Color = Color::rgb(0xd3, 0x54, 0x00);
pub const RED: Color = Color::rgb(0xc0, 0x39, 0x2b);
/// Used for anything outside the five known stages.
pub const NEUTRAL_BLUE: Color = Color::rgb(0x34, 0x98, 0xdb);

/// The five recognized stages of liver disease progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NoDisease,
    SuspectDisease,
    Hepatitis,
    Fibrosis,
    Cirrhosis,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::NoDisease,
        Stage::SuspectDisease,
        Stage::Hepatitis,
        Stage::Fibrosis,
        Stage::Cirrhosis,
    ];

    /// The label as the label encoder spells it.
    pub fn label(self) -> &'static str {
        match self {
            Stage::NoDisease => "no disease",
            Stage::SuspectDisease => "suspect disease",
            Stage::Hepatitis => "hepatitis",
            Stage::Fibrosis => "fibrosis",
            Stage::Cirrhosis => "cirrhosis",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::NoDisease => "No Disease",
            Stage::SuspectDisease => "Suspect Disease",
            Stage::Hepatitis => "Hepatitis",
            Stage::Fibrosis => "Fibrosis",
            Stage::Cirrhosis => "Cirrhosis",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Stage::NoDisease => GREEN,
            Stage::SuspectDisease => YELLOW,
            Stage::Hepatitis => ORANGE,
            Stage::Fibrosis => DARK_ORANGE,
            Stage::Cirrhosis => RED,
        }
    }

    /// Case-insensitive lookup. No trimming or fuzzy matching.
    pub fn from_label(label: &str) -> Option<Stage> {
        let folded = label.to_lowercase();
        Stage::ALL.into_iter().find(|stage| stage.label() == folded)
    }
}

/// What the shell displays for one prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    /// Upper-cased prediction text.
    pub label: String,
    pub color: Color,
    pub stage: Option<Stage>,
    /// Whether the label came through the encoder or is a raw identifier.
    pub decoded: bool,
}

pub fn color_for_label(label: &str) -> Color {
    Stage::from_label(label).map_or(NEUTRAL_BLUE, Stage::color)
}

pub fn present(prediction: &StagePrediction) -> Presentation {
    let text = prediction.text();
    let stage = Stage::from_label(&text);
    Presentation {
        label: text.to_uppercase(),
        color: stage.map_or(NEUTRAL_BLUE, Stage::color),
        stage,
        decoded: prediction.is_decoded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RawClass;

    #[test]
    fn each_stage_has_its_fixed_color() {
        assert_eq!(color_for_label("no disease").hex(), "#27ae60");
        assert_eq!(color_for_label("suspect disease").hex(), "#f1c40f");
        assert_eq!(color_for_label("hepatitis").hex(), "#e67e22");
        assert_eq!(color_for_label("fibrosis").hex(), "#d35400");
        assert_eq!(color_for_label("cirrhosis").hex(), "#c0392b");
    }

    #[test]
    fn lookup_ignores_case() {
        let expected = color_for_label("cirrhosis");
        assert_eq!(color_for_label("Cirrhosis"), expected);
        assert_eq!(color_for_label("CIRRHOSIS"), expected);
        assert_eq!(color_for_label("No Disease"), GREEN);
    }

    #[test]
    fn anything_else_is_neutral_blue() {
        for label in ["", "   ", "steatosis", "cirrhosis ", "3", "no_disease", "ÇIRRHOSIS"] {
            assert_eq!(color_for_label(label), NEUTRAL_BLUE, "label {label:?}");
        }
        assert_eq!(NEUTRAL_BLUE.hex(), "#3498db");
    }

    #[test]
    fn present_upper_cases_decoded_labels() {
        let shown = present(&StagePrediction::Decoded("suspect disease".to_string()));
        assert_eq!(shown.label, "SUSPECT DISEASE");
        assert_eq!(shown.color, YELLOW);
        assert_eq!(shown.stage, Some(Stage::SuspectDisease));
        assert!(shown.decoded);
    }

    #[test]
    fn raw_predictions_still_present() {
        let shown = present(&StagePrediction::Raw(RawClass::Code(4)));
        assert_eq!(shown.label, "4");
        assert_eq!(shown.color, NEUTRAL_BLUE);
        assert_eq!(shown.stage, None);
        assert!(!shown.decoded);

        let shown = present(&StagePrediction::Raw(RawClass::Label("Fibrosis".into())));
        assert_eq!(shown.label, "FIBROSIS");
        assert_eq!(shown.color, DARK_ORANGE);
    }

    #[test]
    fn color_serializes_as_hex() {
        assert_eq!(serde_json::to_string(&RED).unwrap(), "\"#c0392b\"");
    }
}
