use crate::classifier::RawClass;
use crate::pipeline::LabelDecode;
use serde::{Deserialize, Serialize};

/// Bidirectional mapping between integer class codes and stage names.
/// Code `i` corresponds to `classes[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        LabelEncoder { classes }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("'classes' is empty".to_string());
        }
        for (i, class) in self.classes.iter().enumerate() {
            if self.classes[..i].contains(class) {
                return Err(format!("class '{class}' is listed twice"));
            }
        }
        Ok(())
    }

    /// Code for a stage name, if the encoder knows it.
    pub fn transform(&self, label: &str) -> Option<i64> {
        self.classes
            .iter()
            .position(|class| class == label)
            .map(|i| i as i64)
    }

    /// Stage name for a raw class. Only integer codes inside the class list
    /// decode; a string label or an unknown code yields `None`.
    pub fn inverse_transform(&self, raw: &RawClass) -> Option<&str> {
        match raw {
            RawClass::Code(code) => usize::try_from(*code)
                .ok()
                .and_then(|i| self.classes.get(i))
                .map(String::as_str),
            RawClass::Label(_) => None,
        }
    }
}

impl LabelDecode for LabelEncoder {
    fn decode(&self, raw: &RawClass) -> Option<String> {
        self.inverse_transform(raw).map(str::to_string)
    }
}
