pub mod classify;
pub mod expression;
pub mod format;
pub mod parser;
pub mod render;
pub mod section;
pub mod variable;

use serde::{Deserialize, Serialize};

use crate::format::Format;
use crate::section::Section;
use crate::variable::Variable;

/// A parsed literate calculation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Source format the document was parsed as.
    pub format: Format,
    /// Expression language tag, carried through from the parser options.
    pub language: String,
    /// Sections in first-seen order.
    pub sections: Vec<Section>,
    /// Every variable in declaration order, across all sections.
    pub variables: Vec<Variable>,
    /// Names of the variables flagged as inputs, in declaration order.
    pub input_variables: Vec<String>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.variables.is_empty()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Sections a presentation layer should display (hidden ones are still calculated).
    pub fn visible_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| !s.hidden)
    }

    pub fn calculated_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| !v.is_input)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a document previously serialised with [`Document::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
