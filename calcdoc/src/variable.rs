use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A `name = expression` assignment found in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    /// Raw expression text, trimmed.
    pub expression: String,
    /// User-editable base value rather than a calculation.
    pub is_input: bool,
    /// Name of the owning section.
    pub section: String,
    /// 0-based position within the owning section.
    pub order: usize,
    /// 1-based source line of the assignment.
    #[serde(default)]
    pub line: usize,
    /// Byte span of the assignment line in the source.
    #[serde(default, skip_serializing)]
    pub span: Range<usize>,
}
