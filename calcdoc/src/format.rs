use std::fmt;

use serde::{Deserialize, Serialize};

/// Source flavour of a literate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Format {
    /// `#`-style headers.
    #[default]
    #[serde(rename = "markdown")]
    Markdown,
    /// `*`-style headers and `#+` directives.
    #[serde(rename = "org", alias = "outline")]
    Outline,
}

impl Format {
    /// Character repeated at the start of a header line.
    pub fn header_marker(self) -> char {
        match self {
            Format::Markdown => '#',
            Format::Outline => '*',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Outline => "org",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
