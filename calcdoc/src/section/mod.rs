use serde::{Deserialize, Serialize};

use crate::variable::Variable;

/// A named group of variables and prose, opened by a header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Header text with markers, tags and emoji removed.
    pub name: String,
    /// 0-based first-seen order.
    pub order: usize,
    /// Header depth; 0 for the implicit section that precedes any header.
    pub level: usize,
    /// Tagged `:hidden:`. Still calculated, just not displayed.
    pub hidden: bool,
    pub variables: Vec<Variable>,
    /// Variables and prose in source order.
    pub items: Vec<SectionItem>,
}

impl Section {
    pub fn new(name: String, order: usize, level: usize, hidden: bool) -> Self {
        Section {
            name,
            order,
            level,
            hidden,
            variables: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn content_blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.items.iter().filter_map(|item| match item {
            SectionItem::Content(block) => Some(block),
            SectionItem::Variable(_) => None,
        })
    }
}

/// One entry in a section's narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SectionItem {
    Variable(Variable),
    Content(ContentBlock),
}

/// A contiguous run of prose between assignments or headers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Source text, one trimmed line per line.
    pub text: String,
    /// Rendered markup; empty until the render pass runs.
    #[serde(default)]
    pub html: String,
}

impl ContentBlock {
    pub fn new(text: String) -> Self {
        ContentBlock {
            text,
            html: String::new(),
        }
    }
}
