//! Line classification helpers shared by the document parser.
//!
//! Everything here is a pure function of its input so the parser can be
//! exercised one rule at a time.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::format::Format;

static MARKDOWN_TOP_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^# ").unwrap());
static OUTLINE_TOP_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\* ").unwrap());
static MARKDOWN_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+").unwrap());
static OUTLINE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\*+)\s+").unwrap());
static MARKDOWN_MARKERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s*").unwrap());
static OUTLINE_MARKERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*+\s*").unwrap());
static TAG_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*(?::[A-Za-z_][A-Za-z0-9_]*)*):$").unwrap()
});
static TRAILING_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*:[A-Za-z_][A-Za-z0-9_:]*:\s*$").unwrap());
static SIMPLE_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d*\.?\d+$").unwrap());
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$").unwrap());

/// A `name = expression` line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub expression: String,
}

/// Guess the document format. The filename extension wins over content sniffing.
pub fn detect_format(content: &str, filename: Option<&str>) -> Format {
    if let Some(ext) = filename
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
    {
        match ext {
            "md" | "markdown" => return Format::Markdown,
            "org" => return Format::Outline,
            _ => {}
        }
    }

    if MARKDOWN_TOP_HEADER.is_match(content) || content.contains("\n## ") {
        return Format::Markdown;
    }
    if OUTLINE_TOP_HEADER.is_match(content) || content.contains("\n** ") {
        return Format::Outline;
    }

    Format::Markdown
}

/// Remove pictographic emoji (U+1F300-1F9FF, U+2600-26FF, U+2700-27BF).
pub fn strip_emojis(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c,
        '\u{1F300}'..='\u{1F9FF}' | '\u{2600}'..='\u{26FF}' | '\u{2700}'..='\u{27BF}'
    )
}

/// Empty, or a plain (optionally negative, optionally decimal) number literal.
pub fn is_simple_value(expression: &str) -> bool {
    let trimmed = expression.trim();
    trimmed.is_empty() || SIMPLE_VALUE.is_match(trimmed)
}

/// Trailing `:tag1:tag2:` block of a header line.
pub fn extract_tags(line: &str) -> Vec<String> {
    TAG_BLOCK
        .captures(line.trim_end())
        .map(|caps| {
            caps[1]
                .split(':')
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn is_hidden_section(line: &str) -> bool {
    extract_tags(line).iter().any(|tag| tag == "hidden")
}

pub fn extract_section_name(line: &str, format: Format) -> String {
    let markers = match format {
        Format::Markdown => &MARKDOWN_MARKERS,
        Format::Outline => &OUTLINE_MARKERS,
    };
    let name = markers.replace(line, "");
    let name = TRAILING_TAGS.replace(&name, "");
    strip_emojis(&name).trim().to_string()
}

/// Number of header markers, or 0 when the line is not a header.
pub fn extract_heading_level(line: &str, format: Format) -> usize {
    header_regex(format)
        .captures(line)
        .map(|caps| caps[1].len())
        .unwrap_or(0)
}

/// Markers must be followed by whitespace: `#Title` is not a header.
pub fn is_section_header(line: &str, format: Format) -> bool {
    header_regex(format).is_match(line)
}

fn header_regex(format: Format) -> &'static Regex {
    match format {
        Format::Markdown => &MARKDOWN_HEADER,
        Format::Outline => &OUTLINE_HEADER,
    }
}

pub fn parse_variable_assignment(line: &str) -> Option<Assignment> {
    let caps = ASSIGNMENT.captures(line)?;
    Some(Assignment {
        name: caps[1].to_string(),
        expression: caps[2].trim().to_string(),
    })
}

/// An opening or closing code fence: three or more backticks or tildes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    pub marker: char,
    pub len: usize,
}

impl Fence {
    /// Whether `line` closes a block opened by this fence.
    pub fn is_closed_by(&self, line: &str) -> bool {
        match fence_delimiter(line) {
            Some(close) => close.marker == self.marker && close.len >= self.len,
            None => false,
        }
    }
}

pub fn fence_delimiter(line: &str) -> Option<Fence> {
    let marker = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == marker).count();
    (len >= 3).then_some(Fence { marker, len })
}
