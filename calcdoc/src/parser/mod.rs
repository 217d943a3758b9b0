pub mod error;
pub mod expression;
mod structural;

pub use error::ParseError;
pub use expression::{ExpressionError, parse_expression};

use crate::Document;
use crate::classify::detect_format;
use crate::format::Format;
use crate::render::{CommonMark, RenderProse};
use crate::section::SectionItem;

/// Knobs controlling how assignments are classified.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    /// Treat bare numeric literals (and empty expressions) as inputs.
    pub auto_detect_inputs: bool,
    /// Names that are always inputs, whatever their expression.
    pub explicit_inputs: Vec<String>,
    /// Expression language tag copied onto the document.
    pub language: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            auto_detect_inputs: true,
            explicit_inputs: Vec::new(),
            language: "default".to_string(),
        }
    }
}

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    filename: Option<String>,
    format: Option<Format>,
    options: ParserOptions,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            filename: None,
            format: None,
            options: ParserOptions::default(),
        }
    }

    /// Filename used for format detection (its extension wins over content sniffing).
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Skip detection and parse as the given format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn format(&self) -> Format {
        self.format
            .unwrap_or_else(|| detect_format(&self.source, self.filename.as_deref()))
    }

    /// Parse the source into a Document, rendering prose as CommonMark.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        self.parse_with_renderer(&CommonMark)
    }

    pub fn parse_with_renderer(
        &self,
        renderer: &impl RenderProse,
    ) -> Result<Document, Vec<ParseError>> {
        let mut document = self.parse_structure()?;
        render_content(&mut document, renderer);
        Ok(document)
    }

    /// Structural pass only: content blocks keep their raw text and empty markup.
    pub fn parse_structure(&self) -> Result<Document, Vec<ParseError>> {
        let format = self.format();
        log::debug!(
            "parsing {} ({} bytes) as {}",
            self.filename.as_deref().unwrap_or("<input>"),
            self.source.len(),
            format
        );
        structural::parse_document(&self.source, self.file_id, format, &self.options)
    }
}

/// Parse a document, detecting its format from the filename or content.
pub fn parse_file(
    content: &str,
    filename: Option<&str>,
    options: ParserOptions,
) -> Result<Document, Vec<ParseError>> {
    let mut parser = Parser::new(content.to_string(), 0).with_options(options);
    if let Some(name) = filename {
        parser = parser.with_filename(name);
    }
    parser.parse()
}

/// Parse a document as markdown regardless of its content.
pub fn parse_markdown(content: &str, options: ParserOptions) -> Result<Document, Vec<ParseError>> {
    Parser::new(content.to_string(), 0)
        .with_format(Format::Markdown)
        .with_options(options)
        .parse()
}

/// Parse a document as an outline (org-style) regardless of its content.
pub fn parse_outline(content: &str, options: ParserOptions) -> Result<Document, Vec<ParseError>> {
    Parser::new(content.to_string(), 0)
        .with_format(Format::Outline)
        .with_options(options)
        .parse()
}

fn render_content(document: &mut Document, renderer: &impl RenderProse) {
    for section in &mut document.sections {
        for item in &mut section.items {
            match item {
                SectionItem::Content(block) => block.html = renderer.render(&block.text),
                SectionItem::Variable(_) => {}
            }
        }
    }
}
