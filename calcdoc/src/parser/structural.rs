use std::collections::HashMap;
use std::ops::Range;

use crate::Document;
use crate::classify::{
    Assignment, Fence, extract_heading_level, extract_section_name, fence_delimiter,
    is_hidden_section, is_section_header, is_simple_value, parse_variable_assignment,
};
use crate::format::Format;
use crate::parser::ParserOptions;
use crate::parser::error::ParseError;
use crate::section::{ContentBlock, Section, SectionItem};
use crate::variable::Variable;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split source text into sections, variables and prose blocks.
/// Content blocks come back with empty markup; rendering is a separate pass.
pub fn parse_document(
    source: &str,
    file_id: usize,
    format: Format,
    options: &ParserOptions,
) -> Result<Document, Vec<ParseError>> {
    let mut state = ParseState::new(file_id, format, options);

    let mut offset = 0;
    for (index, raw) in source.split('\n').enumerate() {
        let span = offset..offset + raw.len();
        offset += raw.len() + 1;
        state.process_line(raw.trim(), index + 1, span);
    }

    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    file_id: usize,
    format: Format,
    options: &'a ParserOptions,
    sections: Vec<Section>,
    /// Section name -> index into `sections`.
    section_index: HashMap<String, usize>,
    /// Index of the section new lines belong to, if any header has been seen.
    current: Option<usize>,
    variables: Vec<Variable>,
    input_variables: Vec<String>,
    /// Variable name -> (line, span) of its first definition.
    defined: HashMap<String, (usize, Range<usize>)>,
    /// Prose lines waiting to become a content block. Empty strings mark paragraph breaks.
    prose: Vec<String>,
    /// Open fenced code block, if any.
    fence: Option<Fence>,
    errors: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn new(file_id: usize, format: Format, options: &'a ParserOptions) -> Self {
        ParseState {
            file_id,
            format,
            options,
            sections: Vec::new(),
            section_index: HashMap::new(),
            current: None,
            variables: Vec::new(),
            input_variables: Vec::new(),
            defined: HashMap::new(),
            prose: Vec::new(),
            fence: None,
            errors: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &str, line_no: usize, span: Range<usize>) {
        // Everything inside a fenced block is skipped, headers and assignments included
        if let Some(fence) = self.fence {
            if fence.is_closed_by(line) {
                self.fence = None;
            }
            log::trace!("line {}: skipped (code block)", line_no);
            return;
        }

        if line.is_empty() {
            if self.prose.last().is_some_and(|last| !last.is_empty()) {
                self.prose.push(String::new());
            }
            return;
        }

        if is_section_header(line, self.format) {
            self.open_section(line);
            return;
        }

        if self.format == Format::Markdown {
            if let Some(fence) = fence_delimiter(line) {
                log::trace!("line {}: code block opened", line_no);
                self.fence = Some(fence);
                return;
            }
        }

        // Malformed markdown headers and outline directives (#+TITLE, # comment)
        if line.starts_with('#') {
            log::trace!("line {}: skipped directive", line_no);
            return;
        }

        if let Some(assignment) = parse_variable_assignment(line) {
            self.add_variable(assignment, line_no, span);
            return;
        }

        self.prose.push(line.to_string());
    }

    fn open_section(&mut self, line: &str) {
        let name = extract_section_name(line, self.format);
        self.flush_prose();

        let index = match self.section_index.get(&name) {
            Some(&index) => index,
            None => {
                let level = extract_heading_level(line, self.format);
                let hidden = is_hidden_section(line);
                log::debug!(
                    "section '{}' (level {}{})",
                    name,
                    level,
                    if hidden { ", hidden" } else { "" }
                );
                self.push_section(name, level, hidden)
            }
        };
        self.current = Some(index);
    }

    fn push_section(&mut self, name: String, level: usize, hidden: bool) -> usize {
        let index = self.sections.len();
        self.section_index.insert(name.clone(), index);
        self.sections.push(Section::new(name, index, level, hidden));
        index
    }

    /// The current section, opening the implicit unnamed one when no header has been seen.
    fn current_section(&mut self) -> usize {
        match self.current {
            Some(index) => index,
            None => {
                let index = self.push_section(String::new(), 0, false);
                self.current = Some(index);
                index
            }
        }
    }

    fn add_variable(&mut self, assignment: Assignment, line_no: usize, span: Range<usize>) {
        let index = self.current_section();
        self.flush_prose();

        let Assignment { name, expression } = assignment;

        if let Some((first_line, first_span)) = self.defined.get(&name) {
            self.errors.push(
                ParseError::error(format!("variable '{}' is defined more than once", name), span, self.file_id)
                    .with_line(line_no)
                    .with_context("redefinition")
                    .with_note(format!(
                        "first defined on line {} (bytes {}..{})",
                        first_line, first_span.start, first_span.end
                    )),
            );
            return;
        }
        self.defined.insert(name.clone(), (line_no, span.clone()));

        let is_input = if self.options.explicit_inputs.iter().any(|n| *n == name) {
            true
        } else if self.options.auto_detect_inputs {
            is_simple_value(&expression)
        } else {
            false
        };

        let section = &mut self.sections[index];
        let variable = Variable {
            name,
            expression,
            is_input,
            section: section.name.clone(),
            order: section.variables.len(),
            line: line_no,
            span,
        };

        section.variables.push(variable.clone());
        section.items.push(SectionItem::Variable(variable.clone()));
        if is_input {
            self.input_variables.push(variable.name.clone());
        }
        self.variables.push(variable);
    }

    /// Move buffered prose into the current section as one content block.
    fn flush_prose(&mut self) {
        let lines = std::mem::take(&mut self.prose);
        let text = lines.join("\n");
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match self.current {
            Some(index) => self.sections[index]
                .items
                .push(SectionItem::Content(ContentBlock::new(text.to_string()))),
            None => log::trace!("dropping {} bytes of prose before the first header", text.len()),
        }
    }

    fn finalize(mut self) -> Result<Document, Vec<ParseError>> {
        self.flush_prose();

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        log::debug!(
            "parsed {} section(s), {} variable(s), {} input(s)",
            self.sections.len(),
            self.variables.len(),
            self.input_variables.len()
        );

        Ok(Document {
            format: self.format,
            language: self.options.language.clone(),
            sections: self.sections,
            variables: self.variables,
            input_variables: self.input_variables,
        })
    }
}
