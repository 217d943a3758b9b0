use std::io::{self, Write};

use calcdoc::Document;
use calcdoc::section::{Section, SectionItem};
use calcdoc::variable::Variable;
use engine::Calculator;

use crate::format::{Formatter, title_case};

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub formatter: Formatter,
    pub decimals: Option<usize>,
    pub show_hidden: bool,
    pub show_formulas: bool,
    /// Print rendered markup for prose instead of its source text.
    pub html: bool,
}

/// Print every displayed section with its prose, inputs, results and errors,
/// in source order.
pub fn write_report(
    out: &mut dyn Write,
    calculator: &Calculator,
    options: &ReportOptions,
) -> io::Result<()> {
    let document = calculator.document();
    let mut first = true;

    for section in &document.sections {
        if section.hidden && !options.show_hidden {
            continue;
        }
        if !first {
            writeln!(out)?;
        }
        first = false;

        if let Some(header) = header_line(document, section) {
            writeln!(out, "{}", header)?;
        }
        for item in &section.items {
            match item {
                SectionItem::Content(block) => {
                    let text = if options.html { block.html.trim_end() } else { block.text.as_str() };
                    writeln!(out, "{}", text)?;
                }
                SectionItem::Variable(variable) => {
                    write_variable(out, calculator, variable, options)?;
                }
            }
        }
    }

    Ok(())
}

fn write_variable(
    out: &mut dyn Write,
    calculator: &Calculator,
    variable: &Variable,
    options: &ReportOptions,
) -> io::Result<()> {
    let label = title_case(&variable.name);
    let state = calculator.state();

    if variable.is_input {
        let value = state.input_values.get(&variable.name).copied().unwrap_or(0.0);
        return writeln!(
            out,
            "  {}: {} (input)",
            label,
            options.formatter.format(value, options.decimals)
        );
    }

    let value = state.calculated_values.get(&variable.name).copied().unwrap_or(0.0);
    let formatted = options.formatter.format(value, options.decimals);
    if options.show_formulas {
        write!(out, "  {} = {} => {}", label, variable.expression, formatted)?;
    } else {
        write!(out, "  {}: {}", label, formatted)?;
    }
    match state.errors.get(&variable.name) {
        Some(error) => writeln!(out, "  [error: {}]", error),
        None => writeln!(out),
    }
}

fn header_line(document: &Document, section: &Section) -> Option<String> {
    if section.level == 0 {
        return None;
    }
    let marker = document.format.header_marker().to_string().repeat(section.level);
    let suffix = if section.hidden { " :hidden:" } else { "" };
    Some(format!("{} {}{}", marker, section.name, suffix))
}

/// One line per section: header, variable count, visibility.
pub fn write_section_list(out: &mut dyn Write, document: &Document) -> io::Result<()> {
    for section in &document.sections {
        let name = if section.name.is_empty() { "(untitled)" } else { section.name.as_str() };
        let pad = "  ".repeat(section.level.saturating_sub(1));
        writeln!(
            out,
            "{}{} ({} variable{}{})",
            pad,
            name,
            section.variables.len(),
            if section.variables.len() == 1 { "" } else { "s" },
            if section.hidden { ", hidden" } else { "" }
        )?;
    }
    Ok(())
}
