mod config;
mod format;
mod report;
mod test_runner;

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use calcdoc::Document;
use calcdoc::parser::ParseError;
use engine::{Calculator, Listeners, ValueMap};

use crate::config::Config;
use crate::format::Formatter;
use crate::report::ReportOptions;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "calcdoc", version, about = "Literate calculation documents")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG also works.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calculate a document and print its sections
    Run(RunArgs),

    /// Run .test.md / .test.org test files
    Test(TestArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Org,
}

impl From<FormatArg> for calcdoc::format::Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => calcdoc::format::Format::Markdown,
            FormatArg::Org => calcdoc::format::Format::Outline,
        }
    }
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown, org or JSON (previously exported with --json) document
    file: String,

    /// Change an input after the first pass. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, f64)>,

    /// Treat this variable as an input whatever its expression. Repeatable.
    #[arg(long = "input", value_name = "NAME")]
    inputs: Vec<String>,

    /// Only --input names (and config explicit_inputs) are inputs
    #[arg(long)]
    no_auto_inputs: bool,

    /// Skip format detection
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// How values are displayed
    #[arg(long, value_enum)]
    formatter: Option<Formatter>,

    /// Decimal places for displayed values
    #[arg(long)]
    decimals: Option<usize>,

    /// Also print sections tagged :hidden:
    #[arg(long)]
    show_hidden: bool,

    /// Print each calculated variable's expression
    #[arg(long)]
    show_formulas: bool,

    /// Parse only, don't calculate (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed document
    #[arg(long)]
    ast: bool,

    /// Print the parsed document as JSON
    #[arg(long)]
    json: bool,

    /// Print prose as rendered HTML
    #[arg(long)]
    html: bool,

    /// List sections and exit
    #[arg(long)]
    list_sections: bool,

    /// Config file (default: calcdoc.toml next to the document)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a test file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // If the first positional arg is not a known subcommand, inject "run"
    // so `calcdoc file.md` works like `calcdoc run file.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let config = match Config::resolve(args.config.as_deref(), Path::new(&args.file)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let document = if Path::new(&args.file).extension().is_some_and(|ext| ext == "json") {
        match Document::from_json(&source) {
            Ok(document) => document,
            Err(e) => {
                eprintln!("error: '{}' is not a document export: {}", args.file, e);
                process::exit(1);
            }
        }
    } else {
        parse_source(&args, &config, source, color_choice)
    };

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    if args.ast {
        println!("{:#?}", document);
        return;
    }

    if args.json {
        match document.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: cannot serialise document: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if args.list_sections {
        if let Err(e) = report::write_section_list(&mut io::stdout().lock(), &document) {
            eprintln!("error: {}", e);
            process::exit(1);
        }
        return;
    }

    let known_inputs = document.input_variables.clone();
    let listeners = Listeners::new().on_input_values_changed(|values: &ValueMap| {
        log::info!("inputs now {:?}", values);
    });
    let mut calculator = Calculator::new(document, &ValueMap::new(), listeners);
    for (name, value) in &args.set {
        if !known_inputs.contains(name) {
            log::warn!("--set {}: not an input variable of this document", name);
        }
        calculator.handle_input_change(name, *value);
    }

    let options = ReportOptions {
        formatter: args.formatter.unwrap_or(config.display.formatter),
        decimals: args.decimals.or(config.display.decimals),
        show_hidden: args.show_hidden || config.display.show_hidden,
        show_formulas: args.show_formulas || config.display.show_formulas,
        html: args.html,
    };
    if let Err(e) = report::write_report(&mut io::stdout().lock(), &calculator, &options) {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    let errors = calculator.errors();
    if !errors.is_empty() {
        log::info!("{} variable(s) failed to calculate", errors.len());
    }
}

/// Parse document text, printing diagnostics and exiting on failure.
fn parse_source(
    args: &RunArgs,
    config: &Config,
    source: String,
    color_choice: ColorChoice,
) -> Document {
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let mut options = config.parser.to_options();
    if args.no_auto_inputs {
        options.auto_detect_inputs = false;
    }
    options.explicit_inputs.extend(args.inputs.iter().cloned());

    let mut parser = calcdoc::parser::Parser::new(source, file_id)
        .with_filename(args.file.as_str())
        .with_options(options);
    if let Some(format) = args.format {
        parser = parser.with_format(format.into());
    }

    match parser.parse() {
        Ok(document) => document,
        Err(errors) => {
            emit_parse_errors(&files, &errors, color_choice);
            process::exit(1);
        }
    }
}

fn emit_parse_errors(
    files: &SimpleFiles<String, String>,
    errors: &[ParseError],
    color_choice: ColorChoice,
) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}

/// Parse a `NAME=VALUE` argument.
fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((name.to_string(), value))
}
