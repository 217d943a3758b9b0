use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use calcdoc::parser::{ParserOptions, parse_file};
use engine::{Calculator, Listeners, ValueMap};

const TEST_SUFFIXES: &[&str] = &[".test.md", ".test.org"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Name used for format detection. Defaults to the test file's own name.
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default = "default_true")]
    pub auto_detect_inputs: bool,

    #[serde(default)]
    pub explicit_inputs: Vec<String>,

    /// Initial input values, as if supplied by the host.
    #[serde(default)]
    pub inputs: BTreeMap<String, f64>,

    /// Input changes applied one at a time after construction.
    #[serde(default)]
    pub set: BTreeMap<String, f64>,

    /// Expected values of inputs or calculated variables.
    #[serde(default)]
    pub expect_values: BTreeMap<String, f64>,

    /// Variable name -> substring its error message must contain.
    #[serde(default)]
    pub expect_errors: BTreeMap<String, String>,

    #[serde(default)]
    pub expect_no_errors: bool,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected section names, in order.
    #[serde(default)]
    pub expect_sections: Option<Vec<String>>,

    /// Expected input variable names, in order.
    #[serde(default)]
    pub expect_inputs: Option<Vec<String>>,

    /// Allowed absolute difference for `expect_values`.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_true() -> bool {
    true
}

fn default_tolerance() -> f64 {
    1e-9
}

/// Split a test file into its TOML config and document source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    // Empty frontmatter closes immediately
    let (toml_str, rest) = match after_open.strip_prefix("---") {
        Some(rest) => ("", rest),
        None => {
            let close_pos = after_open
                .find("\n---")
                .ok_or("missing closing --- frontmatter delimiter")?;
            (
                after_open[..close_pos].trim_end_matches('\r'),
                &after_open[close_pos + 4..],
            )
        }
    };
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return failed(path, None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return failed(path, None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();
    let outcome = match check(path, &config, source) {
        Ok(()) => TestOutcome::Pass,
        Err(reason) => TestOutcome::Fail(reason),
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

fn failed(path: &Path, description: Option<String>, reason: String) -> TestResult {
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    }
}

/// Parse, calculate and compare against every expectation in `config`.
fn check(path: &Path, config: &TestConfig, source: &str) -> Result<(), String> {
    let filename = config
        .filename
        .clone()
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()));
    let options = ParserOptions {
        auto_detect_inputs: config.auto_detect_inputs,
        explicit_inputs: config.explicit_inputs.clone(),
        ..ParserOptions::default()
    };
    let parse_result = parse_file(source, filename.as_deref(), options);

    if config.expect_parse_error {
        return match parse_result {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }

    let document = parse_result.map_err(|errs| {
        let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
        format!("unexpected parse error: {}", msgs.join("; "))
    })?;

    if let Some(expected) = &config.expect_sections {
        let actual: Vec<&str> = document.sections.iter().map(|s| s.name.as_str()).collect();
        if actual != *expected {
            return Err(format!(
                "section mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = &config.expect_inputs {
        if document.input_variables != *expected {
            return Err(format!(
                "input mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, document.input_variables
            ));
        }
    }

    let initial: ValueMap = config.inputs.clone();
    let mut calculator = Calculator::new(document, &initial, Listeners::new());
    for (name, value) in &config.set {
        calculator.handle_input_change(name, *value);
    }

    for (name, expected) in &config.expect_values {
        let Some(actual) = calculator.value(name) else {
            return Err(format!("no value for '{}'", name));
        };
        if (actual - expected).abs() > config.tolerance {
            return Err(format!(
                "value mismatch for '{}'\n  expected: {}\n  actual:   {}",
                name, expected, actual
            ));
        }
    }

    let errors = calculator.errors();
    for (name, expected) in &config.expect_errors {
        match errors.get(name) {
            Some(message) if message.contains(expected.as_str()) => {}
            Some(message) => {
                return Err(format!(
                    "error for '{}': expected message containing \"{}\", got: {}",
                    name, expected, message
                ));
            }
            None => return Err(format!("expected an error for '{}', got none", name)),
        }
    }

    if config.expect_no_errors && !errors.is_empty() {
        let listed: Vec<String> = errors
            .iter()
            .map(|(name, message)| format!("  - {}: {}", name, message))
            .collect();
        return Err(format!("expected no errors, got {}:\n{}", errors.len(), listed.join("\n")));
    }

    Ok(())
}

fn is_test_file(name: &str) -> bool {
    TEST_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Discover test files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path.file_name().and_then(|n| n.to_str()).is_some_and(is_test_file) {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no test files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_for<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    })
}

/// Select the categories to run. Unknown names are reported and skipped.
fn filter_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

/// Run every test file under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no test files found in {}", path.display());
            return 1;
        }
        let selected = filter_categories(&all_categories, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };
    let single_file = path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !single_file {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_for(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_for(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let bad = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            bad,
            passed,
            failed,
            passed + failed
        );
        1
    }
}
