use std::path::{Path, PathBuf};

use serde::Deserialize;

use calcdoc::parser::ParserOptions;

use crate::format::Formatter;

pub const CONFIG_FILE: &str = "calcdoc.toml";

/// Contents of a `calcdoc.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub parser: ParserConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub auto_detect_inputs: bool,
    pub explicit_inputs: Vec<String>,
    pub language: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        let defaults = ParserOptions::default();
        ParserConfig {
            auto_detect_inputs: defaults.auto_detect_inputs,
            explicit_inputs: defaults.explicit_inputs,
            language: defaults.language,
        }
    }
}

impl ParserConfig {
    pub fn to_options(&self) -> ParserOptions {
        ParserOptions {
            auto_detect_inputs: self.auto_detect_inputs,
            explicit_inputs: self.explicit_inputs.clone(),
            language: self.language.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub formatter: Formatter,
    pub decimals: Option<usize>,
    pub show_hidden: bool,
    pub show_formulas: bool,
}

impl Config {
    pub fn parse(text: &str) -> Result<Config, String> {
        toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn load(path: &Path) -> Result<Config, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Config::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// `explicit` if given, else `calcdoc.toml` next to `document`, else defaults.
    pub fn resolve(explicit: Option<&Path>, document: &Path) -> Result<Config, String> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        match find_beside(document) {
            Some(path) => {
                log::debug!("using config {}", path.display());
                Config::load(&path)
            }
            None => Ok(Config::default()),
        }
    }
}

fn find_beside(document: &Path) -> Option<PathBuf> {
    let dir = match document.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let candidate = dir.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}
