use clap::ValueEnum;
use serde::Deserialize;

const DEFAULT_DECIMALS: usize = 6;

/// Named styles for displaying a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Formatter {
    /// Fixed decimals (6 unless overridden)
    #[default]
    Default,
    /// $1234.50
    Currency,
    /// 12.50%
    Percentage,
    /// 1.2k, 3.4M, 5.6B
    Compact,
    /// 1.23e+4
    Scientific,
}

impl Formatter {
    /// Render `value`. `decimals` overrides the style's precision; `compact`
    /// below a thousand and the fixed-width styles honour it.
    pub fn format(self, value: f64, decimals: Option<usize>) -> String {
        match self {
            Formatter::Default => format!("{:.*}", decimals.unwrap_or(DEFAULT_DECIMALS), value),
            Formatter::Currency => format!("${:.*}", decimals.unwrap_or(2), value),
            Formatter::Percentage => format!("{:.*}%", decimals.unwrap_or(2), value),
            Formatter::Compact => compact(value, decimals.unwrap_or(2)),
            Formatter::Scientific => signed_exponent(format!("{:.*e}", decimals.unwrap_or(2), value)),
        }
    }
}

fn compact(value: f64, decimals: usize) -> String {
    let magnitude = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if magnitude >= 1e9 {
        format!("{}{:.1}B", sign, magnitude / 1e9)
    } else if magnitude >= 1e6 {
        format!("{}{:.1}M", sign, magnitude / 1e6)
    } else if magnitude >= 1e3 {
        format!("{}{:.1}k", sign, magnitude / 1e3)
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// `1.23e4` -> `1.23e+4`; negative exponents already carry their sign.
fn signed_exponent(text: String) -> String {
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => text,
    }
}

/// Display label for an identifier: `basePrice` -> `Base Price`,
/// `tax_rate` -> `Tax Rate`, `net-total` -> `Net Total`.
pub fn title_case(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in identifier.chars() {
        if c == '_' || c == '-' {
            words.push(std::mem::take(&mut current));
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    words.push(current);

    words
        .iter()
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
