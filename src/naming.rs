//! Identifier formatting for folder names, tags, and categories.
//!
//! Every label that ends up on disk or in a report goes through [`format`],
//! which reduces free text to alphanumeric words and re-joins them in one of
//! a handful of styles.
//!
//! ```
//! use aitidy::naming::{format, NamingScheme};
//!
//! assert_eq!(format("Tax Returns (2023)", NamingScheme::SnakeCase), "tax_returns_2023");
//! assert_eq!(format("tax returns", NamingScheme::PascalCase), "TaxReturns");
//! assert_eq!(format("  --  ", NamingScheme::TitleCase), "");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that are never allowed in a folder name.
const ILLEGAL_FOLDER_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Output style for [`format`].
///
/// Unrecognized scheme names parse as [`NamingScheme::SnakeCase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NamingScheme {
    /// `tax_returns`
    #[default]
    SnakeCase,
    /// `taxReturns`
    CamelCase,
    /// `TaxReturns`
    PascalCase,
    /// `Tax Returns`
    TitleCase,
    /// `tax returns`
    LowerCase,
}

impl NamingScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingScheme::SnakeCase => "snake_case",
            NamingScheme::CamelCase => "camel_case",
            NamingScheme::PascalCase => "pascal_case",
            NamingScheme::TitleCase => "title_case",
            NamingScheme::LowerCase => "lower_case",
        }
    }

    /// Parses a scheme name, falling back to snake_case for anything unknown.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "camel_case" => NamingScheme::CamelCase,
            "pascal_case" => NamingScheme::PascalCase,
            "title_case" => NamingScheme::TitleCase,
            "lower_case" => NamingScheme::LowerCase,
            _ => NamingScheme::SnakeCase,
        }
    }
}

impl From<String> for NamingScheme {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<NamingScheme> for String {
    fn from(value: NamingScheme) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits text into lowercase ASCII alphanumeric words.
fn words(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    normalized.split_whitespace().map(str::to_string).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Formats `text` according to `scheme`.
///
/// Total and pure: input without any alphanumeric character yields an empty
/// string.
pub fn format(text: &str, scheme: NamingScheme) -> String {
    let words = words(text);
    if words.is_empty() {
        return String::new();
    }

    match scheme {
        NamingScheme::SnakeCase => words.join("_"),
        NamingScheme::CamelCase => {
            let mut out = words[0].clone();
            for word in &words[1..] {
                out.push_str(&capitalize(word));
            }
            out
        }
        NamingScheme::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
        NamingScheme::TitleCase => words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" "),
        NamingScheme::LowerCase => words.join(" "),
    }
}

/// Produces a single-level folder name that is safe on every common filesystem.
///
/// Applies [`format`], replaces illegal characters with `_`, trims leading and
/// trailing spaces and periods, and falls back to a formatted "other".
pub fn sanitize_folder_name(name: &str, scheme: NamingScheme) -> String {
    let formatted: String = format(name, scheme)
        .chars()
        .map(|c| if ILLEGAL_FOLDER_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = formatted.trim_matches(|c| c == ' ' || c == '.');

    if trimmed.is_empty() {
        format("other", scheme)
    } else {
        trimmed.to_string()
    }
}

/// Formats each `/`-separated segment of a folder path.
///
/// Segments that format to nothing are replaced by a formatted "other" so the
/// path keeps its depth.
pub fn format_folder_path(path: &str, scheme: NamingScheme) -> String {
    path.split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| sanitize_folder_name(segment, scheme))
        .collect::<Vec<_>>()
        .join("/")
}

/// Python-style title casing: uppercase after any non-letter, lowercase otherwise.
///
/// Used for tag-cluster folder names, where `machine_learning` becomes
/// `Machine_Learning` before the folder scheme is applied.
pub fn title(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}
