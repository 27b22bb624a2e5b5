//! Identifier helpers for generated code

use once_cell::sync::Lazy;
use regex::Regex;

static UPPER_OR_DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z\d]+)").unwrap());

static CAPITALIZED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z\d][a-z]+)").unwrap());

/// Keywords of the generated client language that cannot be used as identifiers
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

/// Entity property names taken by the generated entity base class
pub const RESERVED_PROPERTY_NAMES: &[&str] = &["id"];

/// `ListItemDesigns2` -> `list_item_designs_2`, `GetUserID` -> `get_user_id`
pub fn convert_camel_to_snake_case(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let spaced = s.replace('-', " ");
    let spaced = UPPER_OR_DIGIT_RUN.replace_all(&spaced, " ${1}");
    let spaced = CAPITALIZED_WORD.replace_all(&spaced, " ${1}");
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Append `_` to identifiers that clash with a reserved word
pub fn safe_identifier(s: &str) -> String {
    if RESERVED_IDENTIFIERS.contains(&s) {
        format!("{s}_")
    } else {
        s.to_string()
    }
}

/// Snake-cased, keyword-safe identifier for a query or body parameter
pub fn parameter_identifier(s: &str) -> String {
    safe_identifier(&convert_camel_to_snake_case(s))
}

/// Snake-cased identifier for an entity property; `id` is taken by the base class
pub fn property_identifier(s: &str) -> String {
    let snake = convert_camel_to_snake_case(s);
    if RESERVED_PROPERTY_NAMES.contains(&snake.as_str()) {
        format!("{snake}_")
    } else {
        snake
    }
}

/// Split an endpoint name into its unversioned name and version
///
/// The version is the run of trailing digits, `1` when there is none.
pub fn endpoint_version(endpoint: &str) -> (&str, u32) {
    let unversioned = endpoint.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &endpoint[unversioned.len()..];
    let version = if digits.is_empty() {
        1
    } else {
        digits.parse().unwrap_or(1)
    };
    (unversioned, version)
}
