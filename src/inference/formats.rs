//! Scalar type detection for captured string values

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::TypeTag;

// Regex patterns for scalar detection
static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

static DECIMAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

static DATETIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z?$").unwrap());

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Infer the type tag of a single captured value
///
/// Numeric checks run before the boolean and timestamp checks so that numeric
/// strings are never classified as text. Integers whose float conversion
/// overflows are treated as opaque bit masks (`str`), integers that do not
/// survive a round trip through `f64` are `float`.
pub fn infer_scalar_type(value: &str) -> TypeTag {
    if value.is_empty() {
        return TypeTag::None;
    }

    let trimmed = value.trim();
    if INTEGER_REGEX.is_match(trimmed) {
        return infer_integer(trimmed);
    }
    if DECIMAL_REGEX.is_match(trimmed) {
        return match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => TypeTag::Float,
            _ => TypeTag::Str,
        };
    }

    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return TypeTag::Bool;
    }

    if is_timestamp(value) {
        return TypeTag::DateTime;
    }

    TypeTag::Str
}

fn infer_integer(digits: &str) -> TypeTag {
    let as_float = match digits.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => return TypeTag::Str,
    };
    match digits.parse::<i128>() {
        Ok(integer) if as_float as i128 == integer => TypeTag::Int,
        _ => TypeTag::Float,
    }
}

/// Check for a `YYYY-MM-DDTHH:MM:SS[.fff][Z]` timestamp with a valid calendar date
pub fn is_timestamp(value: &str) -> bool {
    if !DATETIME_REGEX.is_match(value) {
        return false;
    }
    let naive = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(naive, DATETIME_FORMAT).is_ok()
}
