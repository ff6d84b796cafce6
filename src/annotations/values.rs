//! Parsers for annotation values.

use crate::annotations::AnnotationError;

/// Parse a time value into milliseconds.
///
/// Accepts `<n>[us|ms|s|m|h|d]`; a bare number is milliseconds. Microseconds
/// are truncated to whole milliseconds.
pub fn parse_time(input: &str) -> Result<i64, AnnotationError> {
    let value = input.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    if digits.is_empty() {
        return Err(AnnotationError::Time(input.to_string()));
    }
    let n: i64 = digits
        .parse()
        .map_err(|_| AnnotationError::Time(input.to_string()))?;

    let ms = match unit {
        "us" => Some(n / 1000),
        "" | "ms" => Some(n),
        "s" => n.checked_mul(1_000),
        "m" => n.checked_mul(60_000),
        "h" => n.checked_mul(3_600_000),
        "d" => n.checked_mul(86_400_000),
        _ => None,
    };
    ms.ok_or_else(|| AnnotationError::Time(input.to_string()))
}

/// Parse `true` or `false`, ignoring case.
pub fn parse_bool(input: &str) -> Result<bool, AnnotationError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AnnotationError::Bool(input.to_string())),
    }
}

pub fn parse_int(input: &str) -> Result<i64, AnnotationError> {
    input
        .trim()
        .parse()
        .map_err(|_| AnnotationError::Integer(input.to_string()))
}

/// Split a multi-line snippet into trimmed, non-empty lines.
pub fn parse_snippet(input: &str) -> Result<Vec<String>, AnnotationError> {
    let lines: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return Err(AnnotationError::Invalid {
            annotation: "config-snippet",
            message: "empty input".to_string(),
        });
    }
    Ok(lines)
}
