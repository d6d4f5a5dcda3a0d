//! Normalization of locale-ambiguous numeric strings.
//!
//! Uploads mix European formatting (`1.234,56`) with plain or English
//! formatting (`1234`, `1,234.56`). The engine only ever sees plain floats.

/// Parses a raw cell into a float, or `None` when it is not a number.
///
/// Disambiguation rules:
/// - When both `.` and `,` are present, the one appearing last is the
///   decimal separator and the other is grouping.
/// - A lone separator followed by exactly three digits at the end of the
///   string is treated as grouping (`1.234` -> 1234, `1,234` -> 1234).
/// - Any other lone separator is the decimal point.
pub fn normalize_number(raw: &str) -> Option<f64> {
    let mut s = raw.trim().to_string();
    if s.is_empty() {
        return None;
    }

    // Accounting negatives: (1.234,56)
    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }
    if let Some(stripped) = s.strip_prefix('-') {
        negative = !negative;
        s = stripped.trim().to_string();
    }

    // Currency symbols and hard spaces sometimes survive the export.
    s.retain(|c| !matches!(c, '$' | '€' | ' ' | '\u{a0}'));
    if s.is_empty() {
        return None;
    }

    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');

    let cleaned = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                // European: dots group, comma is decimal
                s.replace('.', "").replace(',', ".")
            } else {
                // English: commas group, dot is decimal
                s.replace(',', "")
            }
        }
        (Some(dot), None) => {
            if is_grouping_only(&s, dot, '.') {
                s.replace('.', "")
            } else {
                s.clone()
            }
        }
        (None, Some(comma)) => {
            if is_grouping_only(&s, comma, ',') {
                s.replace(',', "")
            } else {
                s.replace(',', ".")
            }
        }
        (None, None) => s.clone(),
    };

    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Missing or malformed values never abort aggregation; they count as zero.
pub fn normalize_or_zero(raw: &str) -> f64 {
    normalize_number(raw).unwrap_or(0.0)
}

fn is_grouping_only(s: &str, last_sep: usize, sep: char) -> bool {
    let tail = &s[last_sep + 1..];
    if tail.len() != 3 || !tail.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    // Multiple separators can only be grouping: 1.234.567
    s.matches(sep).count() > 1 || {
        let head = &s[..last_sep];
        !head.is_empty() && head.chars().all(|c| c.is_ascii_digit())
    }
}
