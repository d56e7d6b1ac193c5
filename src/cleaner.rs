//! Cell value normalization.

use crate::types::CellValue;

/// Sentinel returned for "not detected" readings.
pub const NOT_DETECTED: &str = "N.D.";

/// True for `N.D.`, `ND`, `n.d`, `not detected` and similar spellings.
pub fn is_not_detected(raw: &str) -> bool {
    let squashed: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    squashed == "nd" || squashed == "notdetected"
}

/// Turn a raw cell or OCR token into a typed value. Never fails: anything
/// that does not parse comes back as the trimmed original text.
pub fn clean(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Text(String::new());
    }
    if is_not_detected(trimmed) {
        return CellValue::Text(NOT_DETECTED.to_string());
    }

    let kept: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '<' | '>'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return CellValue::Text(trimmed.to_string());
    }

    if let Some(op) = kept.chars().next().filter(|c| *c == '<' || *c == '>') {
        let numeral: String = kept[1..].chars().filter(|c| *c != '<' && *c != '>').collect();
        if numeral.parse::<f64>().is_ok() {
            return CellValue::Text(format!("{}{}", op, numeral));
        }
        return CellValue::Text(trimmed.to_string());
    }

    if kept.contains('.') {
        match kept.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => CellValue::Text(trimmed.to_string()),
        }
    } else {
        match kept.parse::<i64>() {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Text(trimmed.to_string()),
        }
    }
}

/// A cleaned value that carries a reading: a number, a bounded value or the
/// not-detected sentinel. Pass-through text does not count.
pub fn is_reading(value: &CellValue) -> bool {
    match value {
        CellValue::Int(_) | CellValue::Float(_) => true,
        CellValue::Text(s) => s == NOT_DETECTED || s.starts_with('<') || s.starts_with('>'),
    }
}

/// Whether a whitespace-delimited token reads as a measurement: a number,
/// a bounded value, or a not-detected marker. Trailing `:`/`,` and wrapping
/// parentheses are ignored; tokens glued to letters (`P2O5`) are rejected.
pub fn is_measurement_token(token: &str) -> bool {
    let t = token
        .trim_matches(|c: char| matches!(c, '(' | ')' | ':' | ',' | ';'))
        .trim();
    if t.is_empty() {
        return false;
    }
    if is_not_detected(t) && t.chars().any(|c| c.is_alphabetic()) {
        return t.len() <= 4;
    }
    let body = t.strip_prefix(['<', '>']).unwrap_or(t);
    let body = body.strip_prefix('-').unwrap_or(body);
    !body.is_empty()
        && body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.matches('.').count() <= 1
}
