//! Value normalization for consensus comparison.

use super::types::Normalization;
use crate::client::types::FieldValue;
use serde_json::Value;

/// Canonical comparison key for a value, or `None` when the value carries no
/// answer (null, blank text, empty list or map).
///
/// Scalars compare by their text form, so `"1852"` and `1852` agree, and
/// numbers are written canonically first, so `1852.0` agrees with them too.
/// The key is JSON-encoded, which keeps a text answer from colliding with a
/// list or map.
pub fn comparison_key(value: &FieldValue, rules: &Normalization) -> Option<String> {
    let canonical = canonical(value, rules)?;
    serde_json::to_string(&canonical).ok()
}

fn canonical(value: &FieldValue, rules: &Normalization) -> Option<Value> {
    match value {
        FieldValue::Null => None,
        FieldValue::Flag(flag) => Some(Value::String(flag.to_string())),
        FieldValue::Number(number) => Some(Value::String(canonical_number(number))),
        FieldValue::Text(text) => {
            let text = normalize_text(text, rules);
            (!text.is_empty()).then_some(Value::String(text))
        }
        FieldValue::List(items) => {
            if items.is_empty() {
                return None;
            }
            Some(Value::Array(
                items
                    .iter()
                    .map(|item| canonical(item, rules).unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        FieldValue::Nested(map) => {
            if map.is_empty() {
                return None;
            }
            // BTreeMap iteration is sorted, so key order never affects equality.
            Some(Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), canonical(v, rules).unwrap_or(Value::Null)))
                    .collect(),
            ))
        }
    }
}

/// Integral floats are written without a fraction; 2^53 is where f64 stops
/// holding every integer exactly.
fn canonical_number(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        Some(f) if f.is_finite() => format!("{}", f),
        _ => number.to_string(),
    }
}

/// Collapsing whitespace also trims, since the ends are whitespace runs too.
pub fn normalize_text(text: &str, rules: &Normalization) -> String {
    let text = if rules.collapse_whitespace {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else if rules.trim {
        text.trim().to_string()
    } else {
        text.to_string()
    };

    if rules.case_insensitive {
        text.to_lowercase()
    } else {
        text
    }
}
