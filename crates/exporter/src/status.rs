//! Conversion of raw API values into sample values.

use api_types::RawValue;

/// Map a state word or numeric string to a sample value.
///
/// Numeric strings parse as themselves. State words map through a fixed table shared by
/// every collector; each call site documents which words it expects. Returns `None` for
/// anything else, and the caller drops that one sample.
pub fn parse_status(raw: &str) -> Option<f64> {
    let normalized = raw.trim().to_ascii_lowercase();
    if let Ok(value) = normalized.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    match normalized.as_str() {
        "online" | "running" | "up" | "normal" | "ok" | "true" | "present" | "enabled" => {
            Some(1.0)
        }
        "offline" | "stopped" | "down" | "false" | "disabled" | "broken" => Some(0.0),
        "restricted" | "starting" => Some(2.0),
        "mixed" | "stopping" => Some(3.0),
        "initializing" => Some(4.0),
        "deleting" => Some(5.0),
        _ => None,
    }
}

/// Outcome of reading one optional field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Field not reported, or reported as an empty string
    Absent,
    /// Field reported but not convertible
    Unparseable,
    Value(f64),
}

impl FieldValue {
    pub fn from_raw(raw: Option<&RawValue>) -> Self {
        match raw {
            None => FieldValue::Absent,
            Some(RawValue::Text(text)) if text.trim().is_empty() => FieldValue::Absent,
            Some(RawValue::Text(text)) => match parse_status(text) {
                Some(value) => FieldValue::Value(value),
                None => FieldValue::Unparseable,
            },
            Some(RawValue::Number(n)) if n.is_finite() => FieldValue::Value(*n),
            Some(RawValue::Number(_)) => FieldValue::Unparseable,
            Some(RawValue::Bool(b)) => FieldValue::Value(if *b { 1.0 } else { 0.0 }),
        }
    }
}
