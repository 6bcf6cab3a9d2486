//! Per-category conversion rules.

use super::{ConversionMode, FloatKind, IntKind, TargetType, convert};
use crate::error::ConversionError;
use crate::types::Value;
use chrono::{NaiveDate, NaiveDateTime};

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(super) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATETIME_SHORT_FORMAT: &str = "%Y-%m-%dT%H:%M";

const TRUE_WORDS: &[&str] = &["true", "1", "yes", "y"];
const FALSE_WORDS: &[&str] = &["false", "0", "no", "n"];

/// Textual form of a scalar, trimmed. Compound values and null have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Dispatch for the scalar categories.
pub(super) fn scalar(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    match target {
        TargetType::String => string(value, target),
        TargetType::Integer(kind) => integer(value, *kind, target),
        TargetType::Float(kind) => float(value, *kind, target),
        TargetType::Bool => boolean(value, target),
        TargetType::Char => character(value, target),
        TargetType::Date => date(value, target),
        TargetType::DateTime => date_time(value, target),
        _ => Err(ConversionError::unsupported(value, target)),
    }
}

/// Fallback used by lenient mode when a scalar rule fails.
pub(super) fn zero_value(target: &TargetType) -> Value {
    match target {
        TargetType::Integer(_) => Value::from(0),
        TargetType::Float(_) => Value::from(0.0),
        TargetType::Bool => Value::Bool(false),
        TargetType::Char => Value::String('\0'.to_string()),
        _ => Value::Null,
    }
}

fn string(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    match value {
        Value::Null => Err(ConversionError::new("null has no string form", value, target)),
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Ok(Value::String(other.to_string())),
    }
}

fn integer(value: &Value, kind: IntKind, target: &TargetType) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new("numeric conversion failed", value, target);

    if let Value::Number(n) = value {
        if n.is_f64() {
            // integral floats such as 8.0 are accepted
            let f = n.as_f64().ok_or_else(fail)?;
            if f.fract() != 0.0 {
                return Err(fail());
            }
            return kind.parse(&format!("{f:.0}")).ok_or_else(fail);
        }
    }

    let text = scalar_text(value).ok_or_else(fail)?;
    kind.parse(&text).ok_or_else(fail)
}

fn float(value: &Value, kind: FloatKind, target: &TargetType) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new("numeric conversion failed", value, target);

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
    .ok_or_else(fail)?;

    match kind {
        FloatKind::F64 => Ok(Value::from(parsed)),
        FloatKind::F32 => {
            let narrow = parsed as f32;
            if !narrow.is_finite() {
                return Err(fail());
            }
            // shortest decimal for the f32, so 1.1 stays 1.1 instead of 1.100000023841858
            let widened: f64 = narrow.to_string().parse().map_err(|_| fail())?;
            Ok(Value::from(widened))
        }
    }
}

fn boolean(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    if let Value::Number(n) = value {
        let nonzero = n.as_f64().is_some_and(|f| f != 0.0);
        return Ok(Value::Bool(nonzero));
    }

    let fail = || ConversionError::new("boolean conversion failed", value, target);
    let text = scalar_text(value).ok_or_else(fail)?.to_lowercase();
    if TRUE_WORDS.contains(&text.as_str()) {
        Ok(Value::Bool(true))
    } else if FALSE_WORDS.contains(&text.as_str()) {
        Ok(Value::Bool(false))
    } else {
        Err(fail())
    }
}

fn character(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new("char conversion failed", value, target);
    let text = scalar_text(value).ok_or_else(fail)?;

    let mut chars = text.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        return Ok(Value::String(only.to_string()));
    }

    let code = if let Some(hex) = text.strip_prefix("\\u") {
        if hex.len() != 4 {
            return Err(fail());
        }
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u32>().ok()
    };

    code.and_then(char::from_u32)
        .map(|c| Value::String(c.to_string()))
        .ok_or_else(fail)
}

fn date(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new("date conversion failed", value, target);
    let text = value.as_str().map(str::trim).ok_or_else(fail)?;
    let parsed = NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| fail())?;
    Ok(Value::String(parsed.format(DATE_FORMAT).to_string()))
}

fn date_time(value: &Value, target: &TargetType) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new("date-time conversion failed", value, target);
    let text = value.as_str().map(str::trim).ok_or_else(fail)?;
    let parsed = text
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_SHORT_FORMAT))
        .map_err(|_| fail())?;
    Ok(Value::String(parsed.format(DATETIME_FORMAT).to_string()))
}

/// Exact name, then first case-insensitive name, then ordinal index.
pub(super) fn enumeration(
    value: &Value,
    name: &str,
    variants: &[&str],
    target: &TargetType,
) -> Result<Value, ConversionError> {
    let fail = || ConversionError::new(format!("no variant of {name} matches"), value, target);
    let text = scalar_text(value).ok_or_else(fail)?;

    if let Some(exact) = variants.iter().find(|v| **v == text) {
        return Ok(Value::String(exact.to_string()));
    }
    if let Some(folded) = variants.iter().find(|v| v.eq_ignore_ascii_case(&text)) {
        return Ok(Value::String(folded.to_string()));
    }
    text.parse::<usize>()
        .ok()
        .and_then(|index| variants.get(index))
        .map(|v| Value::String(v.to_string()))
        .ok_or_else(fail)
}

/// Build a sequence: comma-separated text is split and trimmed, sequences
/// are taken element-wise, any other value becomes a one-element sequence.
pub(super) fn sequence(
    value: &Value,
    element: &TargetType,
    target: &TargetType,
    mode: ConversionMode,
) -> Result<Value, ConversionError> {
    let items: Vec<Value> = match value {
        Value::Null => return Err(ConversionError::mismatch(value, target)),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => s
            .split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
        Value::Array(list) => list.clone(),
        other => vec![other.clone()],
    };

    items
        .iter()
        .map(|item| convert(item, element, mode))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
