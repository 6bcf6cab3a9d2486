//! Type conversion between stored config values and field types.
//!
//! Conversion is a closed dispatch over [`TargetType`] categories:
//! 1. a value that already satisfies the target is returned unchanged;
//! 2. scalar targets (string, numbers, boolean, char, date/time) apply their
//!    parsing rule;
//! 3. enumerations try exact name, then case-insensitive name, then ordinal;
//! 4. sequences and fixed-size arrays are built element-wise;
//! 5. anything else is unsupported.
//!
//! In [`ConversionMode::Strict`] every failure is an error. In
//! [`ConversionMode::Lenient`] conversion never fails: scalar rules fall back
//! to a zero value, everything else returns the original value, and a warning
//! is logged.

mod rules;
mod value;

pub use value::{ConfigValue, Json, convert_to};

use crate::error::ConversionError;
use crate::types::Value;
use serde_json::Number;
use std::fmt;
use tracing::warn;

/// Whether a failed conversion raises or degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    #[default]
    Strict,
    Lenient,
}

/// Integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    pub fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
        }
    }

    fn bounds(self) -> (i128, i128) {
        match self {
            IntKind::I8 => (i8::MIN.into(), i8::MAX.into()),
            IntKind::I16 => (i16::MIN.into(), i16::MAX.into()),
            IntKind::I32 => (i32::MIN.into(), i32::MAX.into()),
            IntKind::I64 => (i64::MIN.into(), i64::MAX.into()),
            IntKind::U8 => (0, u8::MAX.into()),
            IntKind::U16 => (0, u16::MAX.into()),
            IntKind::U32 => (0, u32::MAX.into()),
            IntKind::U64 => (0, u64::MAX.into()),
        }
    }

    /// Whether `n` is an integer within this width's range.
    pub fn fits(self, n: &Number) -> bool {
        let value = n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from));
        let (min, max) = self.bounds();
        value.is_some_and(|v| v >= min && v <= max)
    }

    /// Parse decimal text into an in-range integer value.
    fn parse(self, text: &str) -> Option<Value> {
        let n: i128 = text.parse().ok()?;
        let (min, max) = self.bounds();
        if n < min || n > max {
            return None;
        }
        if n < 0 {
            i64::try_from(n).ok().map(Value::from)
        } else {
            u64::try_from(n).ok().map(Value::from)
        }
    }
}

/// Floating point widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn name(self) -> &'static str {
        match self {
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
        }
    }

    /// Whether `n` is representable as a finite value of this width.
    pub fn fits(self, n: &Number) -> bool {
        n.as_f64().is_some_and(|f| match self {
            FloatKind::F32 => (f as f32).is_finite(),
            FloatKind::F64 => f.is_finite(),
        })
    }
}

/// The category a value is converted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    /// Pass-through: every value, including null, is accepted as-is.
    Any,
    String,
    Integer(IntKind),
    Float(FloatKind),
    Bool,
    Char,
    /// A fieldless enumeration, identified by its variant names in
    /// declaration order.
    Enum {
        name: &'static str,
        variants: &'static [&'static str],
    },
    /// A growable sequence of elements.
    Sequence(Box<TargetType>),
    /// A sequence of exactly `len` elements.
    Array {
        element: Box<TargetType>,
        len: usize,
    },
    /// ISO-8601 calendar date (`2024-05-01`).
    Date,
    /// ISO-8601 local date-time (`2024-05-01T10:30:00`).
    DateTime,
    /// Null or a value of the inner type.
    Optional(Box<TargetType>),
    /// A nested mapping.
    Tree,
}

impl TargetType {
    /// Whether `value` already has the canonical shape of this target.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TargetType::Any, _) => true,
            (TargetType::Optional(_), Value::Null) => true,
            (TargetType::Optional(inner), v) => inner.accepts(v),
            (TargetType::String, Value::String(_)) => true,
            (TargetType::Integer(kind), Value::Number(n)) => kind.fits(n),
            (TargetType::Float(kind), Value::Number(n)) => kind.fits(n),
            (TargetType::Bool, Value::Bool(_)) => true,
            (TargetType::Char, Value::String(s)) => s.chars().count() == 1,
            (TargetType::Enum { variants, .. }, Value::String(s)) => {
                variants.contains(&s.as_str())
            }
            (TargetType::Sequence(element), Value::Array(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (TargetType::Array { element, len }, Value::Array(items)) => {
                items.len() == *len && items.iter().all(|item| element.accepts(item))
            }
            (TargetType::Tree, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Any => write!(f, "any"),
            TargetType::String => write!(f, "string"),
            TargetType::Integer(kind) => write!(f, "{}", kind.name()),
            TargetType::Float(kind) => write!(f, "{}", kind.name()),
            TargetType::Bool => write!(f, "bool"),
            TargetType::Char => write!(f, "char"),
            TargetType::Enum { name, .. } => write!(f, "enum {}", name),
            TargetType::Sequence(element) => write!(f, "list<{}>", element),
            TargetType::Array { element, len } => write!(f, "[{}; {}]", element, len),
            TargetType::Date => write!(f, "date"),
            TargetType::DateTime => write!(f, "datetime"),
            TargetType::Optional(inner) => write!(f, "optional<{}>", inner),
            TargetType::Tree => write!(f, "tree"),
        }
    }
}

/// Convert `value` into the canonical shape of `target`.
///
/// Never returns `Err` in [`ConversionMode::Lenient`].
pub fn convert(
    value: &Value,
    target: &TargetType,
    mode: ConversionMode,
) -> Result<Value, ConversionError> {
    if target.accepts(value) {
        return Ok(value.clone());
    }

    match target {
        TargetType::Optional(inner) => convert(value, inner, mode),
        TargetType::String
        | TargetType::Integer(_)
        | TargetType::Float(_)
        | TargetType::Bool
        | TargetType::Char
        | TargetType::Date
        | TargetType::DateTime => match rules::scalar(value, target) {
            Ok(converted) => Ok(converted),
            Err(err) => match mode {
                ConversionMode::Strict => Err(err),
                ConversionMode::Lenient => {
                    let fallback = rules::zero_value(target);
                    warn!(error = %err, fallback = %fallback, "Conversion failed, using default");
                    Ok(fallback)
                }
            },
        },
        TargetType::Enum { name, variants } => {
            settle(rules::enumeration(value, name, variants, target), value, mode)
        }
        TargetType::Sequence(element) => {
            settle(rules::sequence(value, element, target, mode), value, mode)
        }
        TargetType::Array { element, len } => {
            let built = rules::sequence(value, element, target, mode).and_then(|items| {
                let found = items.as_array().map_or(0, Vec::len);
                if found == *len {
                    Ok(items)
                } else {
                    Err(ConversionError::new(
                        format!("expected {} elements, found {}", len, found),
                        value,
                        target,
                    ))
                }
            });
            settle(built, value, mode)
        }
        TargetType::Any | TargetType::Tree => {
            settle(Err(ConversionError::unsupported(value, target)), value, mode)
        }
    }
}

/// Apply the mode to a rule outcome: strict propagates, lenient falls back
/// to the original value.
fn settle(
    outcome: Result<Value, ConversionError>,
    original: &Value,
    mode: ConversionMode,
) -> Result<Value, ConversionError> {
    match (outcome, mode) {
        (Ok(converted), _) => Ok(converted),
        (Err(err), ConversionMode::Strict) => Err(err),
        (Err(err), ConversionMode::Lenient) => {
            warn!(error = %err, "Conversion failed, keeping original value");
            Ok(original.clone())
        }
    }
}
