//! Mapping between Rust field types and canonical config values.

use super::rules::{DATE_FORMAT, DATETIME_FORMAT};
use super::{ConversionMode, FloatKind, IntKind, TargetType, convert};
use crate::error::ConversionError;
use crate::types::{ConfigTree, Value};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A Rust type that can be stored in, and read back from, a config value.
///
/// [`ConfigValue::from_config`] receives a value already converted to the
/// canonical shape of [`ConfigValue::target_type`], so implementations only
/// have to unpack it.
pub trait ConfigValue: Sized {
    fn target_type() -> TargetType;

    fn from_config(value: &Value) -> Result<Self, ConversionError>;

    fn to_config(&self) -> Value;
}

/// Convert a raw config value into `T`.
///
/// Lenient mode can still fail here when the fallback value does not fit `T`
/// (an unmatched enum name, for instance).
pub fn convert_to<T: ConfigValue>(value: &Value, mode: ConversionMode) -> Result<T, ConversionError> {
    let target = T::target_type();
    let canonical = convert(value, &target, mode)?;
    T::from_config(&canonical)
}

impl ConfigValue for String {
    fn target_type() -> TargetType {
        TargetType::String
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConversionError::mismatch(value, "string"))
    }

    fn to_config(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ConfigValue for bool {
    fn target_type() -> TargetType {
        TargetType::Bool
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_bool()
            .ok_or_else(|| ConversionError::mismatch(value, "bool"))
    }

    fn to_config(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ConfigValue for char {
    fn target_type() -> TargetType {
        TargetType::Char
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        let mut chars = value.as_str().unwrap_or_default().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::mismatch(value, "char")),
        }
    }

    fn to_config(&self) -> Value {
        Value::String(self.to_string())
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl ConfigValue for $ty {
                fn target_type() -> TargetType {
                    TargetType::Integer(IntKind::$kind)
                }

                fn from_config(value: &Value) -> Result<Self, ConversionError> {
                    let wide = value
                        .as_i64()
                        .map(i128::from)
                        .or_else(|| value.as_u64().map(i128::from));
                    wide.and_then(|n| <$ty>::try_from(n).ok())
                        .ok_or_else(|| ConversionError::mismatch(value, IntKind::$kind.name()))
                }

                fn to_config(&self) -> Value {
                    Value::from(*self)
                }
            }
        )+
    };
}

impl_integer! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

impl ConfigValue for f64 {
    fn target_type() -> TargetType {
        TargetType::Float(FloatKind::F64)
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_f64()
            .ok_or_else(|| ConversionError::mismatch(value, "f64"))
    }

    fn to_config(&self) -> Value {
        Value::from(*self)
    }
}

impl ConfigValue for f32 {
    fn target_type() -> TargetType {
        TargetType::Float(FloatKind::F32)
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_f64()
            .map(|f| f as f32)
            .filter(|f| f.is_finite())
            .ok_or_else(|| ConversionError::mismatch(value, "f32"))
    }

    fn to_config(&self) -> Value {
        // widen through the shortest decimal so 0.1f32 is stored as 0.1
        let widened = self.to_string().parse::<f64>().unwrap_or(f64::from(*self));
        Value::from(widened)
    }
}

impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn target_type() -> TargetType {
        TargetType::Sequence(Box::new(T::target_type()))
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Array(items) => items.iter().map(T::from_config).collect(),
            other => Err(ConversionError::mismatch(other, Self::target_type())),
        }
    }

    fn to_config(&self) -> Value {
        Value::Array(self.iter().map(T::to_config).collect())
    }
}

impl<T: ConfigValue, const N: usize> ConfigValue for [T; N] {
    fn target_type() -> TargetType {
        TargetType::Array {
            element: Box::new(T::target_type()),
            len: N,
        }
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        let items = Vec::<T>::from_config(value)?;
        items
            .try_into()
            .map_err(|_| ConversionError::mismatch(value, Self::target_type()))
    }

    fn to_config(&self) -> Value {
        Value::Array(self.iter().map(T::to_config).collect())
    }
}

impl<T: ConfigValue> ConfigValue for Option<T> {
    fn target_type() -> TargetType {
        TargetType::Optional(Box::new(T::target_type()))
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_config(other).map(Some),
        }
    }

    fn to_config(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_config)
    }
}

impl ConfigValue for NaiveDate {
    fn target_type() -> TargetType {
        TargetType::Date
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
            .ok_or_else(|| ConversionError::mismatch(value, "date"))
    }

    fn to_config(&self) -> Value {
        Value::String(self.format(DATE_FORMAT).to_string())
    }
}

impl ConfigValue for NaiveDateTime {
    fn target_type() -> TargetType {
        TargetType::DateTime
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_str()
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
            .ok_or_else(|| ConversionError::mismatch(value, "datetime"))
    }

    fn to_config(&self) -> Value {
        Value::String(self.format(DATETIME_FORMAT).to_string())
    }
}

impl ConfigValue for Value {
    fn target_type() -> TargetType {
        TargetType::Any
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }

    fn to_config(&self) -> Value {
        self.clone()
    }
}

impl ConfigValue for ConfigTree {
    fn target_type() -> TargetType {
        TargetType::Tree
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| ConversionError::mismatch(value, "tree"))
    }

    fn to_config(&self) -> Value {
        Value::Object(self.clone())
    }
}

/// Field wrapper for arbitrary serde types, stored as their JSON form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> ConfigValue for Json<T> {
    fn target_type() -> TargetType {
        TargetType::Any
    }

    fn from_config(value: &Value) -> Result<Self, ConversionError> {
        serde_json::from_value(value.clone())
            .map(Json)
            .map_err(|e| ConversionError::new(e.to_string(), value, std::any::type_name::<T>()))
    }

    fn to_config(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

/// Implement [`ConfigValue`] for a fieldless enum, stored by variant name.
///
/// ```
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Level { Low, High }
/// confbind::config_enum!(Level { Low, High });
/// ```
#[macro_export]
macro_rules! config_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::convert::ConfigValue for $ty {
            fn target_type() -> $crate::convert::TargetType {
                $crate::convert::TargetType::Enum {
                    name: stringify!($ty),
                    variants: &[$(stringify!($variant)),+],
                }
            }

            fn from_config(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::error::ConversionError> {
                match value.as_str() {
                    $(Some(stringify!($variant)) => Ok($ty::$variant),)+
                    _ => Err($crate::error::ConversionError::mismatch(value, stringify!($ty))),
                }
            }

            fn to_config(&self) -> $crate::Value {
                let name = match self {
                    $($ty::$variant => stringify!($variant),)+
                };
                $crate::Value::String(name.to_string())
            }
        }
    };
}
