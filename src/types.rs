//! Core data types shared by every component.

use sha2::{Digest, Sha256};
use std::fmt;

/// A single configuration value: scalar, nested tree, or sequence.
pub type Value = serde_json::Value;

/// One configuration document: string keys mapped to values.
pub type ConfigTree = serde_json::Map<String, Value>;

/// Short name of a value's JSON kind, used in logs and error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Content digest of a config tree, used to skip writes that would not
/// change the file.
///
/// Computed over the canonical JSON rendering (keys sorted), so two trees
/// with equal contents always share a fingerprint regardless of how they
/// were built.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(tree: &ConfigTree) -> Self {
        let canonical = serde_json::to_vec(tree).unwrap_or_default();
        Self(Sha256::digest(&canonical).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}
