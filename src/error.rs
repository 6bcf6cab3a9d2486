//! Structured error types for binding, conversion and persistence.
//!
//! Every failure kind gets its own type so callers can match on exactly the
//! boundary they crossed. [`Error`] unifies them for code that does not care.

use crate::types::{Value, value_kind};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A config document could not be parsed or rendered by its format parser.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed, but its top level is not a key/value mapping.
    #[error("top level of a config document must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
}

/// No registered parser handles the file's extension.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported config file format: {file}")]
pub struct UnsupportedFormatError {
    pub file: String,
}

/// Reading a config file at registration or reload time failed.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("config '{0}' is not registered")]
    UnknownConfig(String),

    #[error("config file {} is missing or not a regular file", .path.display())]
    NotAFile { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormatError),
}

/// One bound field could not be populated during load.
#[derive(Debug, Error)]
#[error("failed to set field '{field}' of {instance} from '{path}': {source}")]
pub struct SetError {
    pub field: String,
    pub instance: String,
    pub path: String,
    #[source]
    pub source: ConversionError,
}

/// Persisting a config file failed.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("config '{0}' is not registered")]
    UnknownConfig(String),

    #[error("config '{config}': file {} is missing or not a regular file", .path.display())]
    NotAFile { config: String, path: PathBuf },

    #[error("config '{config}': serialization failed: {source}")]
    Serialize {
        config: String,
        #[source]
        source: ParseError,
    },

    #[error("config '{config}': failed to write {}: {source}", .path.display())]
    Write {
        config: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormatError),
}

/// Strict-mode type coercion failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct ConversionError {
    pub reason: String,
    /// Rendering of the offending value.
    pub value: String,
    /// JSON kind of the offending value (`string`, `number`, ...).
    pub found: &'static str,
    /// Display form of the requested target type.
    pub target: String,
}

impl ConversionError {
    pub fn new(reason: impl Into<String>, value: &Value, target: impl fmt::Display) -> Self {
        Self {
            reason: reason.into(),
            value: value.to_string(),
            found: value_kind(value),
            target: target.to_string(),
        }
    }

    /// Conversion rejected because no rule handles the requested target.
    pub fn unsupported(value: &Value, target: impl fmt::Display) -> Self {
        Self::new("unsupported conversion", value, target)
    }

    /// The converted value did not have the shape the field type expects.
    pub fn mismatch(value: &Value, target: impl fmt::Display) -> Self {
        Self::new("value does not fit the field type", value, target)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: from {}({}) to {}",
            self.reason, self.found, self.value, self.target
        )
    }
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Set(#[from] SetError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
