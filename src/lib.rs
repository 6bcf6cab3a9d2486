//! Declarative config binding and persistence.
//!
//! Struct fields are bound to dotted paths inside named config files. The
//! engine loads values into live instances with strict type conversion,
//! merges them back on save, and skips writes that would not change the
//! file.

pub mod binding;
pub mod context;
pub mod convert;
pub mod error;
pub mod format;
pub mod global;
pub mod logging;
pub mod path;
pub mod store;
pub mod types;

pub use binding::{
    BindingRegistry, Configurable, FieldOptions, LoadOutcome, LoadReport, SaveOutcome, Shared,
    TypeBinding, shared,
};
pub use context::{ConfigContext, ContextOptions};
pub use convert::{ConfigValue, ConversionMode, Json, TargetType};
pub use error::{ConversionError, Error, ReadError, Result, SaveError, SetError};
pub use format::{FormatParser, FormatRegistry, JsonParser, YamlParser};
pub use global::GlobalConfig;
pub use store::{ConfigFile, ConfigStore, InstanceFlush};
pub use types::{ConfigTree, Fingerprint, Value};
