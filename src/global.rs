//! Typed read access to one config file plus a pending-override layer.
//!
//! Getters never fail: a missing path or a value that cannot be converted
//! yields the caller's default. Overrides recorded with [`GlobalConfig::set`]
//! are kept apart from the file's tree; applying them is up to the caller.

use crate::convert::{ConfigValue, ConversionMode, TargetType, convert, convert_to};
use crate::store::ConfigFile;
use crate::types::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct GlobalConfig {
    file: Arc<ConfigFile>,
    pending: RwLock<BTreeMap<String, Value>>,
}

impl GlobalConfig {
    pub fn new(file: Arc<ConfigFile>) -> Self {
        Self {
            file,
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn file(&self) -> &Arc<ConfigFile> {
        &self.file
    }

    /// Value at `path` converted to `T`, or `default`.
    pub fn get<T: ConfigValue>(&self, path: &str, default: T) -> T {
        let Some(raw) = self.raw(path) else {
            return default;
        };
        match convert_to::<T>(&raw, ConversionMode::Strict) {
            Ok(value) => value,
            Err(e) => {
                warn!(config = %self.file.name(), path = %path, "Using default: {}", e);
                default
            }
        }
    }

    /// Untyped form of [`GlobalConfig::get`]: the value converted to the
    /// canonical shape of `target`, or `default`.
    pub fn get_value(&self, path: &str, default: Value, target: &TargetType) -> Value {
        let Some(raw) = self.raw(path) else {
            return default;
        };
        match convert(&raw, target, ConversionMode::Strict) {
            Ok(value) => value,
            Err(e) => {
                warn!(config = %self.file.name(), path = %path, "Using default: {}", e);
                default
            }
        }
    }

    pub fn get_string(&self, path: &str, default: &str) -> String {
        self.get(path, default.to_string())
    }

    pub fn get_i32(&self, path: &str, default: i32) -> i32 {
        self.get(path, default)
    }

    pub fn get_i64(&self, path: &str, default: i64) -> i64 {
        self.get(path, default)
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path, default)
    }

    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        self.get(path, default)
    }

    /// Sequence at `path`; comma-separated text is split.
    pub fn get_list(&self, path: &str, default: Vec<Value>) -> Vec<Value> {
        self.get(path, default)
    }

    pub fn get_string_list(&self, path: &str, default: Vec<String>) -> Vec<String> {
        self.get(path, default)
    }

    /// Record a pending override for `path`. Blank paths are ignored.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        if path.trim().is_empty() {
            warn!(config = %self.file.name(), "Ignoring override with blank path");
            return;
        }
        let value = value.into();
        debug!(config = %self.file.name(), path = %path, value = %value, "Recorded override");
        self.pending.write().insert(path.to_string(), value);
    }

    /// Discard the pending override for `path`, returning it.
    pub fn cancel_set(&self, path: &str) -> Option<Value> {
        if path.trim().is_empty() {
            warn!(config = %self.file.name(), "Ignoring cancel with blank path");
            return None;
        }
        self.pending.write().remove(path)
    }

    pub fn cancel_all_set(&self) {
        self.pending.write().clear();
    }

    /// Snapshot of the pending overrides, ordered by path.
    pub fn pending(&self) -> BTreeMap<String, Value> {
        self.pending.read().clone()
    }

    fn raw(&self, path: &str) -> Option<Value> {
        if path.trim().is_empty() {
            warn!(config = %self.file.name(), "Lookup with blank path");
            return None;
        }
        let raw = self.file.get(path);
        if raw.is_none() {
            debug!(config = %self.file.name(), path = %path, "No value, using default");
        }
        raw
    }
}

impl std::fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("config", &self.file.name())
            .field("pending", &self.pending.read().len())
            .finish()
    }
}
