//! Explicitly constructed engine context.
//!
//! Owns the store and the binding registry that would otherwise be process
//! globals, so tests and embedders can run independent engines side by side.

use crate::binding::BindingRegistry;
use crate::format::FormatRegistry;
use crate::global::GlobalConfig;
use crate::store::ConfigStore;
use anyhow::{Context as _, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Directory registered at start-up.
pub const CONFIG_DIR_ENV: &str = "CONFBIND_CONFIG_DIR";
/// Comma-separated config files registered at start-up.
pub const FILES_ENV: &str = "CONFBIND_FILES";

/// Start-up registration options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub config_dir: Option<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl ContextOptions {
    /// Read options from `CONFBIND_CONFIG_DIR` and `CONFBIND_FILES`.
    pub fn discover() -> Self {
        Self::from_vars(
            std::env::var(CONFIG_DIR_ENV).ok(),
            std::env::var(FILES_ENV).ok(),
        )
    }

    /// Build options from raw variable values.
    pub fn from_vars(config_dir: Option<String>, files: Option<String>) -> Self {
        let config_dir = config_dir
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let files = files
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|file| !file.is_empty())
            .map(PathBuf::from)
            .collect();
        Self { config_dir, files }
    }
}

/// A store plus the registry bound to it.
#[derive(Debug)]
pub struct ConfigContext {
    store: Arc<ConfigStore>,
    registry: Arc<BindingRegistry>,
}

impl ConfigContext {
    pub fn new(formats: FormatRegistry) -> Self {
        let store = Arc::new(ConfigStore::new(formats));
        let registry = BindingRegistry::attached(Arc::clone(&store));
        Self { store, registry }
    }

    /// A context with the default formats and `options` registered.
    pub fn with_options(options: &ContextOptions) -> Self {
        let context = Self::default();
        if let Some(dir) = &options.config_dir {
            context.store.add_config_directory(dir);
        }
        for file in &options.files {
            context.store.add_config_path(file);
        }
        context
    }

    /// A context configured from the environment.
    ///
    /// Fails when `CONFBIND_CONFIG_DIR` names something other than a
    /// directory.
    pub fn from_env() -> anyhow::Result<Self> {
        let options = ContextOptions::discover();
        if let Some(dir) = &options.config_dir {
            let meta = std::fs::metadata(dir)
                .with_context(|| format!("{} points at {}", CONFIG_DIR_ENV, dir.display()))?;
            if !meta.is_dir() {
                bail!("{} is not a directory: {}", CONFIG_DIR_ENV, dir.display());
            }
        }
        let context = Self::with_options(&options);
        info!(configs = context.store.names().len(), "Config context ready");
        Ok(context)
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Typed accessor over the config registered as `name`.
    pub fn global(&self, name: &str) -> Option<GlobalConfig> {
        self.store.get_for_name(name).map(GlobalConfig::new)
    }
}

impl Default for ConfigContext {
    fn default() -> Self {
        Self::new(FormatRegistry::default())
    }
}
