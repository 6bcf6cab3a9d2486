//! Weak tracking of bound instances, plus instance-level load and save.

use super::{Configurable, Shared, TypeBinding};
use crate::error::{ReadError, SaveError, SetError};
use crate::store::{ConfigFile, ConfigStore, InstanceFlush};
use crate::types::Value;
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::any::{Any, type_name};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Type-erased view of a tracked instance.
pub trait BoundInstance: Send + Sync {
    /// Rust type name of the bound value.
    fn type_name(&self) -> &'static str;

    /// Config name from the type's binding, if it has one.
    fn config_name(&self) -> Option<&'static str>;

    /// Path/value pairs of the saved fields.
    fn entries(&self) -> Vec<(String, Value)>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Configurable> BoundInstance for RwLock<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn config_name(&self) -> Option<&'static str> {
        T::binding().map(TypeBinding::config_name)
    }

    fn entries(&self) -> Vec<(String, Value)> {
        T::binding()
            .map(|binding| binding.entries(&self.read()))
            .unwrap_or_default()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Per-field result of a load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Full paths whose values were assigned.
    pub applied: Vec<String>,
    /// Full paths with no value in the tree; those fields kept their value.
    pub missing: Vec<String>,
    pub failed: Vec<SetError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// The type carries no binding metadata; nothing happened.
    Unbound,
    Loaded(LoadReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The type carries no binding metadata; nothing happened.
    Unbound,
    /// The merged tree matched the file; no write was made.
    Unchanged,
    Written,
}

/// Tracks live bound instances and moves field values between them and the
/// store.
///
/// Only weak handles are kept, so tracking never extends an instance's life.
/// Dropped instances are pruned whenever the live set is enumerated.
pub struct BindingRegistry {
    store: Arc<ConfigStore>,
    instances: ArcSwap<Vec<Weak<dyn BoundInstance>>>,
}

impl BindingRegistry {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            instances: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// A registry that `store` flushes through when reloading with
    /// `save_first`.
    pub fn attached(store: Arc<ConfigStore>) -> Arc<Self> {
        let registry = Arc::new(Self::new(Arc::clone(&store)));
        let weak: Weak<Self> = Arc::downgrade(&registry);
        let weak: Weak<dyn InstanceFlush> = weak;
        store.set_instance_flush(weak);
        registry
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Populate `instance` from its config file.
    ///
    /// Fields whose path is missing keep their value; fields whose value
    /// cannot be converted are reported in [`LoadReport::failed`] and never
    /// stop the remaining fields.
    pub fn load<T: Configurable>(&self, instance: &Shared<T>) -> Result<LoadOutcome, ReadError> {
        let Some(binding) = T::binding() else {
            debug!(instance = type_name::<T>(), "No binding metadata, skipping load");
            return Ok(LoadOutcome::Unbound);
        };

        self.track(instance);

        let config = binding.config_name();
        let file = self.store.get_for_name(config).ok_or_else(|| {
            warn!(config = %config, instance = type_name::<T>(), "Load requested for unknown config");
            ReadError::UnknownConfig(config.to_string())
        })?;

        let lock = self.store.lock_for(config);
        let _guard = lock.lock();
        let report = apply_fields(binding, &mut instance.write(), &file);

        info!(
            config = %config,
            instance = type_name::<T>(),
            applied = report.applied.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Loaded config into instance"
        );
        Ok(LoadOutcome::Loaded(report))
    }

    /// Merge the saved fields of `instance` into its config tree and write the
    /// file, unless the merged tree matches what is already on disk.
    pub fn save_config<T: Configurable>(&self, instance: &Shared<T>) -> Result<SaveOutcome, SaveError> {
        let Some(binding) = T::binding() else {
            debug!(instance = type_name::<T>(), "No binding metadata, skipping save");
            return Ok(SaveOutcome::Unbound);
        };
        let entries = binding.entries(&instance.read());
        self.save_entries(binding.config_name(), type_name::<T>(), entries)
    }

    /// Save every live instance; failures are collected and the rest are
    /// still saved.
    pub fn save_all_config(&self) -> Vec<SaveError> {
        self.alive_instances()
            .iter()
            .filter_map(|instance| self.save_dyn(instance.as_ref()).err())
            .collect()
    }

    /// Re-read `name` from disk, first saving every live instance bound to it
    /// when `save_first` is set. A failed save does not prevent the reload.
    pub fn reload_config(&self, name: &str, save_first: bool) -> Result<(), ReadError> {
        self.store.reload_config_with(name, || {
            if save_first {
                self.flush_instances(name)
            } else {
                Ok(())
            }
        })
    }

    /// Live tracked instances. Entries whose instance was dropped are removed.
    pub fn alive_instances(&self) -> Vec<Arc<dyn BoundInstance>> {
        let current = self.instances.load();
        let alive: Vec<Arc<dyn BoundInstance>> = current.iter().filter_map(Weak::upgrade).collect();
        if alive.len() != current.len() {
            self.prune();
        }
        alive
    }

    /// Live tracked instances of type `T`.
    pub fn alive_instances_of<T: Configurable>(&self) -> Vec<Shared<T>> {
        self.alive_instances()
            .into_iter()
            .filter_map(|instance| instance.into_any().downcast::<RwLock<T>>().ok())
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive_instances().len()
    }

    /// Start tracking `instance`; the same allocation is tracked once.
    fn track<T: Configurable>(&self, instance: &Shared<T>) {
        let weak: Weak<RwLock<T>> = Arc::downgrade(instance);
        let weak: Weak<dyn BoundInstance> = weak;
        let mut added = false;
        self.instances.rcu(|current| {
            added = !current.iter().any(|existing| Weak::ptr_eq(existing, &weak));
            let mut next = Vec::clone(current);
            if added {
                next.push(weak.clone());
            }
            next
        });
        if added {
            debug!(instance = type_name::<T>(), "Tracking bound instance");
        }
    }

    /// Drop dead handles. Handles added concurrently survive because `rcu`
    /// retries against the latest list.
    fn prune(&self) {
        self.instances.rcu(|current| {
            current
                .iter()
                .filter(|handle| handle.strong_count() > 0)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    fn save_dyn(&self, instance: &dyn BoundInstance) -> Result<SaveOutcome, SaveError> {
        match instance.config_name() {
            Some(config) => self.save_entries(config, instance.type_name(), instance.entries()),
            None => Ok(SaveOutcome::Unbound),
        }
    }

    fn save_entries(
        &self,
        config: &str,
        instance: &str,
        entries: Vec<(String, Value)>,
    ) -> Result<SaveOutcome, SaveError> {
        let file = self.store.get_for_name(config).ok_or_else(|| {
            warn!(config = %config, instance = %instance, "Save requested for unknown config");
            SaveError::UnknownConfig(config.to_string())
        })?;

        let lock = self.store.lock_for(config);
        let _guard = lock.lock();

        let merged = file.merge(entries);
        if merged == file.fingerprint() {
            info!(config = %config, instance = %instance, "No changes, skipping write");
            return Ok(SaveOutcome::Unchanged);
        }

        match file.write() {
            Ok(()) => {
                info!(config = %config, instance = %instance, "Saved instance config");
                Ok(SaveOutcome::Written)
            }
            Err(e) => {
                error!(config = %config, instance = %instance, "Failed to save instance config: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("store", &self.store)
            .field("tracked", &self.instances.load().len())
            .finish()
    }
}

impl InstanceFlush for BindingRegistry {
    /// Save every live instance bound to `name`, returning the first failure.
    fn flush_instances(&self, name: &str) -> Result<(), SaveError> {
        let mut errors = self
            .alive_instances()
            .iter()
            .filter(|instance| instance.config_name() == Some(name))
            .filter_map(|instance| self.save_dyn(instance.as_ref()).err())
            .collect::<Vec<_>>();
        match errors.len() {
            0 => Ok(()),
            _ => Err(errors.swap_remove(0)),
        }
    }
}

fn apply_fields<T>(binding: &TypeBinding<T>, instance: &mut T, file: &ConfigFile) -> LoadReport
where
    T: Configurable,
{
    let mut report = LoadReport::default();
    for field in binding.fields() {
        let path = binding.full_path(field);
        let Some(raw) = file.get(&path) else {
            warn!(config = %file.name(), path = %path, field = field.name(), "No value in config, keeping default");
            report.missing.push(path);
            continue;
        };
        match field.write(instance, &raw) {
            Ok(()) => {
                debug!(config = %file.name(), path = %path, field = field.name(), "Set field");
                report.applied.push(path);
            }
            Err(source) => {
                let err = SetError {
                    field: field.name().to_string(),
                    instance: type_name::<T>().to_string(),
                    path,
                    source,
                };
                warn!(config = %file.name(), "{}", err);
                report.failed.push(err);
            }
        }
    }
    report
}
