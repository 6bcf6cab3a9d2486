//! Named config files with per-name locking.
//!
//! Every registered name owns one [`ConfigFile`] and one reentrant lock. The
//! lock is created on first use and reused for the life of the store; reload
//! and save of the same name serialize on it, different names never contend.

mod file;

pub use file::ConfigFile;

use crate::error::{ReadError, SaveError};
use crate::format::FormatRegistry;
use crate::types::ConfigTree;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub type NameLock = Arc<ReentrantMutex<()>>;

/// Writes live bound instances back into their config before a reload.
///
/// Called with the name's lock held, so implementations may save the same
/// name again.
pub trait InstanceFlush: Send + Sync {
    fn flush_instances(&self, name: &str) -> Result<(), SaveError>;
}

/// Registry of config files keyed by config name.
#[derive(Default)]
pub struct ConfigStore {
    formats: FormatRegistry,
    files: RwLock<HashMap<String, Arc<ConfigFile>>>,
    locks: Mutex<HashMap<String, NameLock>>,
    flusher: RwLock<Option<Weak<dyn InstanceFlush>>>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("formats", &self.formats)
            .field("names", &self.names())
            .field("flusher", &self.flusher.read().is_some())
            .finish()
    }
}

impl ConfigStore {
    pub fn new(formats: FormatRegistry) -> Self {
        Self {
            formats,
            files: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            flusher: RwLock::new(None),
        }
    }

    /// Route the save-first step of [`ConfigStore::reload_config`] through
    /// `flusher`. Only a weak handle is kept.
    pub fn set_instance_flush(&self, flusher: Weak<dyn InstanceFlush>) {
        *self.flusher.write() = Some(flusher);
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Register `path` under `name`.
    ///
    /// Missing parent directories and a missing file are created first. If the
    /// file cannot be read or parsed the failure is logged and the name is
    /// registered with an empty tree, so it stays addressable.
    pub fn add_config_file(&self, name: &str, path: impl AsRef<Path>) -> Arc<ConfigFile> {
        let path = path.as_ref();
        if let Err(e) = ensure_file(path) {
            error!(config = %name, path = %path.display(), "Failed to create config file: {}", e);
        }

        let parser = self.formats.parser_for(path);
        let file = ConfigFile::new(name.to_string(), path.to_path_buf(), parser, ConfigTree::new());
        match file.read() {
            Ok(tree) => {
                debug!(config = %name, keys = tree.len(), "Parsed config file");
                file.replace_tree(tree);
            }
            Err(e) => {
                error!(config = %name, path = %path.display(), "Failed to read config file: {}", e);
            }
        }

        let file = Arc::new(file);
        let previous = self
            .files
            .write()
            .insert(name.to_string(), Arc::clone(&file));
        if previous.is_some() {
            warn!(config = %name, "Config name re-registered, replacing previous file");
        }
        info!(config = %name, path = %path.display(), "Registered config file");
        file
    }

    /// Register `path` under its filename without extension.
    pub fn add_config_path(&self, path: impl AsRef<Path>) -> Arc<ConfigFile> {
        let path = path.as_ref();
        let name = config_name_for(path);
        self.add_config_file(&name, path)
    }

    /// Register every regular file below `dir`, at any depth.
    ///
    /// Returns the number of files registered. Entries that cannot be visited
    /// are logged and skipped.
    pub fn add_config_directory(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        let mut count = 0;
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), "Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            self.add_config_path(entry.path());
            count += 1;
        }
        info!(dir = %dir.display(), count, "Registered config directory");
        count
    }

    pub fn get_for_name(&self, name: &str) -> Option<Arc<ConfigFile>> {
        self.files.read().get(name).cloned()
    }

    /// Registered config names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The lock guarding reload and save of `name`.
    pub fn lock_for(&self, name: &str) -> NameLock {
        let mut locks = self.locks.lock();
        let lock = locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())));
        Arc::clone(lock)
    }

    /// Re-read `name` from disk.
    ///
    /// With `save_first`, live instances bound to `name` are saved through the
    /// installed [`InstanceFlush`], then any remaining in-memory edit of the
    /// tree is written. A failed save is logged and the reload proceeds.
    pub fn reload_config(&self, name: &str, save_first: bool) -> Result<(), ReadError> {
        self.reload_config_with(name, || {
            if !save_first {
                return Ok(());
            }
            let flusher = self.flusher.read().as_ref().and_then(Weak::upgrade);
            if let Some(flusher) = flusher {
                flusher.flush_instances(name)?;
            }
            match self.get_for_name(name) {
                Some(file) if !file.is_edited() => Ok(()),
                _ => self.save_config(name),
            }
        })
    }

    /// Re-read `name` from disk after running `flush` under the name's lock.
    ///
    /// A failing `flush` is logged and the reload proceeds. On success the
    /// in-memory tree is replaced and its edited flag cleared.
    pub fn reload_config_with<F, E>(&self, name: &str, flush: F) -> Result<(), ReadError>
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let file = self.get_for_name(name).ok_or_else(|| {
            warn!(config = %name, "Reload requested for unknown config");
            ReadError::UnknownConfig(name.to_string())
        })?;

        let lock = self.lock_for(name);
        let _guard = lock.lock();

        if let Err(e) = flush() {
            warn!(config = %name, "Save before reload failed, reloading anyway: {}", e);
        }

        match file.read() {
            Ok(tree) => {
                file.replace_tree(tree);
                info!(config = %name, "Reloaded config");
                Ok(())
            }
            Err(e) => {
                error!(config = %name, "Failed to reload config: {}", e);
                Err(e)
            }
        }
    }

    /// Write the in-memory tree of `name` to its file.
    pub fn save_config(&self, name: &str) -> Result<(), SaveError> {
        let file = self.get_for_name(name).ok_or_else(|| {
            warn!(config = %name, "Save requested for unknown config");
            SaveError::UnknownConfig(name.to_string())
        })?;

        let lock = self.lock_for(name);
        let _guard = lock.lock();

        match file.write() {
            Ok(()) => {
                info!(config = %name, "Saved config");
                Ok(())
            }
            Err(e) => {
                error!(config = %name, "Failed to save config: {}", e);
                Err(e)
            }
        }
    }

    /// Save every registered config; one failure does not stop the others.
    pub fn save_all_config(&self) -> Vec<SaveError> {
        self.names()
            .iter()
            .filter_map(|name| self.save_config(name).err())
            .collect()
    }
}

/// Filename without its extension: the text before the last dot, or the
/// whole name when the dot is missing, leading, or trailing.
pub fn config_name_for(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) if dot + 1 == file_name.len() => file_name,
        Some(dot) => file_name[..dot].to_string(),
    }
}

fn ensure_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_config_name_for() {
        assert_eq!(config_name_for(Path::new("/etc/app.json")), "app");
        assert_eq!(config_name_for(Path::new("server.prod.yaml")), "server.prod");
        assert_eq!(config_name_for(Path::new("README")), "README");
        assert_eq!(config_name_for(Path::new(".env")), ".env");
        assert_eq!(config_name_for(Path::new("odd.")), "odd.");
    }

    #[test]
    fn test_add_config_file_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.json");
        let store = ConfigStore::default();

        let file = store.add_config_file("app", &path);
        assert!(path.is_file());
        assert!(file.snapshot().is_empty());
        assert!(store.get_for_name("app").is_some());
    }

    #[test]
    fn test_add_config_file_tolerates_bad_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let store = ConfigStore::default();

        let file = store.add_config_file("broken", &path);
        assert!(file.snapshot().is_empty());
        assert_eq!(store.names(), vec!["broken".to_string()]);
    }

    #[test]
    fn test_lock_is_reused_per_name() {
        let store = ConfigStore::default();
        let a = store.lock_for("a");
        assert!(Arc::ptr_eq(&a, &store.lock_for("a")));
        assert!(!Arc::ptr_eq(&a, &store.lock_for("b")));
    }

    #[test]
    fn test_reload_replaces_tree_and_clears_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"port": 80}"#).unwrap();
        let store = ConfigStore::default();
        let file = store.add_config_path(&path);

        file.set("port", json!(9000));
        assert!(file.is_edited());
        fs::write(&path, r#"{"port": 8080}"#).unwrap();

        store.reload_config("app", false).unwrap();
        assert_eq!(file.get("port"), Some(json!(8080)));
        assert!(!file.is_edited());
    }

    #[test]
    fn test_reload_with_save_first_keeps_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.yaml");
        fs::write(&path, "port: 80\n").unwrap();
        let store = ConfigStore::default();
        let file = store.add_config_path(&path);

        file.set("port", json!(81));
        store.reload_config("app", true).unwrap();
        assert_eq!(file.get("port"), Some(json!(81)));
    }

    struct CountingFlush {
        calls: AtomicUsize,
    }

    impl InstanceFlush for CountingFlush {
        fn flush_instances(&self, _name: &str) -> Result<(), SaveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_reload_save_first_runs_installed_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"port": 80}"#).unwrap();
        let store = ConfigStore::default();
        store.add_config_path(&path);
        let flush = Arc::new(CountingFlush {
            calls: AtomicUsize::new(0),
        });
        let weak: Weak<CountingFlush> = Arc::downgrade(&flush);
        let weak: Weak<dyn InstanceFlush> = weak;
        store.set_instance_flush(weak);

        store.reload_config("app", false).unwrap();
        assert_eq!(flush.calls.load(Ordering::SeqCst), 0);
        store.reload_config("app", true).unwrap();
        assert_eq!(flush.calls.load(Ordering::SeqCst), 1);

        // a dropped flusher is skipped
        drop(flush);
        store.reload_config("app", true).unwrap();
    }

    #[test]
    fn test_reload_survives_failed_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"port": 80}"#).unwrap();
        let store = ConfigStore::default();
        store.add_config_path(&path);

        store
            .reload_config_with("app", || Err::<(), _>("disk full"))
            .unwrap();
        assert_eq!(store.get_for_name("app").unwrap().get("port"), Some(json!(80)));
    }

    #[test]
    fn test_unknown_names() {
        let store = ConfigStore::default();
        assert!(matches!(
            store.reload_config("nope", false),
            Err(ReadError::UnknownConfig(_))
        ));
        assert!(matches!(store.save_config("nope"), Err(SaveError::UnknownConfig(_))));
    }

    #[test]
    fn test_save_all_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::default();
        let good = store.add_config_file("good", dir.path().join("good.json"));
        let bad = store.add_config_file("bad", dir.path().join("bad.json"));
        good.set("ok", json!(true));
        bad.set("ok", json!(false));
        fs::remove_file(bad.path()).unwrap();

        let errors = store.save_all_config();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], SaveError::NotAFile { config, .. } if config == "bad"));
        let written = fs::read_to_string(good.path()).unwrap();
        assert!(written.contains("\"ok\": true"));
    }

    #[test]
    fn test_add_config_directory_recurses() {
        let dir = TempDir::new().unwrap();
        let root: PathBuf = dir.path().to_path_buf();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.json"), r#"{"x": 1}"#).unwrap();
        fs::write(root.join("a/mid.yaml"), "y: 2\n").unwrap();
        fs::write(root.join("a/b/deep.yml"), "z: 3\n").unwrap();

        let store = ConfigStore::default();
        assert_eq!(store.add_config_directory(&root), 3);
        assert_eq!(store.names(), vec!["deep", "mid", "top"]);
        assert_eq!(store.get_for_name("deep").unwrap().get("z"), Some(json!(3)));
    }
}
