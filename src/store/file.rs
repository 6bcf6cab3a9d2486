//! One registered config file and its in-memory tree.

use crate::error::{ReadError, SaveError, UnsupportedFormatError};
use crate::format::FormatParser;
use crate::path;
use crate::types::{ConfigTree, Fingerprint, Value};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A named config document backed by a file on disk.
///
/// Shared as `Arc<ConfigFile>`; reloads and saves update it in place so every
/// holder sees the current tree.
pub struct ConfigFile {
    name: String,
    path: PathBuf,
    parser: Result<Arc<dyn FormatParser>, UnsupportedFormatError>,
    tree: RwLock<ConfigTree>,
    /// Fingerprint of the tree last read from or written to disk.
    fingerprint: Mutex<Fingerprint>,
    edited: AtomicBool,
}

impl ConfigFile {
    pub(crate) fn new(
        name: String,
        path: PathBuf,
        parser: Result<Arc<dyn FormatParser>, UnsupportedFormatError>,
        tree: ConfigTree,
    ) -> Self {
        let fingerprint = Fingerprint::of(&tree);
        Self {
            name,
            path,
            parser,
            tree: RwLock::new(tree),
            fingerprint: Mutex::new(fingerprint),
            edited: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the parser handling this file, if one matched its extension.
    pub fn format(&self) -> Option<&str> {
        self.parser.as_ref().ok().map(|parser| parser.name())
    }

    /// Value stored at a dotted path.
    pub fn get(&self, path: &str) -> Option<Value> {
        path::get(&self.tree.read(), path).cloned()
    }

    /// Store a value at a dotted path. Returns whether the tree changed; a
    /// change marks the file edited until the next reload or write.
    pub fn set(&self, path: &str, value: Value) -> bool {
        let changed = path::set(&mut self.tree.write(), path, value);
        if changed {
            self.edited.store(true, Ordering::Release);
        }
        changed
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> ConfigTree {
        self.tree.read().clone()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        *self.fingerprint.lock()
    }

    /// Whether the tree was modified since it was last read or written.
    pub fn is_edited(&self) -> bool {
        self.edited.load(Ordering::Acquire)
    }

    /// Apply path/value entries and return the fingerprint of the result.
    pub(crate) fn merge<I>(&self, entries: I) -> Fingerprint
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut tree = self.tree.write();
        let mut changed = false;
        for (path, value) in entries {
            changed |= path::set(&mut tree, &path, value);
        }
        if changed {
            self.edited.store(true, Ordering::Release);
        }
        Fingerprint::of(&tree)
    }

    /// Read and parse the backing file.
    pub(crate) fn read(&self) -> Result<ConfigTree, ReadError> {
        let parser = self.parser.clone()?;
        read_tree(&self.path, parser.as_ref())
    }

    /// Swap in a freshly read tree and forget pending edits.
    pub(crate) fn replace_tree(&self, tree: ConfigTree) {
        let fingerprint = Fingerprint::of(&tree);
        *self.tree.write() = tree;
        *self.fingerprint.lock() = fingerprint;
        self.edited.store(false, Ordering::Release);
    }

    /// Serialize the current tree and overwrite the file (truncate, then
    /// write).
    pub(crate) fn write(&self) -> Result<(), SaveError> {
        let parser = self.parser.clone()?;

        if !fs::metadata(&self.path).is_ok_and(|meta| meta.is_file()) {
            return Err(SaveError::NotAFile {
                config: self.name.clone(),
                path: self.path.clone(),
            });
        }

        let tree = self.snapshot();
        let text = parser.serialize(&tree).map_err(|source| SaveError::Serialize {
            config: self.name.clone(),
            source,
        })?;
        fs::write(&self.path, text).map_err(|source| SaveError::Write {
            config: self.name.clone(),
            path: self.path.clone(),
            source,
        })?;

        *self.fingerprint.lock() = Fingerprint::of(&tree);
        self.edited.store(false, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFile")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("format", &self.format())
            .field("fingerprint", &self.fingerprint())
            .field("edited", &self.is_edited())
            .finish()
    }
}

pub(crate) fn read_tree(path: &Path, parser: &dyn FormatParser) -> Result<ConfigTree, ReadError> {
    if !fs::metadata(path).is_ok_and(|meta| meta.is_file()) {
        return Err(ReadError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parser.parse(&content).map_err(|source| ReadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
