//! Integration tests for reload and save under the per-name lock.
//!
//! - reload with a failing best-effort save still re-reads the file
//! - the lock is released on every path, so other threads can reload next
//! - reload and save of one name never interleave

use confbind::binding::{Configurable, TypeBinding, shared};
use confbind::error::ParseError;
use confbind::{ConfigContext, ConfigTree, FormatParser, FormatRegistry, JsonParser, ReadError, SaveError};
use serde_json::json;
use std::fs;
use std::sync::{Arc, OnceLock};
use std::thread;
use tempfile::TempDir;

/// Reads JSON but refuses to write anything.
struct ReadOnlyJson;

impl FormatParser for ReadOnlyJson {
    fn name(&self) -> &str {
        "read-only"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["cfg"]
    }

    fn parse(&self, content: &str) -> Result<ConfigTree, ParseError> {
        JsonParser.parse(content)
    }

    fn serialize(&self, _tree: &ConfigTree) -> Result<String, ParseError> {
        Err(ParseError::NotAMapping { found: "read-only" })
    }
}

#[derive(Debug, Default)]
struct Limits {
    max_connections: u32,
}

impl Configurable for Limits {
    fn binding() -> Option<&'static TypeBinding<Self>> {
        static BINDING: OnceLock<TypeBinding<Limits>> = OnceLock::new();
        Some(BINDING.get_or_init(|| {
            TypeBinding::<Self>::builder("limits", "")
                .field("max_connections", |l| &l.max_connections, |l| &mut l.max_connections)
                .build()
        }))
    }
}

fn context() -> ConfigContext {
    ConfigContext::new(FormatRegistry::default().with(ReadOnlyJson))
}

#[test]
fn test_reload_proceeds_when_save_first_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.cfg");
    fs::write(&path, r#"{"max_connections": 10}"#).unwrap();
    let context = Arc::new(context());
    let file = context.store().add_config_path(&path);

    let limits = shared(Limits::default());
    context.registry().load(&limits).unwrap();
    limits.write().max_connections = 99;

    // the instance save fails inside the flush, the reload still happens
    fs::write(&path, r#"{"max_connections": 20}"#).unwrap();
    context.registry().reload_config("limits", true).unwrap();
    assert_eq!(file.get("max_connections"), Some(json!(20)));
    assert!(!file.is_edited());

    // the lock was released: another thread can take it and reload
    fs::write(&path, r#"{"max_connections": 30}"#).unwrap();
    let other = Arc::clone(&context);
    thread::spawn(move || other.store().reload_config("limits", true))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(file.get("max_connections"), Some(json!(30)));
}

#[test]
fn test_failed_reload_releases_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.json");
    fs::write(&path, r#"{"max_connections": 5}"#).unwrap();
    let context = Arc::new(context());
    let file = context.store().add_config_path(&path);

    fs::write(&path, "{broken").unwrap();
    let err = context.store().reload_config("limits", false).unwrap_err();
    assert!(matches!(err, ReadError::Parse { .. }));
    // the tree is untouched by a failed reload
    assert_eq!(file.get("max_connections"), Some(json!(5)));

    fs::write(&path, r#"{"max_connections": 6}"#).unwrap();
    let other = Arc::clone(&context);
    thread::spawn(move || other.store().reload_config("limits", false))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(file.get("max_connections"), Some(json!(6)));
}

#[test]
fn test_store_save_reports_serialize_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.cfg");
    fs::write(&path, "{}").unwrap();
    let context = context();
    let file = context.store().add_config_path(&path);

    file.set("max_connections", json!(1));
    let err = context.store().save_config("limits").unwrap_err();
    assert!(matches!(err, SaveError::Serialize { ref config, .. } if config == "limits"));
    assert!(file.is_edited());
}

#[test]
fn test_reload_save_first_flushes_bound_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.yaml");
    fs::write(&path, "max_connections: 10\n").unwrap();
    let context = context();
    let file = context.store().add_config_path(&path);

    let limits = shared(Limits::default());
    context.registry().load(&limits).unwrap();
    limits.write().max_connections = 64;

    context.registry().reload_config("limits", true).unwrap();
    assert_eq!(file.get("max_connections"), Some(json!(64)));
    assert!(fs::read_to_string(&path).unwrap().contains("max_connections: 64"));
}

#[test]
fn test_store_reload_save_first_flushes_bound_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.json");
    fs::write(&path, r#"{"max_connections": 15}"#).unwrap();
    let context = context();
    let file = context.store().add_config_path(&path);

    let limits = shared(Limits::default());
    context.registry().load(&limits).unwrap();
    limits.write().max_connections = 25;

    context.store().reload_config("limits", true).unwrap();
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["max_connections"], json!(25));
    assert_eq!(file.get("max_connections"), Some(json!(25)));

    // without save_first the instance edit stays in memory only
    limits.write().max_connections = 35;
    context.store().reload_config("limits", false).unwrap();
    assert_eq!(file.get("max_connections"), Some(json!(25)));
}

#[test]
fn test_concurrent_saves_and_reloads_stay_consistent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.json");
    fs::write(&path, r#"{"max_connections": 0}"#).unwrap();
    let context = Arc::new(context());
    context.store().add_config_path(&path);

    let workers: Vec<_> = (0..4u32)
        .map(|worker| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let limits = shared(Limits {
                    max_connections: worker,
                });
                context.registry().load(&limits).unwrap();
                for round in 0..10u32 {
                    limits.write().max_connections = worker * 100 + round;
                    context.registry().save_config(&limits).unwrap();
                    context.registry().reload_config("limits", false).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // whatever save landed last, the file always parses and holds a number
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(on_disk["max_connections"].is_u64());
    let file = context.store().get_for_name("limits").unwrap();
    assert_eq!(file.get("max_connections"), Some(on_disk["max_connections"].clone()));
}
