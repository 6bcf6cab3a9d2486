//! Dotted-path access into nested config trees.
//!
//! A path such as `db.pool.size` descends one mapping level per segment.
//! Reads never create anything; writes create the intermediate mappings they
//! need and report whether the tree actually changed.

use crate::types::{ConfigTree, Value};
use serde_json::Number;
use tracing::warn;

/// Literal segment separator.
pub const SEPARATOR: char = '.';

/// Join a root path and a sub path, omitting the separator when either side
/// is empty.
pub fn join(root: &str, sub: &str) -> String {
    match (root.is_empty(), sub.is_empty()) {
        (true, _) => sub.to_string(),
        (false, true) => root.to_string(),
        (false, false) => format!("{root}{SEPARATOR}{sub}"),
    }
}

/// Look up the value stored at `path`.
///
/// Returns `None` when the path or tree is empty, when any intermediate
/// segment is missing or is not itself a mapping, or when the leaf is
/// missing or `null`.
pub fn get<'a>(tree: &'a ConfigTree, path: &str) -> Option<&'a Value> {
    if path.is_empty() || tree.is_empty() {
        return None;
    }

    let mut segments = path.split(SEPARATOR);
    let mut current = tree;
    let mut leaf = segments.next()?;
    for next in segments {
        current = current.get(leaf)?.as_object()?;
        leaf = next;
    }

    current.get(leaf).filter(|value| !value.is_null())
}

/// Store `value` at `path`, creating intermediate mappings as needed.
///
/// An intermediate segment currently holding a scalar or sequence is replaced
/// by an empty mapping; the discarded value is logged. Returns `true` when
/// the leaf did not previously hold a value equal to `value` under
/// [`values_equal`].
///
/// A stored `null` reads back as absent through [`get`].
pub fn set(tree: &mut ConfigTree, path: &str, value: Value) -> bool {
    if path.is_empty() {
        return false;
    }

    let (parents, leaf) = match path.rsplit_once(SEPARATOR) {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = tree;
    if let Some(parents) = parents {
        for segment in parents.split(SEPARATOR) {
            let slot = current
                .entry(segment)
                .or_insert_with(|| Value::Object(ConfigTree::new()));
            if !slot.is_object() {
                warn!(
                    path,
                    segment,
                    discarded = %slot,
                    "Replacing non-mapping value with a nested mapping"
                );
            }
            current = ensure_object(slot);
        }
    }

    let changed = !current
        .get(leaf)
        .is_some_and(|existing| values_equal(existing, &value));
    current.insert(leaf.to_string(), value);
    changed
}

fn ensure_object(slot: &mut Value) -> &mut ConfigTree {
    if !slot.is_object() {
        *slot = Value::Object(ConfigTree::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with a mapping"),
    }
}

/// Semantic equality used for change detection.
///
/// Null only equals null. Sequences compare element-wise with the same rules.
/// Numbers compare after converting `existing` to the numeric kind of
/// `incoming`, so `1.0` stored as a double equals an incoming `1.0` float and
/// an integer `1` equals an incoming `1.0`. Everything else is structural.
pub fn values_equal(existing: &Value, incoming: &Value) -> bool {
    match (existing, incoming) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        _ => existing == incoming,
    }
}

fn numbers_equal(existing: &Number, incoming: &Number) -> bool {
    if let Some(target) = incoming.as_i64() {
        return integer_of(existing).is_some_and(|n| n == i128::from(target));
    }
    if let Some(target) = incoming.as_u64() {
        return integer_of(existing).is_some_and(|n| n == i128::from(target));
    }
    match (existing.as_f64(), incoming.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Integer view of a number; floats convert only when no information is lost.
fn integer_of(number: &Number) -> Option<i128> {
    if let Some(n) = number.as_i64() {
        return Some(i128::from(n));
    }
    if let Some(n) = number.as_u64() {
        return Some(i128::from(n));
    }
    let f = number.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= u64::MAX as f64 {
        Some(f as i128)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("db", "port"), "db.port");
        assert_eq!(join("", "port"), "port");
        assert_eq!(join("db", ""), "db");
        assert_eq!(join("", ""), "");
    }

    #[test]
    fn test_get_nested() {
        let t = tree(json!({"db": {"pool": {"size": 8}}}));
        assert_eq!(get(&t, "db.pool.size"), Some(&json!(8)));
        assert_eq!(get(&t, "db.pool"), Some(&json!({"size": 8})));
    }

    #[test]
    fn test_get_absent_cases() {
        let t = tree(json!({"db": {"host": "localhost", "none": null}, "port": 1}));
        assert_eq!(get(&t, ""), None);
        assert_eq!(get(&ConfigTree::new(), "db"), None);
        assert_eq!(get(&t, "db.missing"), None);
        assert_eq!(get(&t, "missing.host"), None);
        // intermediate segment is a scalar
        assert_eq!(get(&t, "port.value"), None);
        assert_eq!(get(&t, "db.host.x"), None);
        assert_eq!(get(&t, "db.none"), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut t = ConfigTree::new();
        assert!(set(&mut t, "a.b.c", json!("x")));
        assert_eq!(Value::Object(t.clone()), json!({"a": {"b": {"c": "x"}}}));
        assert_eq!(get(&t, "a.b.c"), Some(&json!("x")));
    }

    #[test]
    fn test_set_replaces_intermediate_scalar() {
        let mut t = tree(json!({"a": 5}));
        assert!(set(&mut t, "a.b", json!(true)));
        assert_eq!(Value::Object(t), json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_reports_unchanged() {
        let mut t = tree(json!({"db": {"port": 5432, "tags": ["a", "b"]}}));
        assert!(!set(&mut t, "db.port", json!(5432)));
        assert!(!set(&mut t, "db.tags", json!(["a", "b"])));
        assert!(set(&mut t, "db.tags", json!(["a"])));
        assert!(set(&mut t, "db.port", json!(5433)));
        assert_eq!(get(&t, "db.port"), Some(&json!(5433)));
    }

    #[test]
    fn test_set_numeric_cross_type_tolerance() {
        let mut t = tree(json!({"ratio": 1.0, "count": 3}));
        // stored double 1.0, incoming float rendered as 1.0
        assert!(!set(&mut t, "ratio", Value::from(1.0f32)));
        assert!(!set(&mut t, "count", json!(3.0)));
        assert!(set(&mut t, "count", json!(3.5)));
    }

    #[test]
    fn test_set_null_transitions() {
        let mut t = tree(json!({"a": null}));
        assert!(!set(&mut t, "a", Value::Null));
        assert!(set(&mut t, "a", json!(1)));
        assert!(set(&mut t, "a", Value::Null));
        assert_eq!(get(&t, "a"), None);
        assert!(t.contains_key("a"));
    }

    #[test]
    fn test_set_empty_path_is_noop() {
        let mut t = ConfigTree::new();
        assert!(!set(&mut t, "", json!(1)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_values_equal_float_to_int() {
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!(2.5), &json!(2)));
        assert!(values_equal(&json!(2.0), &json!(2)));
        assert!(!values_equal(&json!("2"), &json!(2)));
    }
}
