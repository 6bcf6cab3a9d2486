//! Per-type binding tables: which field lives at which config path.
//!
//! A type opts in by implementing [`Configurable`] and returning a
//! [`TypeBinding`] built once, usually inside a `OnceLock`:
//!
//! ```
//! use confbind::binding::{Configurable, FieldOptions, TypeBinding};
//! use std::sync::OnceLock;
//!
//! #[derive(Default)]
//! struct Database {
//!     host: String,
//!     port: u16,
//!     password: String,
//! }
//!
//! impl Configurable for Database {
//!     fn binding() -> Option<&'static TypeBinding<Self>> {
//!         static BINDING: OnceLock<TypeBinding<Database>> = OnceLock::new();
//!         Some(BINDING.get_or_init(|| {
//!             TypeBinding::<Database>::builder("config", "db")
//!                 .field("host", |d| &d.host, |d| &mut d.host)
//!                 .field_with("port", FieldOptions::at("net.port"), |d| &d.port, |d| &mut d.port)
//!                 .field_with("password", FieldOptions::default().disposable(), |d| &d.password, |d| &mut d.password)
//!                 .build()
//!         }))
//!     }
//! }
//!
//! let binding = Database::binding().unwrap();
//! assert_eq!(binding.full_path(&binding.fields()[1]), "db.net.port");
//! ```

mod registry;

pub use registry::{BindingRegistry, BoundInstance, LoadOutcome, LoadReport, SaveOutcome};

use crate::convert::{ConfigValue, ConversionMode, TargetType, convert_to};
use crate::error::ConversionError;
use crate::path;
use crate::types::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A bound instance as owned by callers. The registry only keeps weak
/// handles to it.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value for loading and saving through a [`BindingRegistry`].
pub fn shared<T: Configurable>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// A type whose fields can be bound to a config file.
pub trait Configurable: Send + Sync + Sized + 'static {
    /// The type's binding table, or `None` if it carries no metadata.
    fn binding() -> Option<&'static TypeBinding<Self>> {
        None
    }
}

/// Per-field binding options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Path below the type's root; empty means the field name.
    pub sub_path: String,
    /// Loaded but never saved.
    pub disposable: bool,
}

impl FieldOptions {
    pub fn at(sub_path: impl Into<String>) -> Self {
        Self {
            sub_path: sub_path.into(),
            disposable: false,
        }
    }

    pub fn disposable(mut self) -> Self {
        self.disposable = true;
        self
    }
}

type Reader<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Writer<T> = Box<dyn Fn(&mut T, &Value) -> Result<(), ConversionError> + Send + Sync>;

/// One field of `T` bound to a config path.
pub struct FieldBinding<T> {
    name: String,
    options: FieldOptions,
    target: TargetType,
    read: Reader<T>,
    write: Writer<T>,
}

impl<T> FieldBinding<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path below the type root: the sub-path, or the field name.
    pub fn path(&self) -> &str {
        if self.options.sub_path.is_empty() {
            &self.name
        } else {
            &self.options.sub_path
        }
    }

    pub fn is_disposable(&self) -> bool {
        self.options.disposable
    }

    pub fn target_type(&self) -> &TargetType {
        &self.target
    }

    /// Current field value in config form.
    pub fn read(&self, instance: &T) -> Value {
        (self.read)(instance)
    }

    /// Convert `raw` strictly to the field type and assign it.
    pub fn write(&self, instance: &mut T, raw: &Value) -> Result<(), ConversionError> {
        (self.write)(instance, raw)
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("disposable", &self.options.disposable)
            .field("target", &self.target)
            .finish()
    }
}

/// Resolved binding table of one type.
pub struct TypeBinding<T> {
    config_name: String,
    root_path: String,
    fields: Vec<FieldBinding<T>>,
}

impl<T: 'static> TypeBinding<T> {
    pub fn builder(config_name: impl Into<String>, root_path: impl Into<String>) -> TypeBindingBuilder<T> {
        TypeBindingBuilder {
            config_name: config_name.into(),
            root_path: root_path.into(),
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn fields(&self) -> &[FieldBinding<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldBinding<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Root path joined with the field's path.
    pub fn full_path(&self, field: &FieldBinding<T>) -> String {
        path::join(&self.root_path, field.path())
    }

    /// Path/value pairs of every field that is saved.
    pub fn entries(&self, instance: &T) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .filter(|field| !field.is_disposable())
            .map(|field| (self.full_path(field), field.read(instance)))
            .collect()
    }
}

impl<T> fmt::Debug for TypeBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("config_name", &self.config_name)
            .field("root_path", &self.root_path)
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct TypeBindingBuilder<T> {
    config_name: String,
    root_path: String,
    own: Vec<FieldBinding<T>>,
    inherited: Vec<FieldBinding<T>>,
}

impl<T: 'static> TypeBindingBuilder<T> {
    /// Bind a field at `root.name`.
    pub fn field<V, G, M>(self, name: &str, get: G, get_mut: M) -> Self
    where
        V: ConfigValue + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        self.field_with(name, FieldOptions::default(), get, get_mut)
    }

    /// Bind a field with explicit options.
    pub fn field_with<V, G, M>(mut self, name: &str, options: FieldOptions, get: G, get_mut: M) -> Self
    where
        V: ConfigValue + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        self.own.push(FieldBinding {
            name: name.to_string(),
            options,
            target: V::target_type(),
            read: Box::new(move |instance: &T| get(instance).to_config()),
            write: Box::new(move |instance: &mut T, raw: &Value| {
                *get_mut(instance) = convert_to::<V>(raw, ConversionMode::Strict)?;
                Ok(())
            }),
        });
        self
    }

    /// Include the fields of an embedded ancestor type, resolved under this
    /// type's root. Fields declared directly on this type take precedence.
    pub fn inherit<P, G, M>(mut self, get: G, get_mut: M) -> Self
    where
        P: Configurable,
        G: Fn(&T) -> &P + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        let Some(parent) = P::binding() else {
            return self;
        };
        let get = Arc::new(get);
        let get_mut = Arc::new(get_mut);
        for field in parent.fields() {
            let get = Arc::clone(&get);
            let get_mut = Arc::clone(&get_mut);
            self.inherited.push(FieldBinding {
                name: field.name.clone(),
                options: field.options.clone(),
                target: field.target.clone(),
                read: Box::new(move |instance: &T| field.read(get(instance))),
                write: Box::new(move |instance: &mut T, raw: &Value| {
                    field.write(get_mut(instance), raw)
                }),
            });
        }
        self
    }

    pub fn build(self) -> TypeBinding<T> {
        let mut fields = self.own;
        for field in self.inherited {
            if !fields.iter().any(|existing| existing.name == field.name) {
                fields.push(field);
            }
        }
        TypeBinding {
            config_name: self.config_name,
            root_path: self.root_path,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::OnceLock;

    #[derive(Default)]
    struct Base {
        host: String,
        retries: u8,
    }

    impl Configurable for Base {
        fn binding() -> Option<&'static TypeBinding<Self>> {
            static BINDING: OnceLock<TypeBinding<Base>> = OnceLock::new();
            Some(BINDING.get_or_init(|| {
                TypeBinding::<Self>::builder("config", "base")
                    .field("host", |b| &b.host, |b| &mut b.host)
                    .field("retries", |b| &b.retries, |b| &mut b.retries)
                    .build()
            }))
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        retries: u32,
        token: String,
    }

    impl Configurable for Derived {
        fn binding() -> Option<&'static TypeBinding<Self>> {
            static BINDING: OnceLock<TypeBinding<Derived>> = OnceLock::new();
            Some(BINDING.get_or_init(|| {
                TypeBinding::<Self>::builder("config", "svc")
                    .inherit(|d: &Derived| &d.base, |d: &mut Derived| &mut d.base)
                    .field_with("retries", FieldOptions::at("policy.retries"), |d| &d.retries, |d| &mut d.retries)
                    .field_with("token", FieldOptions::default().disposable(), |d| &d.token, |d| &mut d.token)
                    .build()
            }))
        }
    }

    struct Plain;
    impl Configurable for Plain {}

    #[test]
    fn test_full_path_resolution() {
        let binding = Derived::binding().unwrap();
        let retries = binding.field("retries").unwrap();
        assert_eq!(binding.full_path(retries), "svc.policy.retries");
        let host = binding.field("host").unwrap();
        assert_eq!(binding.full_path(host), "svc.host");
    }

    #[test]
    fn test_most_derived_field_wins() {
        let binding = Derived::binding().unwrap();
        let names: Vec<&str> = binding.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["retries", "token", "host"]);
        assert_eq!(
            binding.field("retries").unwrap().target_type(),
            &u32::target_type()
        );
    }

    #[test]
    fn test_inherited_field_reads_and_writes_through_projection() {
        let binding = Derived::binding().unwrap();
        let mut value = Derived::default();
        binding
            .field("host")
            .unwrap()
            .write(&mut value, &json!("db.local"))
            .unwrap();
        assert_eq!(value.base.host, "db.local");
        assert_eq!(binding.field("host").unwrap().read(&value), json!("db.local"));
    }

    #[test]
    fn test_entries_skip_disposable_fields() {
        let binding = Derived::binding().unwrap();
        let value = Derived {
            token: "secret".into(),
            ..Default::default()
        };
        let paths: Vec<String> = binding.entries(&value).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["svc.policy.retries", "svc.host"]);
    }

    #[test]
    fn test_write_is_strict() {
        let binding = Base::binding().unwrap();
        let mut value = Base::default();
        let field = binding.field("retries").unwrap();
        assert!(field.write(&mut value, &json!("many")).is_err());
        assert_eq!(value.retries, 0);
        field.write(&mut value, &json!("3")).unwrap();
        assert_eq!(value.retries, 3);
    }

    #[test]
    fn test_empty_root_path() {
        let binding = TypeBinding::<Base>::builder("config", "")
            .field("host", |b| &b.host, |b| &mut b.host)
            .build();
        assert_eq!(binding.full_path(&binding.fields()[0]), "host");
        assert!(Plain::binding().is_none());
    }
}
