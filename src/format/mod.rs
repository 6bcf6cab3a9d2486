//! Pluggable file format parsers, chosen by filename extension.

mod json;
mod yaml;

pub use json::JsonParser;
pub use yaml::YamlParser;

use crate::error::{ParseError, UnsupportedFormatError};
use crate::types::{ConfigTree, Value, value_kind};
use std::path::Path;
use std::sync::Arc;

/// Reads and writes one on-disk config format.
pub trait FormatParser: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Filename suffixes handled by this parser, lowercase and without the dot.
    fn supported_extensions(&self) -> &[&str];

    /// Whether this parser handles `file_name`.
    fn supports(&self, file_name: &str) -> bool {
        has_extension(file_name, self.supported_extensions())
    }

    /// Parse document text. Blank text yields an empty tree.
    fn parse(&self, content: &str) -> Result<ConfigTree, ParseError>;

    /// Render a tree as document text.
    fn serialize(&self, tree: &ConfigTree) -> Result<String, ParseError>;
}

/// Unwrap a parsed document into its top-level mapping.
pub(crate) fn into_tree(document: Value) -> Result<ConfigTree, ParseError> {
    match document {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ConfigTree::new()),
        other => Err(ParseError::NotAMapping {
            found: value_kind(&other),
        }),
    }
}

/// Ordered set of parsers; the first one that supports a file wins.
#[derive(Clone)]
pub struct FormatRegistry {
    parsers: Vec<Arc<dyn FormatParser>>,
}

impl FormatRegistry {
    /// A registry with no parsers.
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Append a parser after the existing ones.
    pub fn register(&mut self, parser: impl FormatParser + 'static) -> &mut Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Builder form of [`FormatRegistry::register`].
    pub fn with(mut self, parser: impl FormatParser + 'static) -> Self {
        self.register(parser);
        self
    }

    /// Find the parser for `file_name`, if any.
    pub fn find(&self, file_name: &str) -> Option<Arc<dyn FormatParser>> {
        self.parsers
            .iter()
            .find(|parser| parser.supports(file_name))
            .cloned()
    }

    /// Find the parser for the file at `path`.
    pub fn parser_for(&self, path: &Path) -> Result<Arc<dyn FormatParser>, UnsupportedFormatError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.find(&file_name)
            .ok_or(UnsupportedFormatError { file: file_name })
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl Default for FormatRegistry {
    /// JSON, then YAML.
    fn default() -> Self {
        Self::empty().with(JsonParser).with(YamlParser)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.parsers.iter().map(|p| p.name()))
            .finish()
    }
}

/// Case-insensitive extension check on a bare file name.
pub(crate) fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IniLike;

    impl FormatParser for IniLike {
        fn name(&self) -> &str {
            "ini"
        }

        fn supported_extensions(&self) -> &[&str] {
            &["json"]
        }

        fn parse(&self, _content: &str) -> Result<ConfigTree, ParseError> {
            Ok(ConfigTree::new())
        }

        fn serialize(&self, _tree: &ConfigTree) -> Result<String, ParseError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_default_registry_picks_by_extension() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.find("app.json").unwrap().name(), "json");
        assert_eq!(registry.find("app.YML").unwrap().name(), "yaml");
        assert_eq!(registry.find("app.yaml").unwrap().name(), "yaml");
        assert!(registry.find("app.toml").is_none());
        assert!(registry.find("json").is_none());
    }

    #[test]
    fn test_first_registered_parser_wins() {
        let registry = FormatRegistry::empty().with(IniLike).with(JsonParser);
        assert_eq!(registry.find("a.json").unwrap().name(), "ini");
        assert_eq!(format!("{:?}", registry), "[\"ini\", \"json\"]");
    }

    #[test]
    fn test_parser_for_reports_unsupported_file() {
        let registry = FormatRegistry::default();
        let err = registry.parser_for(Path::new("/etc/app.conf")).err().unwrap();
        assert_eq!(err.file, "app.conf");
    }

    #[test]
    fn test_into_tree_rejects_non_mapping() {
        assert!(into_tree(serde_json::json!([1, 2])).is_err());
        assert!(into_tree(Value::Null).unwrap().is_empty());
    }
}
