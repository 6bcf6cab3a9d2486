//! YAML documents (`.yaml`, `.yml`).

use super::{FormatParser, into_tree};
use crate::error::ParseError;
use crate::types::{ConfigTree, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl FormatParser for YamlParser {
    fn name(&self) -> &str {
        "yaml"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }

    fn parse(&self, content: &str) -> Result<ConfigTree, ParseError> {
        if content.trim().is_empty() {
            return Ok(ConfigTree::new());
        }
        let document: Value = serde_yaml::from_str(content)?;
        into_tree(document)
    }

    fn serialize(&self, tree: &ConfigTree) -> Result<String, ParseError> {
        Ok(serde_yaml::to_string(tree)?)
    }
}
