//! JSON documents (`.json`), written pretty-printed.

use super::{FormatParser, into_tree};
use crate::error::ParseError;
use crate::types::{ConfigTree, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl FormatParser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }

    fn parse(&self, content: &str) -> Result<ConfigTree, ParseError> {
        if content.trim().is_empty() {
            return Ok(ConfigTree::new());
        }
        let document: Value = serde_json::from_str(content)?;
        into_tree(document)
    }

    fn serialize(&self, tree: &ConfigTree) -> Result<String, ParseError> {
        let mut text = serde_json::to_string_pretty(tree)?;
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_serialize() {
        let tree = JsonParser.parse(r#"{"db": {"port": 5432}}"#).unwrap();
        assert_eq!(Value::Object(tree.clone()), json!({"db": {"port": 5432}}));

        let text = JsonParser.serialize(&tree).unwrap();
        assert!(text.contains("\n  \"db\": {"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_blank_and_invalid_input() {
        assert!(JsonParser.parse("  \n").unwrap().is_empty());
        assert!(matches!(JsonParser.parse("{oops"), Err(ParseError::Json(_))));
        assert!(matches!(
            JsonParser.parse("[1]"),
            Err(ParseError::NotAMapping { found: "array" })
        ));
    }
}
