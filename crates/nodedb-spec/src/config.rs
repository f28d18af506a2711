//! Parser configuration, loadable from TOML.

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// A literal text substitution applied by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Correction {
    /// Exact text to find.
    pub from: String,
    /// Replacement text.
    pub to: String,
    /// Restrict the correction to the node with this type name.
    #[serde(default)]
    pub node: Option<String>,
}

impl Correction {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            node: None,
        }
    }

    pub fn for_node(node: &str, from: &str, to: &str) -> Self {
        Self {
            node: Some(node.to_string()),
            ..Self::new(from, to)
        }
    }
}

/// Settings for normalization and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Node names with this prefix default to abstract.
    pub abstract_prefix: String,
    /// Corrections applied after the built-in ones.
    pub corrections: Vec<Correction>,
    /// Extra regexes for boilerplate text to strip.
    pub strip_patterns: Vec<String>,
    /// Node text starting with any of these is skipped silently.
    pub reject_prefixes: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            abstract_prefix: nodedb_core::node::DEFAULT_ABSTRACT_PREFIX.to_string(),
            corrections: Vec::new(),
            strip_patterns: Vec::new(),
            reject_prefixes: vec!["P[".to_string()],
        }
    }
}

impl ParserConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.abstract_prefix, "X3D");
        assert_eq!(config.reject_prefixes, ["P["]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ParserConfig::from_toml_str(
            r#"
strip_patterns = ['\s*# TODO.*']

[[corrections]]
from = "SFVec3F"
to = "SFVec3f"

[[corrections]]
node = "Text"
from = "lenght"
to = "length"
"#,
        )
        .unwrap();
        assert_eq!(config.abstract_prefix, "X3D");
        assert_eq!(config.corrections.len(), 2);
        assert_eq!(config.corrections[1], Correction::for_node("Text", "lenght", "length"));
        assert_eq!(config.strip_patterns.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parser.toml");
        std::fs::write(&path, "abstract_prefix = \"Abstract\"\n").unwrap();
        assert_eq!(ParserConfig::load(&path).unwrap().abstract_prefix, "Abstract");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(ParserConfig::from_toml_str("abstract_prefix = 3").is_err());
    }
}
