//! Node-level parser driver.
//!
//! Turns node text into [`Node`] records in a [`NodeDb`], collecting
//! recoverable diagnostics across every node of a run. Only a duplicate
//! node name (and I/O) aborts a run.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use nodedb_core::{Node, NodeDb, NodeDbError};

use crate::config::ParserConfig;
use crate::error::{Diagnostic, DiagnosticKind, Result};
use crate::grammar::{parse_body, Item};
use crate::normalize::Normalizer;
use crate::scan::split_node_specs;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?::\s*([^{]*))?\{").unwrap()
});

/// Accumulates nodes and diagnostics over one parse run.
#[derive(Debug)]
pub struct SpecParser {
    normalizer: Normalizer,
    abstract_prefix: String,
    db: NodeDb,
    diagnostics: Vec<Diagnostic>,
}

impl Default for SpecParser {
    fn default() -> Self {
        Self {
            normalizer: Normalizer::default(),
            abstract_prefix: ParserConfig::default().abstract_prefix,
            db: NodeDb::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl SpecParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with a custom configuration.
    pub fn with_config(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            normalizer: Normalizer::new(config)?,
            abstract_prefix: config.abstract_prefix.clone(),
            db: NodeDb::new(),
            diagnostics: Vec::new(),
        })
    }

    /// Parse one node's text and insert it into the database.
    ///
    /// Returns `Ok(None)` when the text was a rejected placeholder or its
    /// header did not parse; the latter is recorded as an `InvalidNode`
    /// diagnostic. The `component` is applied before the node's attributes,
    /// so a `componentName` attribute overrides it.
    pub fn parse_node(
        &mut self,
        text: &str,
        origin: Option<&str>,
        component: Option<&str>,
    ) -> Result<Option<&Node>> {
        let Some(normalized) = self.normalizer.normalize(text) else {
            return Ok(None);
        };
        self.diagnostics.extend(
            normalized
                .diagnostics
                .into_iter()
                .map(|d| d.located(None, origin)),
        );
        let text = normalized.text;

        let Some((name, super_types, body)) = split_header(&text) else {
            let first_line = text.trim_start().lines().next().unwrap_or("");
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::InvalidNode,
                    "invalid node specification",
                    first_line,
                )
                .located(None, origin),
            );
            return Ok(None);
        };

        let is_abstract =
            !self.abstract_prefix.is_empty() && name.starts_with(&self.abstract_prefix);
        let mut node = Node::new(name)
            .with_super_types(super_types)
            .with_abstract(is_abstract);
        if let Some(origin) = origin {
            node = node.with_origin(origin);
        }
        if let Some(component) = component {
            node = node.with_component(component);
        }

        let parsed = parse_body(body);
        let mut diagnostics = parsed.diagnostics;
        for item in parsed.items {
            match item {
                Item::Attribute { name, value } => node.set_attribute(name, value),
                Item::Field(field) => {
                    let text = field.to_string();
                    match node.add_field(field) {
                        Ok(()) => {}
                        Err(NodeDbError::DuplicateField { field, .. }) => {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::DuplicateField,
                                format!("field {field} declared more than once"),
                                text,
                            ));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        tracing::debug!(
            node = %node.type_name,
            supers = node.super_types.len(),
            fields = node.fields().len(),
            diagnostics = diagnostics.len(),
            "parsed node"
        );
        let name = node.type_name.clone();
        self.diagnostics.extend(
            diagnostics
                .into_iter()
                .map(|d| d.located(Some(&name), origin)),
        );
        self.db.add_node(node)?;
        Ok(self.db.get(&name))
    }

    /// Parse every node block found in `text`. Returns the number of nodes
    /// added.
    pub fn parse_text(
        &mut self,
        text: &str,
        origin: Option<&str>,
        component: Option<&str>,
    ) -> Result<usize> {
        let mut added = 0;
        for block in split_node_specs(text) {
            if self.parse_node(block, origin, component)?.is_some() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Parse a specification text file.
    ///
    /// The file name becomes each node's origin and the file stem its
    /// component.
    pub fn parse_file(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let origin = path.file_name().map(|s| s.to_string_lossy().into_owned());
        let component = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        let added = self.parse_text(&text, origin.as_deref(), component.as_deref())?;
        tracing::debug!(path = %path.display(), nodes = added, "parsed file");
        Ok(added)
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// The database built so far, not yet resolved.
    pub fn db(&self) -> &NodeDb {
        &self.db
    }

    /// Resolve the hierarchy and return the database with all diagnostics.
    pub fn finish(mut self) -> Result<(NodeDb, Vec<Diagnostic>)> {
        self.db.resolve()?;
        Ok((self.db, self.diagnostics))
    }
}

/// Split node text into its name, supertype names and body.
///
/// The body runs from the opening brace to the last closing brace.
fn split_header(text: &str) -> Option<(&str, Vec<String>, &str)> {
    let caps = HEADER_RE.captures(text)?;
    let open = caps.get(0)?.end();
    let close = text.rfind('}').filter(|&close| close >= open)?;
    let name = caps.get(1)?.as_str();
    let super_types = caps
        .get(2)
        .map(|supers| {
            supers
                .as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some((name, super_types, &text[open..close]))
}
