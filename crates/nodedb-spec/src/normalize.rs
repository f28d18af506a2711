//! Textual fixups applied to one node's raw text before parsing.
//!
//! Steps run in a fixed order: strip markup tags, decode entities, drop
//! carriage returns, apply typo corrections, strip boilerplate lines,
//! rename legacy range tokens.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Correction, ParserConfig};
use crate::error::{Diagnostic, DiagnosticKind, ParseError, Result};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static NODE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());

const ENTITIES: &[(&str, &str)] = &[
    ("&#8734;", "inf"),
    ("&#960;", "pi"),
    ("&infin;", "inf"),
    ("&minus;", "-"),
    ("&plus;", "+"),
    ("&quot;", "\""),
    ("&pi;", "pi"),
    ("&lt;", "<"),
    ("\u{221e}", "inf"),
    ("\u{2212}", "-"),
    ("\u{3c0}", "pi"),
];

const GLOBAL_CORRECTIONS: &[(&str, &str)] = &[
    ("SFBoolean", "SFBool"),
    ("X3DURLObject", "X3DUrlObject"),
    ("[LINEAR]", "[\"LINEAR\"]"),
];

const NODE_CORRECTIONS: &[(&str, &str, &str)] = &[
    ("X3DPrototypeInstance", "metdata", "metadata"),
    ("Text", "X3FontSyleNode", "X3DFontStyleNode"),
    ("Text", "X3FontStyleNode", "X3DFontStyleNode"),
];

const BOILERPLATE: &[&str] = &[
    r"\s*#\sAnd[^\n]*",
    r"\s*fieldType\s\[[^\n]*",
    r"\s*MF<type[^\n]*",
    r"\s*\[S\|M\]F<type[^\n]*",
];

const NODE_BOILERPLATE: &[(&str, &str)] = &[("X3DViewpointNode", r"\s*SFVec3f/d[^\n]*")];

const RENAMES: &[(&str, &str)] = &[("INF_RANGE", "(-inf,inf)"), ("POS_INF", "[0,inf)")];

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    /// Corrections applied, in order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies the built-in and configured fixups to node text.
#[derive(Debug, Clone)]
pub struct Normalizer {
    corrections: Vec<Correction>,
    boilerplate: Vec<(Option<String>, Regex)>,
    reject_prefixes: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::builtin().with_config(&ParserConfig::default())
    }
}

impl Normalizer {
    /// Create a normalizer with the built-in fixups plus the configured
    /// corrections, strip patterns and reject prefixes.
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let mut normalizer = Self::builtin().with_config(config);
        for pattern in &config.strip_patterns {
            let re = Regex::new(pattern).map_err(|source| ParseError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            normalizer.boilerplate.push((None, re));
        }
        Ok(normalizer)
    }

    fn builtin() -> Self {
        let mut corrections: Vec<Correction> = GLOBAL_CORRECTIONS
            .iter()
            .map(|(from, to)| Correction::new(from, to))
            .collect();
        corrections.extend(
            NODE_CORRECTIONS
                .iter()
                .map(|(node, from, to)| Correction::for_node(node, from, to)),
        );

        let boilerplate = BOILERPLATE
            .iter()
            .map(|p| (None, p))
            .chain(NODE_BOILERPLATE.iter().map(|(node, p)| (Some(node.to_string()), p)))
            .map(|(node, p)| (node, Regex::new(p).unwrap()))
            .collect();

        Self {
            corrections,
            boilerplate,
            reject_prefixes: Vec::new(),
        }
    }

    fn with_config(mut self, config: &ParserConfig) -> Self {
        self.corrections.extend(config.corrections.iter().cloned());
        self.reject_prefixes = config.reject_prefixes.clone();
        self
    }

    /// Normalize one node's text.
    ///
    /// Returns `None` when the text is a rejected placeholder.
    pub fn normalize(&self, raw: &str) -> Option<Normalized> {
        let mut diagnostics = Vec::new();

        let mut text = TAG_RE.replace_all(raw, "").into_owned();
        for (entity, literal) in ENTITIES {
            if text.contains(entity) {
                text = text.replace(entity, literal);
            }
        }
        text.retain(|c| c != '\r');

        let trimmed = text.trim_start();
        if self.reject_prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
            tracing::debug!(text = %first_line(trimmed), "skipping placeholder node");
            return None;
        }

        let name = NODE_NAME_RE
            .captures(&text)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        for correction in &self.corrections {
            if correction.node.as_deref().is_some_and(|n| n != name) {
                continue;
            }
            if text.contains(&correction.from) {
                text = text.replace(&correction.from, &correction.to);
                tracing::warn!(node = %name, from = %correction.from, to = %correction.to, "corrected typo");
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::Correction,
                        format!("replaced {:?} with {:?}", correction.from, correction.to),
                        correction.from.clone(),
                    )
                    .located(Some(&name), None),
                );
            }
        }

        if name == "TextureProperties" && !text.contains('{') {
            text = text.replacen("X3DNode", "X3DNode {", 1);
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::Correction,
                    "added missing opening brace",
                    first_line(text.trim_start()),
                )
                .located(Some(&name), None),
            );
        }

        for (node, re) in &self.boilerplate {
            if node.as_deref().is_some_and(|n| n != name) {
                continue;
            }
            if re.is_match(&text) {
                text = re.replace_all(&text, "").into_owned();
            }
        }

        for (legacy, replacement) in RENAMES {
            if text.contains(legacy) {
                text = text.replace(legacy, replacement);
            }
        }

        Some(Normalized { text, diagnostics })
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> Normalized {
        Normalizer::default().normalize(raw).unwrap()
    }

    #[test]
    fn strips_tags_and_decodes_entities() {
        let out = normalize(
            "<b>Box</b> : X3DGeometryNode {\r\n  SFFloat [] r 1 &#8734; &minus;1 \u{3c0}\r\n}",
        );
        assert_eq!(out.text, "Box : X3DGeometryNode {\n  SFFloat [] r 1 inf -1 pi\n}");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn corrections_are_reported() {
        let out = normalize("Switch : X3DGroupingNode { SFBoolean [] on TRUE }");
        assert_eq!(out.text, "Switch : X3DGroupingNode { SFBool [] on TRUE }");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Correction);
        assert_eq!(out.diagnostics[0].node.as_deref(), Some("Switch"));
    }

    #[test]
    fn node_scoped_corrections() {
        let out = normalize("Text : X3DGeometryNode { SFNode [in,out] fontStyle NULL [X3FontStyleNode] }");
        assert!(out.text.contains("[X3DFontStyleNode]"));
        let out = normalize("Other : X3DNode { SFNode [in,out] fontStyle NULL [X3FontStyleNode] }");
        assert!(out.text.contains("[X3FontStyleNode]"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn texture_properties_gets_brace() {
        let out = normalize("TextureProperties : X3DNode\n  SFFloat [in,out] anisotropicDegree 1\n}");
        assert!(out.text.starts_with("TextureProperties : X3DNode {"));
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn strips_boilerplate_lines() {
        let out = normalize(
            "X3DArrayField {\n  fieldType [in,out] x\n  # And any number of:\n  MF<type&gt; [in,out] y\n}",
        );
        assert_eq!(out.text, "X3DArrayField {\n}");
    }

    #[test]
    fn legacy_ranges_renamed() {
        let out = normalize("Box { SFVec3f [] size 2 2 2 POS_INF }");
        assert_eq!(out.text, "Box { SFVec3f [] size 2 2 2 [0,inf) }");
    }

    #[test]
    fn placeholders_rejected() {
        assert!(Normalizer::default()
            .normalize("  P[ProtoName] { }")
            .is_none());
    }

    #[test]
    fn configured_corrections_and_patterns() {
        let config = ParserConfig {
            corrections: vec![Correction::new("SFVec3F", "SFVec3f")],
            strip_patterns: vec![r"\s*# DRAFT[^\n]*".into()],
            ..ParserConfig::default()
        };
        let normalizer = Normalizer::new(&config).unwrap();
        let out = normalizer
            .normalize("Box {\n  # DRAFT\n  SFVec3F [] size 2 2 2\n}")
            .unwrap();
        assert_eq!(out.text, "Box {\n  SFVec3f [] size 2 2 2\n}");
    }

    #[test]
    fn invalid_configured_pattern() {
        let config = ParserConfig {
            strip_patterns: vec!["(".into()],
            ..ParserConfig::default()
        };
        assert!(matches!(
            Normalizer::new(&config),
            Err(ParseError::InvalidPattern { .. })
        ));
    }
}
