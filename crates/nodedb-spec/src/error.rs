//! Parse errors and recoverable diagnostics.

use std::fmt;

use nodedb_core::NodeDbError;

/// Fatal errors that abort a parse run.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Db(#[from] NodeDbError),

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid parser configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Category of a recoverable diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A known typo or source defect was fixed.
    Correction,
    /// The node header could not be parsed; no node was produced.
    InvalidNode,
    /// A field span did not match the field grammar and was skipped.
    InvalidField,
    /// An attribute span did not match the attribute grammar.
    InvalidAttribute,
    /// A field's default value is missing or does not fit its type.
    InvalidDefault,
    /// An event field carried a default value, which was discarded.
    MisplacedDefault,
    /// A field name repeated within one node; the later one was skipped.
    DuplicateField,
    /// Text in a node body that starts no field or attribute.
    UnrecognizedText,
    /// A field's trailing text left a bracket open before the next span.
    UnbalancedBracket,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Correction => "correction",
            DiagnosticKind::InvalidNode => "invalid node",
            DiagnosticKind::InvalidField => "invalid field",
            DiagnosticKind::InvalidAttribute => "invalid attribute",
            DiagnosticKind::InvalidDefault => "invalid default",
            DiagnosticKind::MisplacedDefault => "misplaced default",
            DiagnosticKind::DuplicateField => "duplicate field",
            DiagnosticKind::UnrecognizedText => "unrecognized text",
            DiagnosticKind::UnbalancedBracket => "unbalanced bracket",
        };
        f.write_str(s)
    }
}

/// A recoverable defect found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// The node being parsed, when known.
    pub node: Option<String>,
    /// Origin of the text (file name or fragment id).
    pub source: Option<String>,
    /// The offending text.
    pub text: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node: None,
            source: None,
            text: text.into(),
        }
    }

    /// Attach the owning node and source if not already set.
    pub(crate) fn located(mut self, node: Option<&str>, source: Option<&str>) -> Self {
        if self.node.is_none() {
            self.node = node.map(str::to_string);
        }
        if self.source.is_none() {
            self.source = source.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(node) = &self.node {
            write!(f, " in node {node}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        if !self.text.is_empty() {
            write!(f, "\n  {}", self.text)?;
        }
        Ok(())
    }
}
