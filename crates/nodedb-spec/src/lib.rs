//! Parser for the node-type specification text dialect.
//!
//! Raw node text passes through the [`normalize`] fixups, then the body is
//! tokenized ([`lexer`]) and split into field and attribute spans
//! ([`grammar`]). [`SpecParser`] drives this per node, inserts the results
//! into a [`nodedb_core::NodeDb`] and accumulates recoverable
//! [`Diagnostic`]s for the whole run.

pub mod config;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod scan;

pub use config::{Correction, ParserConfig};
pub use error::{Diagnostic, DiagnosticKind, ParseError, Result};
pub use normalize::{Normalized, Normalizer};
pub use parser::SpecParser;
pub use scan::split_node_specs;
