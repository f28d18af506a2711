//! `ndb parse`: build a database from specification text files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nodedb_core::{snapshot, NodeDb};
use nodedb_spec::{Diagnostic, ParserConfig, SpecParser};

/// Parse `files` in order and resolve the result.
///
/// Nodes may reference supertypes from any of the files.
pub fn build(files: &[PathBuf], config: &ParserConfig) -> Result<(NodeDb, Vec<Diagnostic>)> {
    let mut parser = SpecParser::with_config(config).context("invalid parser configuration")?;
    for file in files {
        let added = parser
            .parse_file(file)
            .with_context(|| format!("parsing {}", file.display()))?;
        tracing::info!(file = %file.display(), nodes = added, "parsed specification file");
    }
    parser.finish().context("resolving node hierarchy")
}

pub fn run(
    files: &[PathBuf],
    config: &ParserConfig,
    output: Option<&Path>,
    errors: bool,
    strict: bool,
) -> Result<()> {
    let (db, diagnostics) = build(files, config)?;

    if errors {
        for diagnostic in &diagnostics {
            eprintln!("{diagnostic}");
        }
    } else if !diagnostics.is_empty() {
        eprintln!(
            "warning: {} diagnostic(s) reported (use --errors to list them)",
            diagnostics.len()
        );
    }
    if strict && !diagnostics.is_empty() {
        anyhow::bail!("{} diagnostic(s) reported in strict mode", diagnostics.len());
    }

    match output {
        Some(path) => {
            snapshot::save(&db, path).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Wrote {} nodes ({} fields) to {}",
                db.len(),
                db.field_count(),
                path.display()
            );
        }
        None => {
            for node in db.nodes() {
                println!("{node}");
            }
        }
    }
    Ok(())
}
