//! `ndb info`: summary and hierarchy views of a database.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use nodedb_core::{check_db, Node, NodeDb};

use super::load_db;

/// Views selected on the command line.
#[derive(Debug, Clone, Default)]
pub struct InfoOptions {
    /// Restrict per-node views to these nodes; empty means all.
    pub nodes: Vec<String>,
    pub list: bool,
    pub sort: bool,
    pub fields: bool,
    pub bases: bool,
    pub virtual_bases: bool,
    pub derived: bool,
    pub components: bool,
    pub component: Option<String>,
    pub check: bool,
}

impl InfoOptions {
    fn per_node(&self) -> bool {
        self.fields || self.bases || self.virtual_bases || self.derived
    }
}

pub fn run(path: &Path, options: &InfoOptions) -> Result<()> {
    let db = load_db(path)?;
    print!("{}", render(&db, options)?);
    Ok(())
}

fn names<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> String {
    nodes
        .into_iter()
        .map(|n| n.type_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the selected views of a resolved database.
pub fn render(db: &NodeDb, options: &InfoOptions) -> Result<String> {
    let mut out = String::new();
    let summary = db.summary();
    writeln!(
        out,
        "{} nodes ({} abstract, {} concrete) in {} components, {} fields",
        summary.total,
        summary.abstract_nodes,
        summary.concrete_nodes,
        summary.components,
        db.field_count()
    )?;

    let mut selected: Vec<&Node> = if options.nodes.is_empty() {
        db.nodes().iter().collect()
    } else {
        options
            .nodes
            .iter()
            .map(|name| {
                db.get(name)
                    .ok_or_else(|| anyhow::anyhow!("node {name} not found"))
            })
            .collect::<Result<_>>()?
    };
    if options.sort {
        selected.sort_by(|a, b| a.type_name.cmp(&b.type_name));
    }

    if options.list {
        writeln!(out)?;
        for node in &selected {
            let kind = if node.is_abstract { "abstract" } else { "concrete" };
            match &node.component {
                Some(component) => writeln!(out, "  {} ({kind}, {component})", node.type_name)?,
                None => writeln!(out, "  {} ({kind})", node.type_name)?,
            }
        }
    }

    if options.per_node() {
        for node in &selected {
            let name = node.type_name.as_str();
            writeln!(out, "\n--- {name} ---")?;
            if options.bases {
                writeln!(out, "  bases: {}", names(db.bases(name)?.all))?;
            }
            if options.virtual_bases {
                writeln!(out, "  virtual bases: {}", names(db.bases(name)?.shared))?;
            }
            if options.derived {
                writeln!(out, "  derived: {}", names(db.all_derived(name)?))?;
            }
            if options.fields {
                for entry in db.field_view(name)? {
                    writeln!(
                        out,
                        "  {}  (from {})",
                        entry.field,
                        names(entry.declared_in)
                    )?;
                }
            }
        }
    }

    if options.components {
        writeln!(out, "\n--- Components ---")?;
        for component in db.components() {
            writeln!(
                out,
                "  {component}: {} nodes",
                db.component_nodes(component).len()
            )?;
        }
    }

    if let Some(component) = &options.component {
        writeln!(out, "\n--- Component {component} ---")?;
        for node in db.component_nodes(component) {
            writeln!(out, "  {}", node.type_name)?;
        }
    }

    if options.check {
        let issues = check_db(db)?;
        writeln!(out, "\n--- Check ({} issues) ---", issues.len())?;
        for issue in issues {
            writeln!(out, "  {issue}")?;
        }
    }

    Ok(out)
}
