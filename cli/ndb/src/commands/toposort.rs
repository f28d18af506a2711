//! `ndb toposort`: construction-dependency order of a database.

use std::path::Path;

use anyhow::Result;
use nodedb_core::DependencyGraph;

use super::load_db;

pub fn run(path: &Path) -> Result<()> {
    let db = load_db(path)?;
    let graph = DependencyGraph::from_db(&db)?;
    let order = graph.sort();

    println!("--- Edges ---");
    for (from, to) in graph.edges() {
        println!("  {from} -> {to}");
    }
    for unknown in graph.unknown_references() {
        println!(
            "  unknown type {} in {}.{}",
            unknown.type_name, unknown.node, unknown.field
        );
    }

    if !order.is_acyclic() {
        println!("--- Back edges ---");
        for (from, to) in &order.back_edges {
            println!("  {from} -> {to}");
        }
    }

    println!("--- Order ---");
    for (i, name) in order.order.iter().enumerate() {
        println!("  {:>4}  {name}", i + 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{fixtures, parse};
    use nodedb_core::snapshot;
    use nodedb_spec::ParserConfig;

    #[test]
    fn sorts_a_snapshot_with_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let files = fixtures::write_specs(dir.path());
        let (db, _) = parse::build(&files, &ParserConfig::default()).unwrap();
        let path = dir.path().join("x3d.ndb");
        snapshot::save(&db, &path).unwrap();
        run(&path).unwrap();
    }
}
