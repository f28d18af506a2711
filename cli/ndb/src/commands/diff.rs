//! `ndb diff`: structural comparison of two database snapshots.

use std::path::Path;

use anyhow::Result;
use nodedb_core::{diff, DiffOptions};

use super::load_db;

pub fn run(old: &Path, new: &Path, options: &DiffOptions) -> Result<()> {
    let old_db = load_db(old)?;
    let new_db = load_db(new)?;
    let report = diff(&old_db, &new_db, options);
    if report.is_empty() {
        println!("No differences.");
    } else {
        print!("{report}");
        println!(
            "{} changed, {} removed, {} added",
            report.changed.len(),
            report.removed.len(),
            report.added.len()
        );
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
    fn diff_two_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let files = fixtures::write_specs(dir.path());
        let (db, _) = parse::build(&files, &ParserConfig::default()).unwrap();
        let old = dir.path().join("old.ndb");
        snapshot::save(&db, &old).unwrap();

        std::fs::write(&files[0], fixtures::SHAPE.replace("size 2 2 2", "size 1 1 1")).unwrap();
        let (db, _) = parse::build(&files, &ParserConfig::default()).unwrap();
        let new = dir.path().join("new.ndb");
        snapshot::save(&db, &new).unwrap();

        run(&old, &new, &DiffOptions::default()).unwrap();
        run(&old, &old, &DiffOptions { compare_origin: true }).unwrap();
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ndb");
        let err = run(&missing, &missing, &DiffOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("loading"));
    }
}
