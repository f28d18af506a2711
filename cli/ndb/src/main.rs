//! ndb: build, query and compare node-type databases.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use manifest::NdbManifest;

#[derive(Parser)]
#[command(name = "ndb", version, about = "Node-type database tool")]
struct Cli {
    /// Configuration file (default: nearest nodedb.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse specification text files into a database
    Parse {
        /// Specification files, parsed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write a snapshot instead of printing the nodes
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every diagnostic
        #[arg(long)]
        errors: bool,
        /// Fail when any diagnostic was reported
        #[arg(long)]
        strict: bool,
    },
    /// Show information about a database snapshot
    Info {
        /// Snapshot file
        db: PathBuf,
        /// Comma-separated node names to restrict per-node views to
        #[arg(long, value_delimiter = ',')]
        nodes: Vec<String>,
        /// List node names
        #[arg(long)]
        list: bool,
        /// Sort nodes by name
        #[arg(long)]
        sort: bool,
        /// Show own and inherited fields with their first declarations
        #[arg(long)]
        fields: bool,
        /// Show all transitive supertypes
        #[arg(long)]
        bases: bool,
        /// Show supertypes reachable along more than one path
        #[arg(long)]
        virtual_bases: bool,
        /// Show all transitive subtypes
        #[arg(long)]
        derived: bool,
        /// List components
        #[arg(long)]
        components: bool,
        /// List the nodes of one component
        #[arg(long)]
        component: Option<String>,
        /// Run consistency checks
        #[arg(long)]
        check: bool,
    },
    /// Compare two database snapshots
    Diff {
        /// Old snapshot
        old: PathBuf,
        /// New snapshot
        new: PathBuf,
        /// Also compare node origins
        #[arg(long)]
        all: bool,
    },
    /// Print the construction-dependency order of a database snapshot
    Toposort {
        /// Snapshot file
        db: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest = load_manifest(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Parse {
            files,
            output,
            errors,
            strict,
        } => commands::parse::run(&files, &manifest.parser, output.as_deref(), errors, strict),

        Commands::Info {
            db,
            nodes,
            list,
            sort,
            fields,
            bases,
            virtual_bases,
            derived,
            components,
            component,
            check,
        } => {
            let options = commands::info::InfoOptions {
                nodes,
                list,
                sort,
                fields,
                bases,
                virtual_bases,
                derived,
                components,
                component,
                check,
            };
            commands::info::run(&db, &options)
        }

        Commands::Diff { old, new, all } => {
            let mut options = manifest.diff_options();
            options.compare_origin |= all;
            commands::diff::run(&old, &new, &options)
        }

        Commands::Toposort { db } => commands::toposort::run(&db),
    }
}

/// Load the explicit configuration file, or the nearest `nodedb.toml`, or
/// the defaults.
fn load_manifest(config: Option<&Path>, cwd: &Path) -> anyhow::Result<NdbManifest> {
    if let Some(path) = config {
        return NdbManifest::load(path);
    }
    match NdbManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => {
            tracing::debug!(dir = %dir.display(), "using nodedb.toml");
            Ok(manifest)
        }
        None => Ok(NdbManifest::default()),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Full workflow: parse → info → toposort → diff.
    #[test]
    fn parse_info_toposort_diff_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let files = commands::fixtures::write_specs(dir.path());
        let config = dir.path().join("custom.toml");
        std::fs::write(&config, "[parser]\nabstract_prefix = \"X3D\"\n").unwrap();
        let manifest = load_manifest(Some(&config), dir.path()).unwrap();

        let out = dir.path().join("x3d.ndb");
        commands::parse::run(&files, &manifest.parser, Some(&out), false, true).unwrap();
        commands::info::run(
            &out,
            &commands::info::InfoOptions {
                fields: true,
                check: true,
                ..Default::default()
            },
        )
        .unwrap();
        commands::toposort::run(&out).unwrap();
        commands::diff::run(&out, &out, &manifest.diff_options()).unwrap();
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_manifest(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn cli_parses_info_flags() {
        let cli = Cli::try_parse_from([
            "ndb", "info", "x3d.ndb", "--nodes", "Shape,Box", "--virtual-bases", "--fields", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Info {
                nodes,
                virtual_bases,
                fields,
                ..
            } => {
                assert_eq!(nodes, ["Shape", "Box"]);
                assert!(virtual_bases && fields);
            }
            _ => panic!("expected info"),
        }
    }
}
