//! `nodedb.toml` project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use nodedb_core::DiffOptions;
use nodedb_spec::ParserConfig;

/// File name searched for by [`NdbManifest::find_and_load`].
pub const MANIFEST_FILE: &str = "nodedb.toml";

/// The top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NdbManifest {
    /// Normalizer and parser settings.
    #[serde(default)]
    pub parser: ParserConfig,
    /// Diff settings.
    #[serde(default)]
    pub diff: DiffConfig,
}

/// `[diff]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DiffConfig {
    /// Report origin changes as differences.
    #[serde(default)]
    pub compare_origin: bool,
}

impl NdbManifest {
    /// Search upward from `start_dir` for a `nodedb.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let manifest = Self::load(&candidate)?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Load a manifest from an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Diff options with the configured defaults.
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            compare_origin: self.diff.compare_origin,
        }
    }
}
