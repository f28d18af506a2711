//! CLI command implementations.

pub mod diff;
pub mod info;
pub mod parse;
pub mod toposort;

use std::path::Path;

use anyhow::{Context, Result};
use nodedb_core::{snapshot, NodeDb};

/// Load a database snapshot. The result is resolved.
pub fn load_db(path: &Path) -> Result<NodeDb> {
    snapshot::load(path).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    pub const CORE: &str = "\
X3DNode {
  SFNode [in,out] metadata NULL [X3DMetadataObject]
}
X3DMetadataObject : X3DNode { }
X3DChildNode : X3DNode { }
X3DBoundedObject : X3DNode {
  SFVec3f [] bboxSize -1 -1 -1
}
";

    pub const SHAPE: &str = "\
X3DShapeNode : X3DChildNode, X3DBoundedObject {
  SFNode [in,out] geometry NULL [X3DGeometryNode]
}
X3DGeometryNode : X3DNode { }
Shape : X3DShapeNode { }
Box : X3DGeometryNode {
  SFVec3f [] size 2 2 2
}
";

    /// Write the fixture specification files into `dir`.
    pub fn write_specs(dir: &Path) -> Vec<PathBuf> {
        let core = dir.join("Core.txt");
        let shape = dir.join("Shape.txt");
        std::fs::write(&core, CORE).unwrap();
        std::fs::write(&shape, SHAPE).unwrap();
        vec![shape, core]
    }
}
