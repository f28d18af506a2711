//! NDB snapshot container.
//!
//! A snapshot holds only the node list; links, roots and first-declaration
//! sets are rebuilt by resolving on every load.
//!
//! ```text
//! offset  size  content
//!      0     4  "NDB\0"
//!      4     2  version major, minor
//!      6     2  flags, reserved (zero)
//!      8     4  node count (u32 LE)
//!     12     4  field count (u32 LE)
//!     16     4  payload length (u32 LE)
//!     20     N  JSON array of nodes
//!   20+N    32  SHA-256 of bytes 0..20+N
//! ```

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::db::NodeDb;
use crate::error::{NodeDbError, Result};
use crate::node::Node;

const MAGIC: &[u8; 4] = b"NDB\0";
const VERSION: (u8, u8) = (0, 1);
const HEADER_LEN: usize = 20;
const HASH_LEN: usize = 32;

/// The fixed-size part in front of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: (u8, u8),
    node_count: u32,
    field_count: u32,
    payload_len: u32,
}

impl Header {
    fn describe(db: &NodeDb, payload_len: usize) -> Result<Self> {
        let count = |n: usize, what: &str| {
            u32::try_from(n)
                .map_err(|_| NodeDbError::Serialization(format!("too many {what} ({n})")))
        };
        Ok(Self {
            version: VERSION,
            node_count: count(db.len(), "nodes")?,
            field_count: count(db.field_count(), "fields")?,
            payload_len: count(payload_len, "payload bytes")?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[self.version.0, self.version.1, 0, 0]);
        for word in [self.node_count, self.field_count, self.payload_len] {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }

    fn read(data: &[u8]) -> Result<Self> {
        if !data.starts_with(&MAGIC[..data.len().min(MAGIC.len())]) {
            return Err(NodeDbError::InvalidMagic);
        }
        let head = data.get(..HEADER_LEN).ok_or(NodeDbError::Truncated {
            needed: HEADER_LEN + HASH_LEN,
            actual: data.len(),
        })?;
        let (major, minor) = (head[4], head[5]);
        if major != VERSION.0 {
            return Err(NodeDbError::UnsupportedVersion { major, minor });
        }
        let word = |at: usize| u32::from_le_bytes([head[at], head[at + 1], head[at + 2], head[at + 3]]);
        Ok(Self {
            version: (major, minor),
            node_count: word(8),
            field_count: word(12),
            payload_len: word(16),
        })
    }

    fn payload_end(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }

    /// The payload of `data`, once the trailing hash has been checked.
    fn verified_payload<'d>(&self, data: &'d [u8]) -> Result<&'d [u8]> {
        let end = self.payload_end();
        let needed = end + HASH_LEN;
        if data.len() < needed {
            return Err(NodeDbError::Truncated {
                needed,
                actual: data.len(),
            });
        }
        if data.len() > needed {
            return Err(NodeDbError::Deserialization(format!(
                "{} unexpected bytes after the hash",
                data.len() - needed
            )));
        }
        let stored = &data[end..];
        let computed = Sha256::digest(&data[..end]);
        if computed.as_slice() != stored {
            return Err(NodeDbError::IntegrityFailed {
                stored: hex_encode(stored),
                computed: hex_encode(&computed),
            });
        }
        Ok(&data[HEADER_LEN..end])
    }

    fn check_counts(&self, db: &NodeDb) -> Result<()> {
        let pairs = [
            ("nodes", self.node_count as usize, db.len()),
            ("fields", self.field_count as usize, db.field_count()),
        ];
        for (what, header, payload) in pairs {
            if header != payload {
                return Err(NodeDbError::CountMismatch {
                    what,
                    header,
                    payload,
                });
            }
        }
        Ok(())
    }
}

/// A snapshot of a database.
pub struct Snapshot {
    pub db: NodeDb,
}

impl Snapshot {
    pub fn new(db: NodeDb) -> Self {
        Self { db }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(self.db.nodes())
            .map_err(|e| NodeDbError::Serialization(e.to_string()))?;
        let header = Header::describe(&self.db, payload.len())?;

        let mut out = Vec::with_capacity(header.payload_end() + HASH_LEN);
        header.write(&mut out);
        out.extend_from_slice(&payload);
        let hash = Sha256::digest(&out);
        out.extend_from_slice(&hash);
        Ok(out)
    }

    /// Rebuild the database from `data` and resolve it.
    ///
    /// Node and field names are checked for uniqueness as if the nodes had
    /// been added one by one, and the header counts must match what the
    /// payload holds.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = Header::read(data)?;
        let payload = header.verified_payload(data)?;
        let nodes: Vec<Node> = serde_json::from_slice(payload)
            .map_err(|e| NodeDbError::Deserialization(e.to_string()))?;
        let nodes = nodes
            .into_iter()
            .map(Node::revalidated)
            .collect::<Result<Vec<_>>>()?;
        let mut db = NodeDb::from_nodes(nodes)?;
        header.check_counts(&db)?;
        db.resolve()?;
        tracing::debug!(
            nodes = db.len(),
            version = %format_args!("{}.{}", header.version.0, header.version.1),
            "loaded snapshot"
        );
        Ok(Self { db })
    }
}

/// Write a database snapshot to a file.
pub fn save(db: &NodeDb, path: &Path) -> Result<()> {
    let bytes = Snapshot::new(db.clone()).to_bytes()?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a database snapshot from a file. The result is resolved.
pub fn load(path: &Path) -> Result<NodeDb> {
    let data = std::fs::read(path)?;
    Ok(Snapshot::from_bytes(&data)?.db)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotations;
    use crate::field::{AccessMode, Field, FieldType};
    use crate::node::AttributeValue;

    fn sample() -> NodeDb {
        let mut annotations = Annotations::new();
        annotations.insert("getter", Some(vec!["isActive".into()]));
        let mut shape = Node::new("Shape")
            .with_super_types(["X3DNode"])
            .with_component("Shape")
            .with_origin("Shape.txt")
            .with_field(
                Field::new(FieldType::SFNode, AccessMode::InputOutput, "geometry")
                    .with_value("NULL")
                    .with_valid_value_types(["X3DNode"])
                    .with_comment("the geometry"),
            )
            .unwrap()
            .with_field(
                Field::new(FieldType::SFBool, AccessMode::OutputOnly, "isActive")
                    .with_annotations(annotations),
            )
            .unwrap();
        shape.set_attribute("level", AttributeValue::Float(1.5));
        NodeDb::from_nodes([Node::new("X3DNode"), shape]).unwrap()
    }

    /// A well-formed container around an arbitrary payload.
    fn container(payload: &serde_json::Value, node_count: u32, field_count: u32) -> Vec<u8> {
        let payload = serde_json::to_vec(payload).unwrap();
        let header = Header {
            version: VERSION,
            node_count,
            field_count,
            payload_len: payload.len() as u32,
        };
        let mut out = Vec::new();
        header.write(&mut out);
        out.extend_from_slice(&payload);
        let hash = Sha256::digest(&out);
        out.extend_from_slice(&hash);
        out
    }

    #[test]
    fn empty_round_trip() {
        let bytes = Snapshot::new(NodeDb::new()).to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + "[]".len() + HASH_LEN);
        let loaded = Snapshot::from_bytes(&bytes).unwrap();
        assert!(loaded.db.is_empty());
        assert!(loaded.db.is_resolved());
    }

    #[test]
    fn round_trip_is_structurally_equal_and_resolved() {
        let db = sample();
        let bytes = Snapshot::new(db.clone()).to_bytes().unwrap();
        let loaded = Snapshot::from_bytes(&bytes).unwrap().db;
        assert_eq!(loaded, db);
        assert!(loaded.is_resolved());
        assert_eq!(loaded.derived_nodes("X3DNode").unwrap().len(), 1);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x3d.ndb");
        let db = sample();
        save(&db, &path).unwrap();
        assert_eq!(load(&path).unwrap(), db);
    }

    #[test]
    fn load_fails_on_unresolvable_snapshot() {
        let db = NodeDb::from_nodes([Node::new("Foo").with_super_types(["Bar"])]).unwrap();
        let bytes = Snapshot::new(db).to_bytes().unwrap();
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(NodeDbError::UnresolvedSuperType { .. })
        ));
    }

    #[test]
    fn duplicate_node_in_payload_is_rejected() {
        let payload = serde_json::to_value([Node::new("Box"), Node::new("Box")]).unwrap();
        let err = Snapshot::from_bytes(&container(&payload, 2, 0)).err().unwrap();
        assert!(matches!(err, NodeDbError::DuplicateNode(name) if name == "Box"));
    }

    #[test]
    fn duplicate_field_in_payload_is_rejected() {
        let node = Node::new("Box")
            .with_field(Field::new(FieldType::SFVec3f, AccessMode::InitializeOnly, "size"))
            .unwrap();
        let mut value = serde_json::to_value(&node).unwrap();
        let fields = value["fields"].as_array_mut().unwrap();
        fields.push(fields[0].clone());
        let payload = serde_json::Value::Array(vec![value]);

        let err = Snapshot::from_bytes(&container(&payload, 1, 2)).err().unwrap();
        assert!(matches!(
            err,
            NodeDbError::DuplicateField { ref node, ref field } if node == "Box" && field == "size"
        ));
    }

    #[test]
    fn header_counts_must_match_payload() {
        let db = sample();
        let payload = serde_json::to_value(db.nodes()).unwrap();
        assert!(Snapshot::from_bytes(&container(&payload, 2, 2)).is_ok());

        let err = Snapshot::from_bytes(&container(&payload, 3, 2)).err().unwrap();
        assert!(matches!(
            err,
            NodeDbError::CountMismatch { what: "nodes", header: 3, payload: 2 }
        ));
        let err = Snapshot::from_bytes(&container(&payload, 2, 5)).err().unwrap();
        assert!(matches!(
            err,
            NodeDbError::CountMismatch { what: "fields", header: 5, payload: 2 }
        ));
    }

    #[test]
    fn edited_origin_fails_the_hash() {
        let mut bytes = Snapshot::new(sample()).to_bytes().unwrap();
        let at = bytes
            .windows(b"Shape.txt".len())
            .position(|w| w == b"Shape.txt")
            .unwrap();
        bytes[at..at + 5].copy_from_slice(b"Other");
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(NodeDbError::IntegrityFailed { .. })
        ));
    }

    #[test]
    fn foreign_truncated_and_newer_files() {
        assert!(matches!(
            Snapshot::from_bytes(b"Shape : X3DShapeNode { }"),
            Err(NodeDbError::InvalidMagic)
        ));

        let bytes = Snapshot::new(sample()).to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 1];
        assert!(matches!(
            Snapshot::from_bytes(cut),
            Err(NodeDbError::Truncated { needed, actual })
                if needed == bytes.len() && actual == cut.len()
        ));
        assert!(matches!(
            Snapshot::from_bytes(b"NDB"),
            Err(NodeDbError::Truncated { .. })
        ));

        let mut newer = bytes.clone();
        newer[4] = VERSION.0 + 1;
        assert!(matches!(
            Snapshot::from_bytes(&newer),
            Err(NodeDbError::UnsupportedVersion { minor: 1, .. })
        ));
    }
}
