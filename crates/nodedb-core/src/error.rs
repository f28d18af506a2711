//! Error types for the node-type database.

/// Fatal errors from the database, the resolver and the snapshot container.
///
/// Recoverable parse defects are not represented here; they are collected as
/// diagnostics by the parser.
#[derive(Debug, thiserror::Error)]
pub enum NodeDbError {
    #[error("node {0} is already declared")]
    DuplicateNode(String),

    #[error("field {field} is declared twice in node {node}")]
    DuplicateField { node: String, field: String },

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("in node {node} super type {super_type} is not declared")]
    UnresolvedSuperType {
        /// The node declaring the supertype.
        node: String,
        /// The supertype name that has no matching node.
        super_type: String,
    },

    #[error("super type cycle detected involving node {0}")]
    SuperTypeCycle(String),

    #[error("database hierarchy is not resolved; call resolve() first")]
    NotResolved,

    #[error("unknown field type {0}")]
    UnknownFieldType(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("not an NDB snapshot")]
    InvalidMagic,

    #[error("unsupported NDB version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("NDB snapshot truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("NDB snapshot hash mismatch: stored {stored}, computed {computed}")]
    IntegrityFailed { stored: String, computed: String },

    #[error("NDB header records {header} {what}, payload holds {payload}")]
    CountMismatch {
        what: &'static str,
        header: usize,
        payload: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_super_type_names_both_nodes() {
        let err = NodeDbError::UnresolvedSuperType {
            node: "Foo".into(),
            super_type: "Bar".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Foo"));
        assert!(msg.contains("Bar"));
    }

    #[test]
    fn snapshot_errors_describe_the_defect() {
        let err = NodeDbError::CountMismatch {
            what: "fields",
            header: 3,
            payload: 2,
        };
        assert_eq!(err.to_string(), "NDB header records 3 fields, payload holds 2");
        let err = NodeDbError::Truncated {
            needed: 52,
            actual: 4,
        };
        assert_eq!(err.to_string(), "NDB snapshot truncated: need 52 bytes, got 4");
        let err = NodeDbError::DuplicateField {
            node: "Box".into(),
            field: "size".into(),
        };
        assert_eq!(err.to_string(), "field size is declared twice in node Box");
    }
}
