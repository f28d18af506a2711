//! Optional consistency checks over a resolved database.
//!
//! These are not part of resolution. Specification text conventionally
//! repeats every inherited field on each node, so a missing or altered
//! redeclaration is worth reporting, but it never blocks loading.

use std::fmt;

use crate::db::NodeDb;
use crate::error::Result;

/// A problem found by [`check_db`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// The node the issue was found on.
    pub node: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for CheckIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.node, self.message)
    }
}

/// Run every check, returning issues in database order.
pub fn check_db(db: &NodeDb) -> Result<Vec<CheckIssue>> {
    let mut issues = Vec::new();

    for node in db.nodes() {
        for parent in db.super_nodes(&node.type_name)? {
            for entry in db.field_view(&parent.type_name)? {
                let inherited = entry.field;
                match node.field(&inherited.name) {
                    None => issues.push(CheckIssue {
                        severity: "warning",
                        node: node.type_name.clone(),
                        message: format!(
                            "field {} of super type {} is not redeclared",
                            inherited.name, parent.type_name
                        ),
                    }),
                    Some(own) if !own.same_signature(inherited) => issues.push(CheckIssue {
                        severity: "error",
                        node: node.type_name.clone(),
                        message: format!(
                            "field {} is declared as {} {} but {} declares {} {}",
                            own.name,
                            own.field_type,
                            own.access,
                            entry.owner.type_name,
                            inherited.field_type,
                            inherited.access
                        ),
                    }),
                    Some(_) => {}
                }
            }
        }

        for field in node.fields().iter().filter(|f| f.field_type.is_node_ref()) {
            for type_name in &field.valid_value_types {
                if !db.contains(type_name) {
                    issues.push(CheckIssue {
                        severity: "warning",
                        node: node.type_name.clone(),
                        message: format!(
                            "field {} accepts unknown node type {}",
                            field.name, type_name
                        ),
                    });
                }
            }
        }
    }

    // A field missing on several paths is reported once per parent; keep
    // the first report.
    let mut seen = Vec::new();
    issues.retain(|issue| {
        let key = (issue.node.clone(), issue.message.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{AccessMode, Field, FieldType};
    use crate::node::Node;

    fn metadata(access: AccessMode) -> Field {
        Field::new(FieldType::SFNode, access, "metadata")
            .with_value("NULL")
            .with_valid_value_types(["X3DMetadataObject"])
    }

    #[test]
    fn clean_database_has_no_issues() {
        let mut db = NodeDb::from_nodes([
            Node::new("X3DMetadataObject"),
            Node::new("X3DNode")
                .with_field(metadata(AccessMode::InputOutput))
                .unwrap(),
            Node::new("Box")
                .with_super_types(["X3DNode"])
                .with_field(metadata(AccessMode::InputOutput))
                .unwrap(),
        ])
        .unwrap();
        db.resolve().unwrap();
        assert!(check_db(&db).unwrap().is_empty());
    }

    #[test]
    fn reports_missing_mismatched_and_unknown() {
        let mut db = NodeDb::from_nodes([
            Node::new("X3DNode")
                .with_field(metadata(AccessMode::InputOutput))
                .unwrap(),
            Node::new("Box").with_super_types(["X3DNode"]),
            Node::new("Sphere")
                .with_super_types(["X3DNode"])
                .with_field(metadata(AccessMode::InitializeOnly))
                .unwrap(),
        ])
        .unwrap();
        db.resolve().unwrap();
        let issues = check_db(&db).unwrap();

        assert!(issues
            .iter()
            .any(|i| i.node == "Box" && i.message.contains("not redeclared")));
        assert!(issues
            .iter()
            .any(|i| i.node == "Sphere" && i.severity == "error"));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("unknown node type X3DMetadataObject")));
    }

    #[test]
    fn unresolved_database_is_rejected() {
        let db = NodeDb::from_nodes([Node::new("X3DNode")]).unwrap();
        assert!(check_db(&db).is_err());
    }
}
