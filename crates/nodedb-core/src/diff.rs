//! Structural comparison of two databases.
//!
//! Nodes are matched by type name and fields by name. All name sets are
//! walked in lexicographic order so reports are reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::db::NodeDb;
use crate::field::Field;
use crate::node::{AttributeValue, Node};

/// Options for [`diff`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Also compare node origins. Regenerated databases of equal content
    /// usually differ there, so this is off by default.
    pub compare_origin: bool,
}

/// One difference inside a node present in both databases.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    SuperTypes {
        before: Vec<String>,
        after: Vec<String>,
    },
    Origin {
        before: Option<String>,
        after: Option<String>,
    },
    Abstract {
        before: bool,
        after: bool,
    },
    Component {
        before: Option<String>,
        after: Option<String>,
    },
    Attributes {
        before: BTreeMap<String, AttributeValue>,
        after: BTreeMap<String, AttributeValue>,
    },
    FieldChanged {
        before: Field,
        after: Field,
    },
    FieldRemoved(Field),
    FieldAdded(Field),
}

/// All differences of one node present in both databases.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDiff {
    pub type_name: String,
    pub changes: Vec<NodeChange>,
}

/// Result of comparing an old database against a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbDiff {
    /// Type names only in the new database, sorted.
    pub added: Vec<String>,
    /// Type names only in the old database, sorted.
    pub removed: Vec<String>,
    /// Nodes in both databases that differ, sorted by type name.
    pub changed: Vec<NodeDiff>,
}

impl DbDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare two databases. Resolution state is not consulted.
pub fn diff(old: &NodeDb, new: &NodeDb, options: &DiffOptions) -> DbDiff {
    let old_names: BTreeSet<&str> = old.nodes().iter().map(|n| n.type_name.as_str()).collect();
    let new_names: BTreeSet<&str> = new.nodes().iter().map(|n| n.type_name.as_str()).collect();

    let changed = old_names
        .intersection(&new_names)
        .filter_map(|name| match (old.get(name), new.get(name)) {
            (Some(a), Some(b)) => diff_nodes(a, b, options),
            _ => None,
        })
        .collect();

    DbDiff {
        added: new_names.difference(&old_names).map(|s| s.to_string()).collect(),
        removed: old_names.difference(&new_names).map(|s| s.to_string()).collect(),
        changed,
    }
}

/// Compare two versions of a node; `None` when they are equal.
pub fn diff_nodes(old: &Node, new: &Node, options: &DiffOptions) -> Option<NodeDiff> {
    let mut changes = Vec::new();

    if old.super_types != new.super_types {
        changes.push(NodeChange::SuperTypes {
            before: old.super_types.clone(),
            after: new.super_types.clone(),
        });
    }
    if options.compare_origin && old.origin != new.origin {
        changes.push(NodeChange::Origin {
            before: old.origin.clone(),
            after: new.origin.clone(),
        });
    }
    if old.is_abstract != new.is_abstract {
        changes.push(NodeChange::Abstract {
            before: old.is_abstract,
            after: new.is_abstract,
        });
    }
    if old.component != new.component {
        changes.push(NodeChange::Component {
            before: old.component.clone(),
            after: new.component.clone(),
        });
    }
    if old.attributes != new.attributes {
        changes.push(NodeChange::Attributes {
            before: old.attributes.clone(),
            after: new.attributes.clone(),
        });
    }

    let old_fields: BTreeMap<&str, &Field> =
        old.fields().iter().map(|f| (f.name.as_str(), f)).collect();
    let new_fields: BTreeMap<&str, &Field> =
        new.fields().iter().map(|f| (f.name.as_str(), f)).collect();

    for (name, before) in &old_fields {
        if let Some(after) = new_fields.get(name) {
            if before != after {
                changes.push(NodeChange::FieldChanged {
                    before: (*before).clone(),
                    after: (*after).clone(),
                });
            }
        }
    }
    for (name, field) in &old_fields {
        if !new_fields.contains_key(name) {
            changes.push(NodeChange::FieldRemoved((*field).clone()));
        }
    }
    for (name, field) in &new_fields {
        if !old_fields.contains_key(name) {
            changes.push(NodeChange::FieldAdded((*field).clone()));
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(NodeDiff {
            type_name: old.type_name.clone(),
            changes,
        })
    }
}

fn fmt_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<none>")
}

fn fmt_attributes(attributes: &BTreeMap<String, AttributeValue>) -> String {
    let pairs: Vec<String> = attributes.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", pairs.join(", "))
}

impl fmt::Display for NodeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeChange::SuperTypes { before, after } => {
                writeln!(f, "- superTypes {}", before.join(","))?;
                write!(f, "+ superTypes {}", after.join(","))
            }
            NodeChange::Origin { before, after } => {
                writeln!(f, "- origin {}", fmt_opt(before))?;
                write!(f, "+ origin {}", fmt_opt(after))
            }
            NodeChange::Abstract { before, after } => {
                writeln!(f, "- abstract {before}")?;
                write!(f, "+ abstract {after}")
            }
            NodeChange::Component { before, after } => {
                writeln!(f, "- componentName {}", fmt_opt(before))?;
                write!(f, "+ componentName {}", fmt_opt(after))
            }
            NodeChange::Attributes { before, after } => {
                writeln!(f, "- attributes {}", fmt_attributes(before))?;
                write!(f, "+ attributes {}", fmt_attributes(after))
            }
            NodeChange::FieldChanged { before, after } => {
                writeln!(f, "- field {before}")?;
                write!(f, "+ field {after}")
            }
            NodeChange::FieldRemoved(field) => write!(f, "- field {field}"),
            NodeChange::FieldAdded(field) => write!(f, "+ field {field}"),
        }
    }
}

impl fmt::Display for NodeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "@@ node {} @@", self.type_name)?;
        for change in &self.changes {
            writeln!(f, "{change}")?;
        }
        Ok(())
    }
}

/// Unified-diff style report: changed nodes, then removed, then added.
impl fmt::Display for DbDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.changed {
            writeln!(f, "{node}")?;
        }
        for name in &self.removed {
            writeln!(f, "- node {name}")?;
        }
        for name in &self.added {
            writeln!(f, "+ node {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{AccessMode, FieldType};

    fn field(name: &str, value: &str) -> Field {
        Field::new(FieldType::SFFloat, AccessMode::InputOutput, name).with_value(value)
    }

    fn db(nodes: Vec<Node>) -> NodeDb {
        NodeDb::from_nodes(nodes).unwrap()
    }

    #[test]
    fn identical_databases_have_no_diff() {
        let a = db(vec![Node::new("Box").with_field(field("size", "1")).unwrap()]);
        assert!(diff(&a, &a.clone(), &DiffOptions::default()).is_empty());
    }

    #[test]
    fn added_and_removed_are_symmetric() {
        let a = db(vec![Node::new("A"), Node::new("B"), Node::new("Z")]);
        let b = db(vec![Node::new("B"), Node::new("C"), Node::new("D")]);
        let ab = diff(&a, &b, &DiffOptions::default());
        let ba = diff(&b, &a, &DiffOptions::default());
        assert_eq!(ab.added, ["C", "D"]);
        assert_eq!(ab.removed, ["A", "Z"]);
        assert_eq!(ab.added, ba.removed);
        assert_eq!(ab.removed, ba.added);
    }

    #[test]
    fn field_changes_in_name_order() {
        let a = db(vec![Node::new("Box")
            .with_field(field("zeta", "1"))
            .unwrap()
            .with_field(field("alpha", "1"))
            .unwrap()
            .with_field(field("gone", "0"))
            .unwrap()]);
        let b = db(vec![Node::new("Box")
            .with_field(field("zeta", "2"))
            .unwrap()
            .with_field(field("alpha", "2"))
            .unwrap()
            .with_field(field("new", "0"))
            .unwrap()]);
        let d = diff(&a, &b, &DiffOptions::default());
        assert_eq!(d.changed.len(), 1);
        let changes = &d.changed[0].changes;
        assert!(matches!(&changes[0], NodeChange::FieldChanged { before, .. } if before.name == "alpha"));
        assert!(matches!(&changes[1], NodeChange::FieldChanged { before, .. } if before.name == "zeta"));
        assert!(matches!(&changes[2], NodeChange::FieldRemoved(f) if f.name == "gone"));
        assert!(matches!(&changes[3], NodeChange::FieldAdded(f) if f.name == "new"));
    }

    #[test]
    fn comment_and_annotation_changes_count() {
        let a = db(vec![Node::new("Box").with_field(field("size", "1")).unwrap()]);
        let b = db(vec![Node::new("Box")
            .with_field(field("size", "1").with_comment("meters"))
            .unwrap()]);
        assert_eq!(diff(&a, &b, &DiffOptions::default()).changed.len(), 1);
    }

    #[test]
    fn origin_comparison_is_opt_in() {
        let a = db(vec![Node::new("Box").with_origin("a.txt")]);
        let b = db(vec![Node::new("Box").with_origin("b.txt")]);
        assert!(diff(&a, &b, &DiffOptions::default()).is_empty());
        let full = diff(&a, &b, &DiffOptions { compare_origin: true });
        assert!(matches!(
            full.changed[0].changes[0],
            NodeChange::Origin { .. }
        ));
    }

    #[test]
    fn report_format() {
        let a = db(vec![
            Node::new("Box").with_super_types(["X3DGeometryNode"]),
            Node::new("Old"),
        ]);
        let b = db(vec![
            Node::new("Box").with_super_types(["X3DGeometryNode", "X3DBoundedObject"]),
            Node::new("New"),
        ]);
        let report = diff(&a, &b, &DiffOptions::default()).to_string();
        assert_eq!(
            report,
            "@@ node Box @@\n\
             - superTypes X3DGeometryNode\n\
             + superTypes X3DGeometryNode,X3DBoundedObject\n\
             \n\
             - node Old\n\
             + node New\n"
        );
    }
}
