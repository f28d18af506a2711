//! The type database: a name-keyed registry of nodes plus the hierarchy
//! state derived by [`NodeDb::resolve`].
//!
//! Links between nodes are index lists into the registry, never owning
//! references. Derived state is dropped by every structural mutation and
//! rebuilt from scratch by the next `resolve()`.

use std::collections::{BTreeSet, HashMap};

use crate::error::{NodeDbError, Result};
use crate::field::Field;
use crate::node::Node;

/// Counts reported by [`NodeDb::summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbSummary {
    pub total: usize,
    pub abstract_nodes: usize,
    pub concrete_nodes: usize,
    pub components: usize,
}

/// A field as seen from a node, with its first-declaration set.
#[derive(Debug, Clone)]
pub struct FieldEntry<'a> {
    pub field: &'a Field,
    /// The node whose own field list holds `field`.
    pub owner: &'a Node,
    /// Nodes at which the field is first introduced along some path.
    pub declared_in: Vec<&'a Node>,
}

/// Transitive supertypes of a node.
#[derive(Debug, Clone, Default)]
pub struct Bases<'a> {
    /// Every ancestor, depth-first in declaration order.
    pub all: Vec<&'a Node>,
    /// Ancestors reachable along more than one path.
    pub shared: Vec<&'a Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Hierarchy {
    pub(crate) supers: Vec<Vec<usize>>,
    pub(crate) derived: Vec<Vec<usize>>,
    pub(crate) roots: Vec<usize>,
    /// All field names visible on each node, own and inherited.
    field_names: Vec<BTreeSet<String>>,
    /// Per node, per own field: first-declaring node indices.
    declared_in: Vec<Vec<Vec<usize>>>,
}

/// The node-type database.
#[derive(Debug, Clone, Default)]
pub struct NodeDb {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    hierarchy: Option<Hierarchy>,
}

impl PartialEq for NodeDb {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl NodeDb {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database from nodes in insertion order. Not resolved.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut db = Self::new();
        for node in nodes {
            db.add_node(node)?;
        }
        Ok(db)
    }

    // --- Registry ---

    /// Insert a complete node. A duplicate type name is fatal.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.index.contains_key(&node.type_name) {
            return Err(NodeDbError::DuplicateNode(node.type_name));
        }
        self.index.insert(node.type_name.clone(), self.nodes.len());
        self.nodes.push(node);
        self.hierarchy = None;
        Ok(())
    }

    /// Look up a node by type name.
    pub fn get(&self, type_name: &str) -> Option<&Node> {
        self.index.get(type_name).map(|&i| &self.nodes[i])
    }

    /// Mutable access to a node. Invalidates the resolved hierarchy.
    pub fn node_mut(&mut self, type_name: &str) -> Option<&mut Node> {
        let i = *self.index.get(type_name)?;
        self.hierarchy = None;
        Some(&mut self.nodes[i])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.index.contains_key(type_name)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of own fields across all nodes.
    pub fn field_count(&self) -> usize {
        self.nodes.iter().map(|n| n.fields().len()).sum()
    }

    /// Distinct component names in first-seen order.
    pub fn components(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for component in self.nodes.iter().filter_map(|n| n.component.as_deref()) {
            if !seen.contains(&component) {
                seen.push(component);
            }
        }
        seen
    }

    /// Nodes belonging to a component, in insertion order.
    pub fn component_nodes(&self, component: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.component.as_deref() == Some(component))
            .collect()
    }

    pub fn summary(&self) -> DbSummary {
        let abstract_nodes = self.nodes.iter().filter(|n| n.is_abstract).count();
        DbSummary {
            total: self.nodes.len(),
            abstract_nodes,
            concrete_nodes: self.nodes.len() - abstract_nodes,
            components: self.components().len(),
        }
    }

    // --- Resolution ---

    /// Recompute supertype/subtype links, roots and first-declaration sets.
    ///
    /// Idempotent. Fails on a supertype name with no matching node and on a
    /// supertype cycle; on failure the database stays unresolved.
    pub fn resolve(&mut self) -> Result<()> {
        self.hierarchy = None;
        let n = self.nodes.len();

        let mut supers: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut derived: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            for name in &node.super_types {
                let j = *self.index.get(name).ok_or_else(|| {
                    NodeDbError::UnresolvedSuperType {
                        node: node.type_name.clone(),
                        super_type: name.clone(),
                    }
                })?;
                if !supers[i].contains(&j) {
                    supers[i].push(j);
                    derived[j].push(i);
                }
            }
        }

        let order = self.ancestors_first(&supers)?;
        let roots: Vec<usize> = (0..n).filter(|&i| supers[i].is_empty()).collect();

        let mut field_names: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];
        for &i in &order {
            let mut names: BTreeSet<String> =
                self.nodes[i].fields().iter().map(|f| f.name.clone()).collect();
            for &s in &supers[i] {
                names.extend(field_names[s].iter().cloned());
            }
            field_names[i] = names;
        }

        let declared_in = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                node.fields()
                    .iter()
                    .map(|f| first_declarers(i, &f.name, &supers, &field_names))
                    .collect()
            })
            .collect();

        tracing::debug!(nodes = n, roots = roots.len(), "resolved node hierarchy");
        self.hierarchy = Some(Hierarchy {
            supers,
            derived,
            roots,
            field_names,
            declared_in,
        });
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.hierarchy.is_some()
    }

    /// Order nodes so every supertype precedes its subtypes, failing on a
    /// supertype cycle.
    fn ancestors_first(&self, supers: &[Vec<usize>]) -> Result<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; supers.len()];
        let mut order = Vec::with_capacity(supers.len());
        for start in 0..supers.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::InProgress;
            while let Some((v, next)) = stack.last_mut() {
                let v = *v;
                if let Some(&s) = supers[v].get(*next) {
                    *next += 1;
                    match marks[s] {
                        Mark::Unvisited => {
                            marks[s] = Mark::InProgress;
                            stack.push((s, 0));
                        }
                        Mark::InProgress => {
                            return Err(NodeDbError::SuperTypeCycle(
                                self.nodes[s].type_name.clone(),
                            ))
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[v] = Mark::Done;
                    order.push(v);
                    stack.pop();
                }
            }
        }
        Ok(order)
    }

    pub(crate) fn hierarchy(&self) -> Result<&Hierarchy> {
        self.hierarchy.as_ref().ok_or(NodeDbError::NotResolved)
    }

    pub(crate) fn index_of(&self, type_name: &str) -> Result<usize> {
        self.index
            .get(type_name)
            .copied()
            .ok_or_else(|| NodeDbError::NodeNotFound(type_name.to_string()))
    }

    fn resolve_indices(&self, indices: &[usize]) -> Vec<&Node> {
        indices.iter().map(|&i| &self.nodes[i]).collect()
    }

    // --- Hierarchy queries (valid after resolve) ---

    /// Nodes without supertypes, in insertion order.
    pub fn roots(&self) -> Result<Vec<&Node>> {
        Ok(self.resolve_indices(&self.hierarchy()?.roots))
    }

    /// Direct supertypes of a node, deduplicated, in declaration order.
    pub fn super_nodes(&self, type_name: &str) -> Result<Vec<&Node>> {
        let h = self.hierarchy()?;
        Ok(self.resolve_indices(&h.supers[self.index_of(type_name)?]))
    }

    /// Direct subtypes of a node, in insertion order.
    pub fn derived_nodes(&self, type_name: &str) -> Result<Vec<&Node>> {
        let h = self.hierarchy()?;
        Ok(self.resolve_indices(&h.derived[self.index_of(type_name)?]))
    }

    /// Every transitive subtype of a node, in discovery order.
    pub fn all_derived(&self, type_name: &str) -> Result<Vec<&Node>> {
        let h = self.hierarchy()?;
        let start = self.index_of(type_name)?;
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        let mut stack: Vec<usize> = h.derived[start].iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            out.push(i);
            stack.extend(h.derived[i].iter().rev());
        }
        Ok(self.resolve_indices(&out))
    }

    /// Every transitive supertype of a node, plus those reached twice.
    pub fn bases(&self, type_name: &str) -> Result<Bases<'_>> {
        let h = self.hierarchy()?;
        let start = self.index_of(type_name)?;
        let mut visits = vec![0usize; self.nodes.len()];
        let mut all = Vec::new();
        let mut stack: Vec<usize> = h.supers[start].iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            visits[i] += 1;
            if visits[i] == 1 {
                all.push(i);
                stack.extend(h.supers[i].iter().rev());
            }
        }
        let shared: Vec<usize> = all.iter().copied().filter(|&i| visits[i] > 1).collect();
        Ok(Bases {
            all: self.resolve_indices(&all),
            shared: self.resolve_indices(&shared),
        })
    }

    /// Whether the node has the field as its own or through an ancestor.
    pub fn has_field(&self, type_name: &str, field: &str) -> Result<bool> {
        let h = self.hierarchy()?;
        Ok(h.field_names[self.index_of(type_name)?].contains(field))
    }

    /// First-declaration set of a field visible on a node.
    ///
    /// Empty when the node neither declares nor inherits the field.
    pub fn declaring_nodes(&self, type_name: &str, field: &str) -> Result<Vec<&Node>> {
        let h = self.hierarchy()?;
        let i = self.index_of(type_name)?;
        if let Some(fi) = self.nodes[i].field_index(field) {
            return Ok(self.resolve_indices(&h.declared_in[i][fi]));
        }
        if !h.field_names[i].contains(field) {
            return Ok(Vec::new());
        }
        let declarers = first_declarers(i, field, &h.supers, &h.field_names);
        Ok(self.resolve_indices(&declarers))
    }

    /// Own fields first introduced at this node rather than inherited.
    pub fn introduced_fields(&self, type_name: &str) -> Result<Vec<&Field>> {
        let h = self.hierarchy()?;
        let i = self.index_of(type_name)?;
        Ok(self.nodes[i]
            .fields()
            .iter()
            .zip(&h.declared_in[i])
            .filter(|(_, declarers)| declarers.contains(&i))
            .map(|(f, _)| f)
            .collect())
    }

    /// Every field visible on a node: its own fields in declaration order,
    /// then inherited fields not redeclared, taken from ancestors in
    /// [`bases`](Self::bases) order.
    pub fn field_view(&self, type_name: &str) -> Result<Vec<FieldEntry<'_>>> {
        let node = self
            .get(type_name)
            .ok_or_else(|| NodeDbError::NodeNotFound(type_name.to_string()))?;
        let bases = self.bases(type_name)?;

        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();
        for owner in std::iter::once(node).chain(bases.all) {
            for field in owner.fields() {
                if seen.insert(field.name.as_str()) {
                    entries.push(FieldEntry {
                        field,
                        owner,
                        declared_in: self.declaring_nodes(&owner.type_name, &field.name)?,
                    });
                }
            }
        }
        Ok(entries)
    }
}

/// Nodes that first introduce `field` as seen from node `i`.
///
/// A node is a declarer unless one of its direct supertypes also has the
/// field; otherwise the result is the union over those supertypes.
fn first_declarers(
    i: usize,
    field: &str,
    supers: &[Vec<usize>],
    field_names: &[BTreeSet<String>],
) -> Vec<usize> {
    fn walk(
        i: usize,
        field: &str,
        supers: &[Vec<usize>],
        field_names: &[BTreeSet<String>],
        out: &mut Vec<usize>,
    ) {
        let mut inherited = false;
        for &s in &supers[i] {
            if field_names[s].contains(field) {
                inherited = true;
                walk(s, field, supers, field_names, out);
            }
        }
        if !inherited && !out.contains(&i) {
            out.push(i);
        }
    }

    let mut out = Vec::new();
    walk(i, field, supers, field_names, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{AccessMode, FieldType};

    fn float_field(name: &str) -> Field {
        Field::new(FieldType::SFFloat, AccessMode::InitializeOnly, name).with_value("0")
    }

    fn names(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.type_name.clone()).collect()
    }

    fn diamond() -> NodeDb {
        NodeDb::from_nodes([
            Node::new("A").with_field(float_field("f")).unwrap(),
            Node::new("B").with_super_types(["A"]),
            Node::new("C").with_super_types(["A"]),
            Node::new("D").with_super_types(["B", "C"]),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_node_is_fatal() {
        let mut db = NodeDb::new();
        db.add_node(Node::new("Shape")).unwrap();
        assert!(matches!(
            db.add_node(Node::new("Shape")),
            Err(NodeDbError::DuplicateNode(name)) if name == "Shape"
        ));
    }

    #[test]
    fn queries_before_resolve_fail() {
        let db = diamond();
        assert!(!db.is_resolved());
        assert!(matches!(db.roots(), Err(NodeDbError::NotResolved)));
        assert!(db.get("D").is_some());
    }

    #[test]
    fn links_and_roots() {
        let mut db = diamond();
        db.resolve().unwrap();
        assert_eq!(names(&db.roots().unwrap()), ["A"]);
        assert_eq!(names(&db.super_nodes("D").unwrap()), ["B", "C"]);
        assert_eq!(names(&db.derived_nodes("A").unwrap()), ["B", "C"]);
        assert_eq!(names(&db.all_derived("A").unwrap()), ["B", "D", "C"]);
    }

    #[test]
    fn duplicate_super_type_names_collapse() {
        let mut db = NodeDb::from_nodes([
            Node::new("A"),
            Node::new("B").with_super_types(["A", "A"]),
        ])
        .unwrap();
        db.resolve().unwrap();
        assert_eq!(names(&db.super_nodes("B").unwrap()), ["A"]);
        assert_eq!(names(&db.derived_nodes("A").unwrap()), ["B"]);
    }

    #[test]
    fn diamond_declares_once() {
        let mut db = diamond();
        db.resolve().unwrap();
        assert_eq!(names(&db.declaring_nodes("D", "f").unwrap()), ["A"]);
        assert!(db.has_field("D", "f").unwrap());
        let bases = db.bases("D").unwrap();
        assert_eq!(names(&bases.all), ["B", "A", "C"]);
        assert_eq!(names(&bases.shared), ["A"]);
    }

    #[test]
    fn diamond_with_independent_declarers() {
        let mut db = NodeDb::from_nodes([
            Node::new("B").with_field(float_field("x")).unwrap(),
            Node::new("C").with_field(float_field("x")).unwrap(),
            Node::new("D")
                .with_super_types(["B", "C"])
                .with_field(float_field("x"))
                .unwrap(),
        ])
        .unwrap();
        db.resolve().unwrap();
        assert_eq!(names(&db.declaring_nodes("D", "x").unwrap()), ["B", "C"]);
    }

    #[test]
    fn redeclared_field_keeps_local_instance() {
        let a_field = float_field("x");
        let b_field = float_field("x").with_comment("redeclared");
        let mut db = NodeDb::from_nodes([
            Node::new("A").with_field(a_field).unwrap(),
            Node::new("B")
                .with_super_types(["A"])
                .with_field(b_field.clone())
                .unwrap(),
        ])
        .unwrap();
        db.resolve().unwrap();

        let view = db.field_view("B").unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].owner.type_name, "B");
        assert_eq!(view[0].field, &b_field);
        assert_eq!(names(&db.declaring_nodes("A", "x").unwrap()), ["A"]);
        assert_eq!(names(&view[0].declared_in), ["A"]);
        assert!(db.introduced_fields("B").unwrap().is_empty());
        assert_eq!(db.introduced_fields("A").unwrap().len(), 1);
    }

    #[test]
    fn field_view_includes_inherited() {
        let mut db = NodeDb::from_nodes([
            Node::new("X3DNode").with_field(float_field("metadata")).unwrap(),
            Node::new("Box")
                .with_super_types(["X3DNode"])
                .with_field(float_field("size"))
                .unwrap(),
        ])
        .unwrap();
        db.resolve().unwrap();
        let view = db.field_view("Box").unwrap();
        let listed: Vec<(&str, &str)> = view
            .iter()
            .map(|e| (e.field.name.as_str(), e.owner.type_name.as_str()))
            .collect();
        assert_eq!(listed, [("size", "Box"), ("metadata", "X3DNode")]);
        assert_eq!(names(&db.declaring_nodes("Box", "metadata").unwrap()), ["X3DNode"]);
        assert!(db.declaring_nodes("Box", "nope").unwrap().is_empty());
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut db = diamond();
        db.resolve().unwrap();
        let first = db.hierarchy.clone();
        db.resolve().unwrap();
        assert_eq!(first, db.hierarchy);
    }

    #[test]
    fn unresolved_super_type_names_both() {
        let mut db = NodeDb::from_nodes([Node::new("Foo").with_super_types(["Bar"])]).unwrap();
        match db.resolve() {
            Err(NodeDbError::UnresolvedSuperType { node, super_type }) => {
                assert_eq!(node, "Foo");
                assert_eq!(super_type, "Bar");
            }
            other => panic!("expected unresolved super type, got {other:?}"),
        }
        assert!(!db.is_resolved());
    }

    #[test]
    fn forward_references_resolve() {
        let mut db = NodeDb::from_nodes([
            Node::new("Box").with_super_types(["X3DGeometryNode"]),
            Node::new("X3DGeometryNode"),
        ])
        .unwrap();
        db.resolve().unwrap();
        assert_eq!(names(&db.roots().unwrap()), ["X3DGeometryNode"]);
    }

    #[test]
    fn super_type_cycle_detected() {
        let mut db = NodeDb::from_nodes([
            Node::new("P").with_super_types(["Q"]),
            Node::new("Q").with_super_types(["P"]),
        ])
        .unwrap();
        assert!(matches!(db.resolve(), Err(NodeDbError::SuperTypeCycle(_))));
    }

    #[test]
    fn mutation_invalidates() {
        let mut db = diamond();
        db.resolve().unwrap();
        db.node_mut("D").unwrap().super_types = vec!["B".into()];
        assert!(!db.is_resolved());
        db.resolve().unwrap();
        assert_eq!(names(&db.super_nodes("D").unwrap()), ["B"]);
    }

    #[test]
    fn components_and_summary() {
        let db = NodeDb::from_nodes([
            Node::new("X3DNode").with_component("Core"),
            Node::new("Box").with_component("Geometry3D"),
            Node::new("Sphere").with_component("Geometry3D"),
        ])
        .unwrap();
        assert_eq!(db.components(), ["Core", "Geometry3D"]);
        assert_eq!(db.component_nodes("Geometry3D").len(), 2);
        let summary = db.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.abstract_nodes, 1);
        assert_eq!(summary.concrete_nodes, 2);
    }
}
