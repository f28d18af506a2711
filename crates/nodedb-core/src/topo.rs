//! Construction-dependency ordering of node types.
//!
//! The dependency graph has an edge `T -> U` when `U` must be defined after
//! `T`: `T` is a supertype of `U`, or `T` appears in the valid-value types
//! of one of `U`'s node-reference fields. Reference edges routinely form
//! cycles, so ordering reports cycle witnesses instead of failing.

use std::collections::HashMap;

use crate::db::NodeDb;
use crate::error::Result;

/// A valid-value type that names no node in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownReference {
    pub node: String,
    pub field: String,
    pub type_name: String,
}

/// Result of [`DependencyGraph::sort`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopoOrder {
    /// Every vertex exactly once; dependencies first unless a cycle
    /// forces otherwise.
    pub order: Vec<String>,
    /// Edges `(u, v)` into a vertex still in progress during the search.
    pub back_edges: Vec<(String, String)>,
}

impl TopoOrder {
    pub fn is_acyclic(&self) -> bool {
        self.back_edges.is_empty()
    }
}

/// Directed graph over node type names.
///
/// Vertices and each vertex's out-edges keep insertion order, which makes
/// the search and its output deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
    unknown: Vec<UnknownReference>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a resolved database.
    ///
    /// Vertices follow database insertion order. Hierarchy edges come from
    /// the resolved links; reference edges from every own node-reference
    /// field. Unknown referenced types are recorded and skipped.
    pub fn from_db(db: &NodeDb) -> Result<Self> {
        let hierarchy = db.hierarchy()?;
        let mut graph = Self::new();
        for node in db.nodes() {
            graph.add_vertex(&node.type_name);
        }
        for (i, node) in db.nodes().iter().enumerate() {
            for &s in &hierarchy.supers[i] {
                graph.add_edge(&db.nodes()[s].type_name, &node.type_name);
            }
            for field in node.fields().iter().filter(|f| f.field_type.is_node_ref()) {
                for type_name in &field.valid_value_types {
                    if db.contains(type_name) {
                        graph.add_edge(type_name, &node.type_name);
                    } else {
                        tracing::warn!(
                            node = %node.type_name,
                            field = %field.name,
                            type_name = %type_name,
                            "unknown node type in valid value types"
                        );
                        graph.unknown.push(UnknownReference {
                            node: node.type_name.clone(),
                            field: field.name.clone(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
        }
        Ok(graph)
    }

    /// Add a vertex if absent, returning its index.
    pub fn add_vertex(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.vertices.len();
        self.vertices.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.edges.push(Vec::new());
        i
    }

    /// Add an edge `from -> to`, adding missing vertices. Parallel edges
    /// collapse.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let u = self.add_vertex(from);
        let v = self.add_vertex(to);
        if !self.edges[u].contains(&v) {
            self.edges[u].push(v);
        }
    }

    pub fn vertices(&self) -> &[String] {
        &self.vertices
    }

    /// All edges as name pairs.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .enumerate()
            .flat_map(|(u, targets)| {
                targets
                    .iter()
                    .map(move |&v| (self.vertices[u].as_str(), self.vertices[v].as_str()))
            })
            .collect()
    }

    pub fn unknown_references(&self) -> &[UnknownReference] {
        &self.unknown
    }

    /// Three-color depth-first search; the order is the reverse finish
    /// order.
    pub fn sort(&self) -> TopoOrder {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        let n = self.vertices.len();
        let mut colors = vec![Color::White; n];
        let mut finished = Vec::with_capacity(n);
        let mut back_edges = Vec::new();

        for start in 0..n {
            if colors[start] != Color::White {
                continue;
            }
            colors[start] = Color::Grey;
            let mut stack = vec![(start, 0usize)];
            while let Some((u, next)) = stack.last_mut() {
                let u = *u;
                if let Some(&v) = self.edges[u].get(*next) {
                    *next += 1;
                    match colors[v] {
                        Color::White => {
                            colors[v] = Color::Grey;
                            stack.push((v, 0));
                        }
                        Color::Grey => {
                            tracing::debug!(
                                from = %self.vertices[u],
                                to = %self.vertices[v],
                                "back edge"
                            );
                            back_edges.push((self.vertices[u].clone(), self.vertices[v].clone()));
                        }
                        Color::Black => {}
                    }
                } else {
                    colors[u] = Color::Black;
                    finished.push(u);
                    stack.pop();
                }
            }
        }

        if !back_edges.is_empty() {
            tracing::warn!(cycles = back_edges.len(), "dependency graph has cycles");
        }

        TopoOrder {
            order: finished
                .into_iter()
                .rev()
                .map(|i| self.vertices[i].clone())
                .collect(),
            back_edges,
        }
    }
}

/// Order the nodes of a resolved database.
pub fn topological_order(db: &NodeDb) -> Result<TopoOrder> {
    Ok(DependencyGraph::from_db(db)?.sort())
}
