//! Node-type database.
//!
//! Holds node type records (name, supertypes, typed fields, annotations)
//! keyed by unique type name, and derives from them:
//!
//! - the multiple-inheritance hierarchy: supertype and subtype links, roots,
//!   and for every field the set of nodes that first declare it;
//! - a construction-dependency order that tolerates reference cycles;
//! - structural diffs between two databases;
//! - optional consistency checks;
//! - a binary snapshot format whose loader always re-resolves.

pub mod annotation;
pub mod check;
pub mod db;
pub mod diff;
pub mod error;
pub mod field;
pub mod node;
pub mod snapshot;
pub mod topo;

pub use annotation::Annotations;
pub use check::{check_db, CheckIssue};
pub use db::{Bases, DbSummary, FieldEntry, NodeDb};
pub use diff::{diff, DbDiff, DiffOptions, NodeChange, NodeDiff};
pub use error::NodeDbError;
pub use field::{parse_field_value, AccessMode, Field, FieldType, FieldValue, ValueKind};
pub use node::{AttributeValue, Node};
pub use snapshot::Snapshot;
pub use topo::{topological_order, DependencyGraph, TopoOrder, UnknownReference};
