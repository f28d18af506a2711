//! Node type records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NodeDbError, Result};
use crate::field::Field;

/// Name prefix that marks a node type abstract unless overridden.
pub const DEFAULT_ABSTRACT_PREFIX: &str = "X3D";

/// Attribute routed to [`Node::is_abstract`].
pub const ABSTRACT_ATTRIBUTE: &str = "abstract";

/// Attribute routed to [`Node::component`].
pub const COMPONENT_ATTRIBUTE: &str = "componentName";

/// Value of a node-level `attribute` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Truthiness used when an attribute sets a boolean node property.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttributeValue::Bool(b) => *b,
            AttributeValue::Int(i) => *i != 0,
            AttributeValue::Float(x) => *x != 0.0,
            AttributeValue::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(true) => write!(f, "TRUE"),
            AttributeValue::Bool(false) => write!(f, "FALSE"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x:?}"),
            AttributeValue::String(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
    }
}

/// A node type: identity, supertypes, own fields and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique type name.
    pub type_name: String,
    /// Declared supertype names, in declaration order.
    pub super_types: Vec<String>,
    pub is_abstract: bool,
    /// Component grouping.
    pub component: Option<String>,
    /// Source file or fragment the node was parsed from.
    pub origin: Option<String>,
    /// Attributes without a dedicated property.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    fields: Vec<Field>,
}

impl Node {
    /// Create a node with no supertypes or fields.
    ///
    /// The abstract flag defaults from [`DEFAULT_ABSTRACT_PREFIX`].
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let is_abstract = type_name.starts_with(DEFAULT_ABSTRACT_PREFIX);
        Self {
            type_name,
            super_types: Vec::new(),
            is_abstract,
            component: None,
            origin: None,
            attributes: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    /// Builder: set the supertypes.
    pub fn with_super_types<I, S>(mut self, super_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.super_types = super_types.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the abstract flag.
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Builder: set the component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Builder: set the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Builder: add a field, failing on a duplicate name.
    pub fn with_field(mut self, field: Field) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Append a field to the node's own fields.
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.field(&field.name).is_some() {
            return Err(NodeDbError::DuplicateField {
                node: self.type_name.clone(),
                field: field.name,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Set an attribute, routing `abstract` and `componentName` to their
    /// dedicated properties.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match name.as_str() {
            ABSTRACT_ATTRIBUTE => self.is_abstract = value.is_truthy(),
            COMPONENT_ATTRIBUTE => {
                self.component = Some(match value {
                    AttributeValue::String(s) => s,
                    other => other.to_string(),
                })
            }
            _ => {
                self.attributes.insert(name, value);
            }
        }
    }

    /// The node's own fields, in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up an own field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Re-add the own fields one at a time so a repeated name is caught
    /// even when the node was built by deserialization.
    pub(crate) fn revalidated(mut self) -> Result<Self> {
        for field in std::mem::take(&mut self.fields) {
            self.add_field(field)?;
        }
        Ok(self)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether the node has no declared supertypes.
    pub fn is_root(&self) -> bool {
        self.super_types.is_empty()
    }
}

/// Renders the node as specification text that parses back to an equal node.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.super_types.is_empty() {
            writeln!(f, "{} {{", self.type_name)?;
        } else {
            writeln!(f, "{} : {} {{", self.type_name, self.super_types.join(","))?;
        }
        writeln!(
            f,
            "  attribute {ABSTRACT_ATTRIBUTE} {}",
            AttributeValue::Bool(self.is_abstract)
        )?;
        if let Some(component) = &self.component {
            writeln!(
                f,
                "  attribute {COMPONENT_ATTRIBUTE} {}",
                AttributeValue::String(component.clone())
            )?;
        }
        for (name, value) in &self.attributes {
            writeln!(f, "  attribute {name} {value}")?;
        }
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        write!(f, "}}")
    }
}
