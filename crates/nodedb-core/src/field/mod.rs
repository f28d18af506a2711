//! Field records: type tags, access modes and the `Field` itself.
//!
//! A field is a named, typed slot on a node type. The type tag is one of a
//! fixed set of single-valued (`SF*`) and multi-valued (`MF*`) kinds; the
//! access mode governs whether the field carries a default value.

pub mod value;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotations;
use crate::error::NodeDbError;

pub use value::{parse_field_value, FieldValue};

/// The scalar kind underlying a field type, shared by its SF and MF forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int32,
    Float,
    Double,
    Time,
    Vec2f,
    Vec2d,
    Vec3f,
    Vec3d,
    Vec4f,
    Vec4d,
    Matrix4f,
    Matrix4d,
    Color,
    ColorRgba,
    Rotation,
    String,
    Image,
    Node,
}

impl ValueKind {
    /// Numbers per tuple for numeric kinds, `None` for bool, string and node.
    pub fn tuple_width(self) -> Option<usize> {
        use ValueKind::*;
        match self {
            Int32 | Float | Double | Time => Some(1),
            Vec2f | Vec2d => Some(2),
            Vec3f | Vec3d | Color | Image => Some(3),
            Vec4f | Vec4d | ColorRgba | Rotation => Some(4),
            Matrix4f | Matrix4d => Some(16),
            Bool | String | Node => None,
        }
    }

    /// Whether the numbers of this kind are integers.
    pub fn is_integral(self) -> bool {
        matches!(self, ValueKind::Int32 | ValueKind::Image)
    }
}

macro_rules! field_types {
    ($($variant:ident => $kind:ident, $multi:expr;)*) => {
        /// A field type tag.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub enum FieldType {
            $($variant,)*
        }

        impl FieldType {
            /// Every supported field type, in declaration order.
            pub const ALL: &'static [FieldType] = &[$(FieldType::$variant,)*];

            /// The type tag as written in specification text.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(FieldType::$variant => stringify!($variant),)*
                }
            }

            /// The scalar kind shared by the SF and MF forms.
            pub fn kind(self) -> ValueKind {
                match self {
                    $(FieldType::$variant => ValueKind::$kind,)*
                }
            }

            /// Whether this is a multi-valued (`MF`) type.
            pub fn is_multi(self) -> bool {
                match self {
                    $(FieldType::$variant => $multi,)*
                }
            }
        }
    };
}

field_types! {
    SFBool => Bool, false;
    MFBool => Bool, true;
    SFColor => Color, false;
    MFColor => Color, true;
    SFColorRGBA => ColorRgba, false;
    MFColorRGBA => ColorRgba, true;
    SFDouble => Double, false;
    MFDouble => Double, true;
    SFFloat => Float, false;
    MFFloat => Float, true;
    SFImage => Image, false;
    MFImage => Image, true;
    SFInt32 => Int32, false;
    MFInt32 => Int32, true;
    SFNode => Node, false;
    MFNode => Node, true;
    SFRotation => Rotation, false;
    MFRotation => Rotation, true;
    SFString => String, false;
    MFString => String, true;
    SFTime => Time, false;
    MFTime => Time, true;
    SFVec2d => Vec2d, false;
    MFVec2d => Vec2d, true;
    SFVec2f => Vec2f, false;
    MFVec2f => Vec2f, true;
    SFVec3d => Vec3d, false;
    MFVec3d => Vec3d, true;
    SFVec3f => Vec3f, false;
    MFVec3f => Vec3f, true;
    SFVec4d => Vec4d, false;
    MFVec4d => Vec4d, true;
    SFVec4f => Vec4f, false;
    MFVec4f => Vec4f, true;
    SFMatrix4d => Matrix4d, false;
    MFMatrix4d => Matrix4d, true;
    SFMatrix4f => Matrix4f, false;
    MFMatrix4f => Matrix4f, true;
}

impl FieldType {
    /// Whether the field holds node references (`SFNode`/`MFNode`).
    pub fn is_node_ref(self) -> bool {
        self.kind() == ValueKind::Node
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = NodeDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NodeDbError::UnknownFieldType(s.to_string()))
    }
}

/// Field access mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// `[]`: set at construction time only.
    InitializeOnly,
    /// `[in]`: inbound events only.
    InputOnly,
    /// `[out]`: outbound events only.
    OutputOnly,
    /// `[in,out]`: bidirectional.
    InputOutput,
    /// Bracket content that matches no known mode, kept verbatim.
    Unknown(String),
}

impl AccessMode {
    /// Map the content between the access brackets to a mode.
    ///
    /// Whitespace is ignored, so `[ in , out ]` reads as `[in,out]`.
    pub fn from_bracket(content: &str) -> Self {
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "" => AccessMode::InitializeOnly,
            "in" => AccessMode::InputOnly,
            "out" => AccessMode::OutputOnly,
            "in,out" | "out,in" => AccessMode::InputOutput,
            _ => AccessMode::Unknown(compact),
        }
    }

    /// Whether fields with this mode carry a default value.
    pub fn takes_default(&self) -> bool {
        matches!(self, AccessMode::InitializeOnly | AccessMode::InputOutput)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::InitializeOnly => write!(f, "[]"),
            AccessMode::InputOnly => write!(f, "[in]"),
            AccessMode::OutputOnly => write!(f, "[out]"),
            AccessMode::InputOutput => write!(f, "[in,out]"),
            AccessMode::Unknown(raw) => write!(f, "[{raw}]"),
        }
    }
}

/// A field declared on a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Type tag.
    pub field_type: FieldType,
    /// Access mode.
    pub access: AccessMode,
    /// Field name, unique within the owning node's own fields.
    pub name: String,
    /// Raw default literal as written in the source.
    pub value: Option<String>,
    /// Permitted referenced node types, for node-reference fields only.
    #[serde(default)]
    pub valid_value_types: Vec<String>,
    /// Free-text comment. Absent whenever annotations are present.
    pub comment: Option<String>,
    /// Annotations parsed from the trailing text.
    #[serde(default)]
    pub annotations: Annotations,
}

impl Field {
    /// Create a field with no default, comment or annotations.
    pub fn new(field_type: FieldType, access: AccessMode, name: impl Into<String>) -> Self {
        Self {
            field_type,
            access,
            name: name.into(),
            value: None,
            valid_value_types: Vec::new(),
            comment: None,
            annotations: Annotations::new(),
        }
    }

    /// Builder: set the raw default literal.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder: set the valid value types.
    pub fn with_valid_value_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_value_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder: set the annotations.
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// The typed default, or `None` when absent or not parseable.
    pub fn parsed_value(&self) -> Option<FieldValue> {
        parse_field_value(self.field_type, self.value.as_deref()?)
    }

    /// Whether type, access mode and name match another field.
    pub fn same_signature(&self, other: &Field) -> bool {
        self.field_type == other.field_type
            && self.access == other.access
            && self.name == other.name
    }
}

/// Renders the field as one line of specification text.
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field_type, self.access, self.name)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        if self.field_type.is_node_ref() && !self.valid_value_types.is_empty() {
            write!(f, " [{}]", self.valid_value_types.join(","))?;
        }
        if !self.annotations.is_empty() {
            write!(f, " # {}", self.annotations)?;
        } else if let Some(comment) = &self.comment {
            write!(f, " # {comment}")?;
        }
        Ok(())
    }
}
