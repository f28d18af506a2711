//! Field annotations: `@name` or `@name(p1, p2)` markers in trailing text.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The annotation set of a field.
///
/// At most one annotation per name; inserting an existing name replaces the
/// earlier one. Iteration is in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations {
    entries: BTreeMap<String, Option<Vec<String>>>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an annotation, replacing any earlier one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, params: Option<Vec<String>>) {
        self.entries.insert(name.into(), params);
    }

    /// Whether an annotation with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Parameters of an annotation. `Some(None)` means present without a
    /// parameter list.
    pub fn get(&self, name: &str) -> Option<Option<&[String]>> {
        self.entries.get(name).map(|p| p.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[String]>)> {
        self.entries
            .iter()
            .map(|(name, params)| (name.as_str(), params.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, params) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "@{name}")?;
            if let Some(params) = params {
                write!(f, "({})", params.join(", "))?;
            }
        }
        Ok(())
    }
}
