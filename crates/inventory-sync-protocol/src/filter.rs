//! Declarative filter description handed to `createFilter`.
//!
//! The structures here are flat on purpose: traversal rules reference each
//! other by name, so a rule that selects itself describes unbounded nesting
//! with finite data.

use serde::{Deserialize, Serialize};

use crate::types::{ManagedObjectRef, ObjectKind};

/// A named traversal rule: from objects of `root_kind`, follow `edge` and
/// apply the rules named in `selects` to whatever is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSpec {
    pub name: String,
    pub root_kind: ObjectKind,
    pub edge: String,
    /// Whether the objects reached through `edge` are excluded from the result.
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub selects: Vec<String>,
}

impl TraversalSpec {
    pub fn new(name: impl Into<String>, root_kind: ObjectKind, edge: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_kind,
            edge: edge.into(),
            skip: false,
            selects: Vec::new(),
        }
    }

    /// Append a rule reference to this rule's select set.
    pub fn select(mut self, name: impl Into<String>) -> Self {
        self.selects.push(name.into());
        self
    }
}

/// Anchor of a selection: a root object plus the rules applied from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub root: ManagedObjectRef,
    #[serde(default)]
    pub skip: bool,
    pub select_set: Vec<TraversalSpec>,
}

/// One local attribute and the remote dotted path it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub attribute: String,
    pub path: String,
}

/// Which property paths to fetch for one object kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub object_kind: ObjectKind,
    pub mapped: Vec<PathMapping>,
    /// Paths fetched only for routing, never mapped onto local attributes.
    #[serde(default)]
    pub auxiliary: Vec<String>,
}

impl PropertySpec {
    /// Every path the server must report: mapped paths first, then auxiliary ones.
    pub fn path_set(&self) -> Vec<&str> {
        self.mapped
            .iter()
            .map(|m| m.path.as_str())
            .chain(self.auxiliary.iter().map(String::as_str))
            .collect()
    }

    /// Reverse lookup from a remote path to its local attribute name.
    pub fn attribute_for(&self, path: &str) -> Option<&str> {
        self.mapped
            .iter()
            .find(|m| m.path == path)
            .map(|m| m.attribute.as_str())
    }
}

/// Complete filter registration: what to select and what to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub object_set: Vec<ObjectSpec>,
    pub prop_set: Vec<PropertySpec>,
}
