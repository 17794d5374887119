//! Update-set data model returned by the remote property collector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote object kinds the engine understands.
///
/// Anything else arrives as [`ObjectKind::Other`] and is carried through
/// untouched so callers can decide to ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectKind {
    VirtualMachine,
    Folder,
    Datacenter,
    Other(String),
}

impl ObjectKind {
    /// Remote type name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::VirtualMachine => "VirtualMachine",
            ObjectKind::Folder => "Folder",
            ObjectKind::Datacenter => "Datacenter",
            ObjectKind::Other(name) => name,
        }
    }
}

impl From<&str> for ObjectKind {
    fn from(s: &str) -> Self {
        match s {
            "VirtualMachine" => ObjectKind::VirtualMachine,
            "Folder" => ObjectKind::Folder,
            "Datacenter" => ObjectKind::Datacenter,
            other => ObjectKind::Other(other.to_string()),
        }
    }
}

impl From<String> for ObjectKind {
    fn from(s: String) -> Self {
        ObjectKind::from(s.as_str())
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a remote managed object: its type plus server-side identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    pub kind: ObjectKind,
    pub value: String,
}

impl ManagedObjectRef {
    pub fn new(kind: impl Into<ObjectKind>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Server-issued handle of a registered property filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterRef(pub String);

impl FilterRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for FilterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque version token. The empty cursor means "everything since the beginning".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<initial>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Options for a single long-poll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    pub max_wait_seconds: u32,
    /// Server-side cap on object updates per set; exceeding it truncates the set.
    pub max_object_updates: Option<u32>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_wait_seconds: 10,
            max_object_updates: None,
        }
    }
}

/// How an object relates to the filter's result set in this update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectUpdateKind {
    /// Object entered the filter's result set.
    Enter,
    /// Object left the filter's result set.
    Leave,
    /// Properties of an already selected object changed.
    Modify,
}

/// Operation applied to a single property.
///
/// Only the path and value are consumed by the mapper today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyChangeOp {
    Assign,
    Add,
    Remove,
    IndirectRemove,
}

/// A single property delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub path: String,
    pub op: PropertyChangeOp,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl PropertyChange {
    pub fn assign(path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            path: path.into(),
            op: PropertyChangeOp::Assign,
            value: Some(value.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: PropertyChangeOp::Remove,
            value: None,
        }
    }
}

/// Change record for one remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub kind: ObjectUpdateKind,
    pub object: ManagedObjectRef,
    #[serde(default)]
    pub change_set: Vec<PropertyChange>,
}

impl ObjectUpdate {
    /// Raw value of `path` in this update's change set, if present.
    pub fn value_of(&self, path: &str) -> Option<&serde_json::Value> {
        self.change_set
            .iter()
            .find(|change| change.path == path)
            .and_then(|change| change.value.as_ref())
    }
}

/// All object updates addressed to one filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterUpdate {
    pub filter: FilterRef,
    #[serde(default)]
    pub object_updates: Vec<ObjectUpdate>,
}

/// Versioned batch of changes returned by one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSet {
    pub version: Cursor,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub filter_updates: Vec<FilterUpdate>,
}

impl UpdateSet {
    /// The filter update addressed to `filter`, if the batch carries one.
    pub fn for_filter(&self, filter: &FilterRef) -> Option<&FilterUpdate> {
        self.filter_updates.iter().find(|update| &update.filter == filter)
    }
}
