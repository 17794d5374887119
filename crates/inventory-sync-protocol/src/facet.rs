//! Local entity records and the typed virtualization facet.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Semantic attribute name → raw remote value, as produced by the property mapper.
pub type AttributeMap = BTreeMap<String, Value>;

/// A locally known host, addressable by compute resource and instance identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEntity {
    pub id: i64,
    pub compute_resource: String,
    pub uuid: String,
    pub name: String,
}

/// State of the guest tools as reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolsState {
    #[serde(rename = "toolsNotInstalled")]
    NotInstalled,
    #[serde(rename = "toolsNotRunning")]
    NotRunning,
    #[serde(rename = "toolsOld")]
    Old,
    #[serde(rename = "toolsOk")]
    Ok,
}

impl ToolsState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolsState::NotInstalled => "toolsNotInstalled",
            ToolsState::NotRunning => "toolsNotRunning",
            ToolsState::Old => "toolsOld",
            ToolsState::Ok => "toolsOk",
        }
    }
}

impl fmt::Display for ToolsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolsState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toolsNotInstalled" => Ok(ToolsState::NotInstalled),
            "toolsNotRunning" => Ok(ToolsState::NotRunning),
            "toolsOld" => Ok(ToolsState::Old),
            "toolsOk" => Ok(ToolsState::Ok),
            _ => Err(format!("Unknown tools state: {s}")),
        }
    }
}

/// Errors converting raw attribute values onto typed facet fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacetError {
    #[error("Unknown facet attribute: {0}")]
    UnknownAttribute(String),

    #[error("Invalid value for {attribute}: expected {expected}, got {value}")]
    InvalidValue {
        attribute: String,
        expected: &'static str,
        value: String,
    },
}

/// Virtualization-specific attributes of a local entity.
///
/// Every field is optional: it stays unset until the hypervisor reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualizationFacet {
    pub entity_id: i64,
    pub cpus: Option<u32>,
    pub corespersocket: Option<u32>,
    pub memory_mb: Option<u64>,
    pub tools_state: Option<ToolsState>,
    pub guest_id: Option<String>,
    pub cpu_hot_add: Option<bool>,
    pub hardware_version: Option<String>,
}

impl VirtualizationFacet {
    pub fn new(entity_id: i64) -> Self {
        Self {
            entity_id,
            ..Self::default()
        }
    }

    /// Merge mapped attributes onto the typed fields.
    ///
    /// A JSON `null` clears the field. The facet is left untouched if any
    /// attribute fails to convert.
    pub fn apply(&mut self, attributes: &AttributeMap) -> Result<(), FacetError> {
        let mut next = self.clone();
        for (attribute, value) in attributes {
            match attribute.as_str() {
                "cpus" => next.cpus = to_u32(attribute, value)?,
                "corespersocket" => next.corespersocket = to_u32(attribute, value)?,
                "memory_mb" => next.memory_mb = to_u64(attribute, value)?,
                "tools_state" => {
                    next.tools_state = to_text(attribute, value)?
                        .map(|s| s.parse::<ToolsState>())
                        .transpose()
                        .map_err(|_| invalid(attribute, "tools state", value))?
                }
                "guest_id" => next.guest_id = to_text(attribute, value)?,
                "cpu_hot_add" => next.cpu_hot_add = to_bool(attribute, value)?,
                "hardware_version" => next.hardware_version = to_text(attribute, value)?,
                other => return Err(FacetError::UnknownAttribute(other.to_string())),
            }
        }
        *self = next;
        Ok(())
    }
}

fn invalid(attribute: &str, expected: &'static str, value: &Value) -> FacetError {
    FacetError::InvalidValue {
        attribute: attribute.to_string(),
        expected,
        value: value.to_string(),
    }
}

fn to_u64(attribute: &str, value: &Value) -> Result<Option<u64>, FacetError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(attribute, "unsigned integer", value)),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| invalid(attribute, "unsigned integer", value)),
        _ => Err(invalid(attribute, "unsigned integer", value)),
    }
}

fn to_u32(attribute: &str, value: &Value) -> Result<Option<u32>, FacetError> {
    to_u64(attribute, value)?
        .map(|n| u32::try_from(n).map_err(|_| invalid(attribute, "32-bit integer", value)))
        .transpose()
}

fn to_bool(attribute: &str, value: &Value) -> Result<Option<bool>, FacetError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(invalid(attribute, "boolean", value)),
    }
}

fn to_text(attribute: &str, value: &Value) -> Result<Option<String>, FacetError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(invalid(attribute, "string", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn apply_converts_raw_values() {
        let mut facet = VirtualizationFacet::new(7);
        facet
            .apply(&attrs(&[
                ("cpus", json!(4)),
                ("memory_mb", json!(8192)),
                ("tools_state", json!("toolsOk")),
                ("cpu_hot_add", json!(true)),
                ("hardware_version", json!("vmx-13")),
            ]))
            .unwrap();

        assert_eq!(facet.entity_id, 7);
        assert_eq!(facet.cpus, Some(4));
        assert_eq!(facet.memory_mb, Some(8192));
        assert_eq!(facet.tools_state, Some(ToolsState::Ok));
        assert_eq!(facet.cpu_hot_add, Some(true));
        assert_eq!(facet.hardware_version.as_deref(), Some("vmx-13"));
        assert_eq!(facet.guest_id, None);
    }

    #[test]
    fn null_clears_field() {
        let mut facet = VirtualizationFacet::new(1);
        facet.guest_id = Some("rhel7_64Guest".to_string());
        facet.apply(&attrs(&[("guest_id", Value::Null)])).unwrap();
        assert_eq!(facet.guest_id, None);
    }

    #[test]
    fn invalid_value_leaves_facet_untouched() {
        let mut facet = VirtualizationFacet::new(1);
        let err = facet
            .apply(&attrs(&[("cpus", json!(2)), ("memory_mb", json!("lots"))]))
            .unwrap_err();

        assert!(matches!(err, FacetError::InvalidValue { ref attribute, .. } if attribute == "memory_mb"));
        assert_eq!(facet, VirtualizationFacet::new(1));
    }

    #[test]
    fn unknown_tools_state_is_rejected() {
        let mut facet = VirtualizationFacet::new(1);
        let err = facet
            .apply(&attrs(&[("tools_state", json!("toolsBroken"))]))
            .unwrap_err();
        assert!(matches!(err, FacetError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let mut facet = VirtualizationFacet::new(1);
        assert_eq!(
            facet.apply(&attrs(&[("name", json!("web01"))])),
            Err(FacetError::UnknownAttribute("name".to_string()))
        );
    }
}
