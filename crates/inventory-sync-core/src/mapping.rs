//! Remote property path ↔ local attribute table.

use inventory_sync_protocol::{AttributeMap, ObjectKind, PathMapping, PropertyChange, PropertySpec};

/// Auxiliary path carrying the stable instance identifier of a virtual machine.
pub const INSTANCE_UUID_PATH: &str = "config.instanceUuid";

struct KindMapping {
    kind: ObjectKind,
    mapped: &'static [(&'static str, &'static str)],
    auxiliary: &'static [&'static str],
}

const VIRTUAL_MACHINE_MAPPED: &[(&str, &str)] = &[
    ("cpus", "config.hardware.numCPU"),
    ("corespersocket", "config.hardware.numCoresPerSocket"),
    ("memory_mb", "config.hardware.memoryMB"),
    ("tools_state", "guest.toolsStatus"),
    ("guest_id", "config.guestId"),
    ("cpu_hot_add", "config.cpuHotAddEnabled"),
    ("hardware_version", "config.version"),
];

const FOLDER_MAPPED: &[(&str, &str)] = &[("name", "name")];

fn table() -> [KindMapping; 2] {
    [
        KindMapping {
            kind: ObjectKind::VirtualMachine,
            mapped: VIRTUAL_MACHINE_MAPPED,
            auxiliary: &["name", INSTANCE_UUID_PATH],
        },
        KindMapping {
            kind: ObjectKind::Folder,
            mapped: FOLDER_MAPPED,
            auxiliary: &["childEntity"],
        },
    ]
}

fn mapped_paths(kind: &ObjectKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ObjectKind::VirtualMachine => VIRTUAL_MACHINE_MAPPED,
        ObjectKind::Folder => FOLDER_MAPPED,
        ObjectKind::Datacenter | ObjectKind::Other(_) => &[],
    }
}

/// Property specs for the filter, one per object kind, in a fixed order.
pub fn declared_property_specs() -> Vec<PropertySpec> {
    table()
        .into_iter()
        .map(|entry| PropertySpec {
            object_kind: entry.kind,
            mapped: entry
                .mapped
                .iter()
                .map(|(attribute, path)| PathMapping {
                    attribute: attribute.to_string(),
                    path: path.to_string(),
                })
                .collect(),
            auxiliary: entry.auxiliary.iter().map(|p| p.to_string()).collect(),
        })
        .collect()
}

/// Local attribute name for `path` on `kind`, if the path is mapped.
pub fn attribute_for(kind: &ObjectKind, path: &str) -> Option<&'static str> {
    mapped_paths(kind)
        .iter()
        .find(|(_, mapped)| *mapped == path)
        .map(|(attribute, _)| *attribute)
}

/// Translate a sparse change set into attribute → raw value.
///
/// Unmapped and auxiliary paths are dropped. Values are passed through
/// unconverted; a change without a value maps to `null`. When a path occurs
/// more than once, the last change wins.
pub fn map_changes(kind: &ObjectKind, change_set: &[PropertyChange]) -> AttributeMap {
    change_set
        .iter()
        .filter_map(|change| {
            attribute_for(kind, &change.path).map(|attribute| {
                (
                    attribute.to_string(),
                    change.value.clone().unwrap_or(serde_json::Value::Null),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn declared_specs_cover_vm_and_folder() {
        let specs = declared_property_specs();
        assert_eq!(specs.len(), 2);

        let vm = &specs[0];
        assert_eq!(vm.object_kind, ObjectKind::VirtualMachine);
        let paths = vm.path_set();
        assert!(paths.contains(&"config.hardware.numCPU"));
        assert!(paths.contains(&"config.hardware.memoryMB"));
        assert!(paths.contains(&INSTANCE_UUID_PATH));
        assert!(paths.contains(&"name"));

        let folder = &specs[1];
        assert_eq!(folder.object_kind, ObjectKind::Folder);
        assert_eq!(folder.path_set(), vec!["name", "childEntity"]);
    }

    #[test]
    fn reverse_lookup_agrees_with_declared_specs() {
        for spec in declared_property_specs() {
            for mapping in &spec.mapped {
                assert_eq!(
                    attribute_for(&spec.object_kind, &mapping.path),
                    Some(mapping.attribute.as_str())
                );
            }
            for path in &spec.auxiliary {
                if spec.attribute_for(path).is_none() {
                    assert_eq!(attribute_for(&spec.object_kind, path), None);
                }
            }
        }
    }

    #[test]
    fn map_changes_keeps_only_mapped_paths() {
        let changes = vec![
            PropertyChange::assign("config.hardware.numCPU", 4),
            PropertyChange::assign("config.hardware.memoryMB", 8192),
            PropertyChange::assign(INSTANCE_UUID_PATH, "5012-abcd"),
            PropertyChange::assign("name", "web01"),
            PropertyChange::assign("runtime.powerState", "poweredOn"),
        ];

        let mapped = map_changes(&ObjectKind::VirtualMachine, &changes);

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped["cpus"], json!(4));
        assert_eq!(mapped["memory_mb"], json!(8192));
        assert!(!mapped.contains_key("name"));
        assert!(!mapped.contains_key(INSTANCE_UUID_PATH));
    }

    #[test]
    fn map_changes_is_pure() {
        let changes = vec![
            PropertyChange::assign("guest.toolsStatus", "toolsOk"),
            PropertyChange::remove("config.guestId"),
        ];
        let first = map_changes(&ObjectKind::VirtualMachine, &changes);
        let second = map_changes(&ObjectKind::VirtualMachine, &changes);

        assert_eq!(first, second);
        assert_eq!(first["tools_state"], json!("toolsOk"));
        assert_eq!(first["guest_id"], Value::Null);
    }

    #[test]
    fn map_changes_is_kind_specific() {
        let changes = vec![
            PropertyChange::assign("name", "Discovered virtual machine"),
            PropertyChange::assign("config.hardware.numCPU", 2),
        ];

        let folder = map_changes(&ObjectKind::Folder, &changes);
        assert_eq!(folder.len(), 1);
        assert_eq!(folder["name"], json!("Discovered virtual machine"));

        assert!(map_changes(&ObjectKind::Datacenter, &changes).is_empty());
        assert!(map_changes(&ObjectKind::Other("HostSystem".into()), &changes).is_empty());
    }

    #[test]
    fn later_change_for_same_path_wins() {
        let changes = vec![
            PropertyChange::assign("config.hardware.numCPU", 2),
            PropertyChange::assign("config.hardware.numCPU", 8),
        ];
        assert_eq!(map_changes(&ObjectKind::VirtualMachine, &changes)["cpus"], json!(8));
    }
}
