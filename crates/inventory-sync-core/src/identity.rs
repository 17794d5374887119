//! Object reference → instance identifier cache.

use inventory_sync_protocol::ManagedObjectRef;
use std::collections::HashMap;

/// Instance identifiers learned during a run.
///
/// Partial updates only carry changed properties, so a `modify` for a VM
/// usually lacks `config.instanceUuid`; the identifier seen on `enter` is
/// remembered here.
#[derive(Debug, Default)]
pub struct IdentityCache {
    by_object: HashMap<ManagedObjectRef, String>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, object: &ManagedObjectRef, identifier: &str) {
        self.by_object
            .insert(object.clone(), identifier.to_string());
    }

    pub fn get(&self, object: &ManagedObjectRef) -> Option<&str> {
        self.by_object.get(object).map(String::as_str)
    }

    pub fn forget(&mut self, object: &ManagedObjectRef) -> Option<String> {
        self.by_object.remove(object)
    }

    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_sync_protocol::ObjectKind;

    #[test]
    fn record_overwrites_and_forget_removes() {
        let vm = ManagedObjectRef::new(ObjectKind::VirtualMachine, "vm-1");
        let mut cache = IdentityCache::new();

        cache.record(&vm, "uuid-a");
        cache.record(&vm, "uuid-b");
        assert_eq!(cache.get(&vm), Some("uuid-b"));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.forget(&vm).as_deref(), Some("uuid-b"));
        assert!(cache.is_empty());
    }
}
