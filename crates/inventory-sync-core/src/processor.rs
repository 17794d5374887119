//! Applies update sets to the local entity store.

use inventory_sync_protocol::{
    EntityStore, FilterRef, ObjectKind, ObjectUpdate, ObjectUpdateKind, UpdateSet,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::identity::IdentityCache;
use crate::mapping::{map_changes, INSTANCE_UUID_PATH};

/// What happened to a single object update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    /// Mapped attributes were merged into the entity's facet and persisted.
    Applied { entity_id: i64 },
    /// No local entity exists for the identifier. Entities are provisioned elsewhere.
    ResolutionMiss { identifier: String },
    /// Neither the change set nor the identity cache knows the instance identifier.
    MissingIdentity,
    /// The attributes could not be converted onto the facet.
    Rejected { reason: String },
    /// Object kind or update kind that this engine does not act on.
    Ignored,
}

/// Counters for one or more processed update sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub object_updates: usize,
    pub applied: usize,
    pub resolution_misses: usize,
    pub missing_identity: usize,
    pub rejected: usize,
    pub ignored: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: &ObjectOutcome) {
        self.object_updates += 1;
        match outcome {
            ObjectOutcome::Applied { .. } => self.applied += 1,
            ObjectOutcome::ResolutionMiss { .. } => self.resolution_misses += 1,
            ObjectOutcome::MissingIdentity => self.missing_identity += 1,
            ObjectOutcome::Rejected { .. } => self.rejected += 1,
            ObjectOutcome::Ignored => self.ignored += 1,
        }
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.object_updates += other.object_updates;
        self.applied += other.applied;
        self.resolution_misses += other.resolution_misses;
        self.missing_identity += other.missing_identity;
        self.rejected += other.rejected;
        self.ignored += other.ignored;
    }
}

/// Dispatches object updates by kind and writes VM attributes through the store.
///
/// Per object: conversion failures are logged and the object is skipped;
/// store failures abort the batch. Objects applied before a failure stay applied.
pub struct UpdateSetProcessor {
    compute_resource: String,
    store: Arc<dyn EntityStore>,
}

impl UpdateSetProcessor {
    pub fn new(compute_resource: impl Into<String>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            compute_resource: compute_resource.into(),
            store,
        }
    }

    /// Process the part of `update_set` addressed to `filter`.
    pub fn process(
        &self,
        update_set: &UpdateSet,
        filter: &FilterRef,
        identities: &mut IdentityCache,
    ) -> Result<BatchStats> {
        let mut stats = BatchStats::default();

        let Some(filter_update) = update_set.for_filter(filter) else {
            return Ok(stats);
        };
        if filter_update.object_updates.is_empty() {
            return Ok(stats);
        }

        let count = filter_update.object_updates.len();
        debug!(count, "Processing object updates");

        for object_update in &filter_update.object_updates {
            let outcome = self.process_object_update(object_update, identities)?;
            stats.record(&outcome);
        }

        debug!(count, applied = stats.applied, "Processing object updates completed");
        Ok(stats)
    }

    fn process_object_update(
        &self,
        update: &ObjectUpdate,
        identities: &mut IdentityCache,
    ) -> Result<ObjectOutcome> {
        debug!(kind = ?update.kind, object = %update.object, "Object update");

        match &update.object.kind {
            ObjectKind::VirtualMachine => self.process_virtual_machine_update(update, identities),
            // Folders and datacenters are only traversed for now.
            ObjectKind::Folder | ObjectKind::Datacenter | ObjectKind::Other(_) => {
                Ok(ObjectOutcome::Ignored)
            }
        }
    }

    fn process_virtual_machine_update(
        &self,
        update: &ObjectUpdate,
        identities: &mut IdentityCache,
    ) -> Result<ObjectOutcome> {
        if update.kind == ObjectUpdateKind::Leave {
            identities.forget(&update.object);
            return Ok(ObjectOutcome::Ignored);
        }

        let identifier = match update.value_of(INSTANCE_UUID_PATH) {
            Some(serde_json::Value::String(uuid)) => {
                identities.record(&update.object, uuid);
                uuid.clone()
            }
            Some(other) => {
                warn!(object = %update.object, value = %other, "Instance identifier is not a string");
                return Ok(ObjectOutcome::Rejected {
                    reason: format!("invalid {INSTANCE_UUID_PATH}: {other}"),
                });
            }
            None => match identities.get(&update.object) {
                Some(uuid) => uuid.to_string(),
                None => {
                    debug!(object = %update.object, "No instance identifier known, skipping");
                    return Ok(ObjectOutcome::MissingIdentity);
                }
            },
        };

        let entity = self
            .store
            .find_by_compute_resource_and_identifier(&self.compute_resource, &identifier)
            .map_err(SyncError::Store)?;
        let Some(entity) = entity else {
            debug!(uuid = %identifier, "No local entity for instance, skipping");
            return Ok(ObjectOutcome::ResolutionMiss { identifier });
        };

        let mut facet = self
            .store
            .get_or_create_virtualization_facet(&entity)
            .map_err(SyncError::Store)?;
        let attributes = map_changes(&ObjectKind::VirtualMachine, &update.change_set);

        if let Err(e) = facet.apply(&attributes) {
            warn!(object = %update.object, entity_id = entity.id, error = %e, "Rejected facet update");
            return Ok(ObjectOutcome::Rejected {
                reason: e.to_string(),
            });
        }

        self.store
            .persist(&facet, &attributes)
            .map_err(SyncError::Store)?;

        Ok(ObjectOutcome::Applied {
            entity_id: entity.id,
        })
    }
}
