//! Local entity store interface.
//!
//! This module defines the trait that must be implemented by any storage backend
//! that wants to receive facet updates from the collector.

use anyhow::Result;

use crate::facet::{AttributeMap, LocalEntity, VirtualizationFacet};

/// Trait for persistence operations required by the update processor.
///
/// The store owns entity lifecycles; the collector only looks entities up and
/// writes their virtualization facet. No locking is implied: concurrent
/// collectors writing the same entity resolve as last-write-wins.
pub trait EntityStore: Send + Sync {
    /// Find the entity backing `identifier` on `compute_resource`.
    fn find_by_compute_resource_and_identifier(
        &self,
        compute_resource: &str,
        identifier: &str,
    ) -> Result<Option<LocalEntity>>;

    /// Load the entity's virtualization facet, or build an empty one.
    ///
    /// Building must not persist anything on its own.
    fn get_or_create_virtualization_facet(&self, entity: &LocalEntity)
        -> Result<VirtualizationFacet>;

    /// Persist `facet` after `attributes` have been merged into it.
    fn persist(&self, facet: &VirtualizationFacet, attributes: &AttributeMap) -> Result<()>;
}
