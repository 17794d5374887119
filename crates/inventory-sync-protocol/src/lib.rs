//! Data model and collaborator interfaces for incremental inventory sync.
//!
//! This crate is pure data plus two traits:
//!
//! - [`RemoteConnection`]: the property-collector calls used to register a
//!   filter and long-poll for update sets.
//! - [`EntityStore`]: lookup and update of local entities and their
//!   virtualization facet.
//!
//! The engine itself lives in `inventory-sync-core`.

pub mod connection;
pub mod facet;
pub mod filter;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use connection::RemoteConnection;
pub use facet::{AttributeMap, FacetError, LocalEntity, ToolsState, VirtualizationFacet};
pub use filter::{FilterSpec, ObjectSpec, PathMapping, PropertySpec, TraversalSpec};
pub use store::EntityStore;
pub use types::{
    Cursor, FilterRef, FilterUpdate, ManagedObjectRef, ObjectKind, ObjectUpdate, ObjectUpdateKind,
    PropertyChange, PropertyChangeOp, UpdateSet, WaitOptions,
};
