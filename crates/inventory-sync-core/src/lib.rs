//! Incremental inventory synchronization engine.
//!
//! A [`Collector`] registers a property filter on a remote virtualization
//! host, long-polls for versioned update sets and projects virtual machine
//! property changes onto local entity facets.
//!
//! # Components
//!
//! - [`traversal`]: name-referenced selection graph reaching every VM under the root folder
//! - [`mapping`]: remote property path ↔ local attribute table
//! - [`subscription`]: create-once / destroy-once filter lifecycle
//! - [`poller`]: opaque version cursor over `WaitForUpdatesEx`
//! - [`processor`]: dispatch of object updates onto the entity store
//! - [`collector`]: the run loop with cooperative stop
//!
//! # Usage
//!
//! ```ignore
//! use inventory_sync_core::{Collector, CollectorConfig};
//!
//! let collector = Collector::new("vcenter-1", connection, store, CollectorConfig::default());
//! let stop = collector.stop_handle();
//! let report = collector.run().await?;
//! ```

pub mod collector;
pub mod error;
pub mod identity;
pub mod mapping;
pub mod poller;
pub mod processor;
pub mod subscription;
pub mod test_utils;
pub mod traversal;

pub use collector::{Collector, CollectorState, RunReport, StopHandle};
pub use error::{RemoteOperation, Result, SyncError};
pub use identity::IdentityCache;
pub use mapping::{attribute_for, declared_property_specs, map_changes, INSTANCE_UUID_PATH};
pub use poller::UpdatePoller;
pub use processor::{BatchStats, ObjectOutcome, UpdateSetProcessor};
pub use subscription::{Subscription, SubscriptionManager};
pub use traversal::{inventory_graph, SelectionGraph, DATACENTER_TO_VM_FOLDER, FOLDER_TRAVERSAL};

pub use inventory_sync_config::CollectorConfig;
