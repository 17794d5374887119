pub mod cli;

pub use inventory_sync_config::{self as config, CollectorConfig};
pub use inventory_sync_core::{
    collector, identity, mapping, poller, processor, subscription, test_utils, traversal,
};
pub use inventory_sync_core::{Collector, CollectorState, RunReport, StopHandle, SyncError};
pub use inventory_sync_protocol as protocol;
