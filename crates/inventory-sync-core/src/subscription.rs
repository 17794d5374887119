//! Lifecycle of the server-side property filter.

use chrono::{DateTime, Utc};
use inventory_sync_protocol::{FilterRef, FilterSpec, ManagedObjectRef, PropertySpec, RemoteConnection};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RemoteOperation, Result, SyncError};
use crate::traversal::SelectionGraph;

/// A registered filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub filter: FilterRef,
    pub created_at: DateTime<Utc>,
}

/// Owns at most one filter on one connection.
///
/// `create` is idempotent while the filter is alive and `destroy` issues at
/// most one remote call per created filter. If the manager is dropped with a
/// live filter (e.g. the run future was cancelled) the destroy call is handed
/// to the current tokio runtime.
pub struct SubscriptionManager {
    connection: Arc<dyn RemoteConnection>,
    partial_updates: bool,
    current: Option<Subscription>,
}

impl SubscriptionManager {
    pub fn new(connection: Arc<dyn RemoteConnection>, partial_updates: bool) -> Self {
        Self {
            connection,
            partial_updates,
            current: None,
        }
    }

    /// The live subscription, if one was created and not yet destroyed.
    pub fn current(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }

    /// Register the filter, or return the cached one.
    pub async fn create(
        &mut self,
        root: ManagedObjectRef,
        graph: &SelectionGraph,
        property_specs: Vec<PropertySpec>,
    ) -> Result<Subscription> {
        if let Some(existing) = &self.current {
            debug!(filter = %existing.filter, "Reusing existing property filter");
            return Ok(existing.clone());
        }

        graph.validate()?;
        let spec = FilterSpec {
            object_set: vec![graph.object_spec(root)],
            prop_set: property_specs,
        };

        let filter = self
            .connection
            .create_filter(&spec, self.partial_updates)
            .await
            .map_err(|e| SyncError::remote(RemoteOperation::CreateFilter, e))?;

        info!(filter = %filter, "Created property filter");
        let subscription = Subscription {
            filter,
            created_at: Utc::now(),
        };
        self.current = Some(subscription.clone());
        Ok(subscription)
    }

    /// Destroy the filter if one is alive.
    ///
    /// The handle is released before the remote call, so a failed destroy is
    /// never retried. Failures are logged and returned as
    /// [`SyncError::Teardown`] for the caller to record.
    pub async fn destroy(&mut self) -> Result<()> {
        let Some(subscription) = self.current.take() else {
            return Ok(());
        };

        match self.connection.destroy_filter(&subscription.filter).await {
            Ok(()) => {
                info!(filter = %subscription.filter, "Destroyed property filter");
                Ok(())
            }
            Err(source) => {
                warn!(
                    filter = %subscription.filter,
                    error = %source,
                    "Failed to destroy property filter"
                );
                Err(SyncError::Teardown {
                    filter: subscription.filter,
                    source,
                })
            }
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        let Some(subscription) = self.current.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    filter = %subscription.filter,
                    "Subscription dropped while live, scheduling destroy"
                );
                let connection = Arc::clone(&self.connection);
                handle.spawn(async move {
                    if let Err(e) = connection.destroy_filter(&subscription.filter).await {
                        warn!(filter = %subscription.filter, error = %e, "Deferred destroy failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    filter = %subscription.filter,
                    "Subscription dropped outside a runtime, filter left on server"
                );
            }
        }
    }
}
