//! Remote connection interface.

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::FilterSpec;
use crate::types::{Cursor, FilterRef, ManagedObjectRef, UpdateSet, WaitOptions};

/// The handful of property-collector calls the collector needs.
///
/// Establishing and authenticating the connection is the implementor's
/// concern. Each collector exclusively owns one connection for its lifetime.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Top-level container of the remote inventory.
    fn root_folder(&self) -> ManagedObjectRef;

    /// Register a property filter and return its server-side handle.
    async fn create_filter(&self, spec: &FilterSpec, partial_updates: bool) -> Result<FilterRef>;

    /// Remove a previously registered filter.
    async fn destroy_filter(&self, filter: &FilterRef) -> Result<()>;

    /// Long-poll for changes after `version`.
    ///
    /// Returns `None` when the wait bound elapses without any change.
    async fn wait_for_updates(
        &self,
        version: &Cursor,
        options: &WaitOptions,
    ) -> Result<Option<UpdateSet>>;
}
