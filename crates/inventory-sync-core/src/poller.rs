//! Long-poll cursor over `WaitForUpdatesEx`.

use inventory_sync_protocol::{Cursor, RemoteConnection, UpdateSet, WaitOptions};
use std::sync::Arc;
use tracing::debug;

use crate::error::{RemoteOperation, Result, SyncError};
use crate::subscription::Subscription;

/// Holds the version token between polls.
///
/// Callers keep polling while the returned set is truncated; each poll sends
/// the version returned by the previous one, truncated or not.
pub struct UpdatePoller {
    connection: Arc<dyn RemoteConnection>,
    options: WaitOptions,
    version: Cursor,
    polls: u64,
}

impl UpdatePoller {
    pub fn new(connection: Arc<dyn RemoteConnection>, options: WaitOptions) -> Self {
        Self {
            connection,
            options,
            version: Cursor::default(),
            polls: 0,
        }
    }

    /// Version sent with the next poll.
    pub fn version(&self) -> &Cursor {
        &self.version
    }

    /// Number of polls issued so far, including failed ones.
    pub fn polls_issued(&self) -> u64 {
        self.polls
    }

    /// Issue one long-poll bounded by the configured wait.
    ///
    /// `Ok(None)` means the wait elapsed with nothing new; that is the normal
    /// end of a pass. On receipt the cursor advances to the set's version.
    pub async fn poll(&mut self, subscription: &Subscription) -> Result<Option<UpdateSet>> {
        self.polls += 1;
        debug!(
            filter = %subscription.filter,
            version = %self.version,
            max_wait_seconds = self.options.max_wait_seconds,
            "Waiting for updates"
        );

        let update_set = self
            .connection
            .wait_for_updates(&self.version, &self.options)
            .await
            .map_err(|e| SyncError::remote(RemoteOperation::WaitForUpdates, e))?;

        match update_set {
            Some(set) => {
                debug!(
                    version = %set.version,
                    truncated = set.truncated,
                    filter_updates = set.filter_updates.len(),
                    "Received update set"
                );
                self.version = set.version.clone();
                Ok(Some(set))
            }
            None => {
                debug!(version = %self.version, "No updates available");
                Ok(None)
            }
        }
    }
}
