//! Collector orchestration: one synchronization pass per `run()`.

use chrono::{DateTime, Utc};
use inventory_sync_config::CollectorConfig;
use inventory_sync_protocol::{Cursor, EntityStore, RemoteConnection};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::identity::IdentityCache;
use crate::mapping::declared_property_specs;
use crate::poller::UpdatePoller;
use crate::processor::{BatchStats, UpdateSetProcessor};
use crate::subscription::SubscriptionManager;
use crate::traversal::inventory_graph;

/// Lifecycle of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    Running,
    /// The server reported no further updates.
    Completed,
    /// A stop request was observed between polls.
    Stopped,
    /// Filter creation, polling or the entity store failed.
    Failed,
}

impl CollectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollectorState::Completed | CollectorState::Stopped | CollectorState::Failed
        )
    }
}

/// Summary of one synchronization pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub compute_resource: String,
    pub state: CollectorState,
    /// Cursor after the last received update set.
    pub version: Cursor,
    pub polls: u64,
    pub update_sets: u64,
    pub stats: BatchStats,
    /// Destroying the filter failed; the run result itself is unaffected.
    pub teardown_failed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn new(run_id: Uuid, compute_resource: &str) -> Self {
        Self {
            run_id,
            compute_resource: compute_resource.to_string(),
            state: CollectorState::Running,
            version: Cursor::default(),
            polls: 0,
            update_sets: 0,
            stats: BatchStats::default(),
            teardown_failed: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Cloneable handle for requesting a cooperative stop from another task.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        info!("Stop requested");
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Synchronizes one compute resource's VM inventory into the entity store.
///
/// Each `run()` creates a property filter, polls until the server has nothing
/// more to report, and destroys the filter on every exit path.
pub struct Collector {
    compute_resource: String,
    connection: Arc<dyn RemoteConnection>,
    store: Arc<dyn EntityStore>,
    config: CollectorConfig,
    state: Mutex<CollectorState>,
    stop_requested: Arc<AtomicBool>,
}

impl Collector {
    pub fn new(
        compute_resource: impl Into<String>,
        connection: Arc<dyn RemoteConnection>,
        store: Arc<dyn EntityStore>,
        config: CollectorConfig,
    ) -> Self {
        let compute_resource = compute_resource.into();
        debug!(compute_resource = %compute_resource, "Initializing collector");
        Self {
            compute_resource,
            connection,
            store,
            config,
            state: Mutex::new(CollectorState::Idle),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build a collector with configuration from [`CollectorConfig::load`].
    pub fn from_environment(
        compute_resource: impl Into<String>,
        connection: Arc<dyn RemoteConnection>,
        store: Arc<dyn EntityStore>,
    ) -> Result<Self> {
        let config = CollectorConfig::load()?;
        Ok(Self::new(compute_resource, connection, store, config))
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn compute_resource(&self) -> &str {
        &self.compute_resource
    }

    pub fn state(&self) -> CollectorState {
        *lock(&self.state)
    }

    /// Request a halt before the next poll. An in-flight poll is not interrupted.
    ///
    /// A request made while idle applies to the next run; requests are
    /// cleared when a run ends.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop_requested))
    }

    /// Perform one full synchronization pass.
    pub async fn run(&self) -> Result<RunReport> {
        let mut guard = RunGuard::begin(self)?;
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "collector_run",
            %run_id,
            compute_resource = %self.compute_resource
        );

        async move {
            info!("Collector started");
            let mut report = RunReport::new(run_id, &self.compute_resource);
            let mut subscriptions = SubscriptionManager::new(
                Arc::clone(&self.connection),
                self.config.partial_updates,
            );

            let outcome = self.collect(&mut subscriptions, &mut report).await;

            if subscriptions.destroy().await.is_err() {
                report.teardown_failed = true;
            }

            let state = match &outcome {
                Ok(state) => *state,
                Err(_) => CollectorState::Failed,
            };
            guard.finish(state);
            report.state = state;
            report.finished_at = Some(Utc::now());

            match outcome {
                Ok(_) => {
                    info!(
                        state = ?state,
                        version = %report.version,
                        polls = report.polls,
                        object_updates = report.stats.object_updates,
                        applied = report.stats.applied,
                        "Collector finished"
                    );
                    Ok(report)
                }
                Err(e) => {
                    error!(error = %e, polls = report.polls, "Collector failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn collect(
        &self,
        subscriptions: &mut SubscriptionManager,
        report: &mut RunReport,
    ) -> Result<CollectorState> {
        let subscription = subscriptions
            .create(
                self.connection.root_folder(),
                &inventory_graph(),
                declared_property_specs(),
            )
            .await?;

        let mut poller = UpdatePoller::new(Arc::clone(&self.connection), self.config.wait_options());
        let processor = UpdateSetProcessor::new(self.compute_resource.clone(), Arc::clone(&self.store));
        let mut identities = IdentityCache::new();

        info!("Starting initial import");
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!(version = %poller.version(), "Stop observed, leaving poll loop");
                return Ok(CollectorState::Stopped);
            }

            let polled = poller.poll(&subscription).await;
            report.polls = poller.polls_issued();
            let Some(update_set) = polled? else {
                break;
            };

            report.version = poller.version().clone();
            report.update_sets += 1;
            let stats = processor.process(&update_set, &subscription.filter, &mut identities)?;
            report.stats.merge(&stats);

            if !update_set.truncated {
                break;
            }
        }
        info!("Finished initial import");

        Ok(CollectorState::Completed)
    }
}

/// Marks the collector as running for the lifetime of one `run()`.
///
/// If the run future is dropped before finishing, the collector is left in
/// `Stopped` rather than stuck in `Running`.
struct RunGuard<'a> {
    collector: &'a Collector,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn begin(collector: &'a Collector) -> Result<Self> {
        let mut state = lock(&collector.state);
        if *state == CollectorState::Running {
            return Err(SyncError::AlreadyRunning);
        }
        *state = CollectorState::Running;
        Ok(Self {
            collector,
            finished: false,
        })
    }

    fn finish(&mut self, state: CollectorState) {
        *lock(&self.collector.state) = state;
        self.collector.stop_requested.store(false, Ordering::SeqCst);
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(CollectorState::Stopped);
        }
    }
}

fn lock(state: &Mutex<CollectorState>) -> MutexGuard<'_, CollectorState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
