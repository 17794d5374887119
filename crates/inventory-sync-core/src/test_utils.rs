//! In-memory collaborators for tests and offline replay.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use inventory_sync_protocol::{
    AttributeMap, Cursor, EntityStore, FilterRef, FilterSpec, FilterUpdate, LocalEntity,
    ManagedObjectRef, ObjectKind, ObjectUpdate, ObjectUpdateKind, PropertyChange,
    RemoteConnection, UpdateSet, VirtualizationFacet, WaitOptions,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::mapping::INSTANCE_UUID_PATH;

/// Filter handle returned by [`ScriptedConnection`] unless overridden.
pub const SCRIPTED_FILTER: &str = "filter-1";

/// One scripted answer to `wait_for_updates`.
#[derive(Debug, Clone)]
pub enum ScriptedPoll {
    Updates(UpdateSet),
    NoUpdates,
    Error(String),
}

type PollHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct ConnectionState {
    script: VecDeque<ScriptedPoll>,
    create_calls: usize,
    destroy_calls: usize,
    destroyed: Vec<FilterRef>,
    polled_versions: Vec<Cursor>,
    last_filter_spec: Option<FilterSpec>,
    last_partial_updates: Option<bool>,
    last_wait_options: Option<WaitOptions>,
}

/// A [`RemoteConnection`] that replays a fixed script and records every call.
///
/// Once the script is exhausted every poll reports no updates.
pub struct ScriptedConnection {
    root: ManagedObjectRef,
    filter: FilterRef,
    create_error: Option<String>,
    destroy_error: Option<String>,
    poll_hook: Option<PollHook>,
    state: Mutex<ConnectionState>,
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self {
            root: ManagedObjectRef::new(ObjectKind::Folder, "group-d1"),
            filter: FilterRef::new(SCRIPTED_FILTER),
            create_error: None,
            destroy_error: None,
            poll_hook: None,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Script from a recording; `None` entries are polls without updates.
    pub fn from_recording(recording: Vec<Option<UpdateSet>>) -> Self {
        let connection = Self::new();
        {
            let mut state = connection.lock();
            state.script = recording
                .into_iter()
                .map(|entry| entry.map_or(ScriptedPoll::NoUpdates, ScriptedPoll::Updates))
                .collect();
        }
        connection
    }

    pub fn with_filter(mut self, filter: FilterRef) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_update_set(self, update_set: UpdateSet) -> Self {
        self.push(ScriptedPoll::Updates(update_set))
    }

    pub fn with_no_updates(self) -> Self {
        self.push(ScriptedPoll::NoUpdates)
    }

    pub fn with_poll_error(self, message: impl Into<String>) -> Self {
        self.push(ScriptedPoll::Error(message.into()))
    }

    pub fn fail_create(mut self, message: impl Into<String>) -> Self {
        self.create_error = Some(message.into());
        self
    }

    pub fn fail_destroy(mut self, message: impl Into<String>) -> Self {
        self.destroy_error = Some(message.into());
        self
    }

    /// Run `hook` with the 1-based poll number before each poll is answered.
    pub fn with_poll_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.poll_hook = Some(Box::new(hook));
        self
    }

    fn push(self, poll: ScriptedPoll) -> Self {
        self.lock().script.push_back(poll);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn destroy_calls(&self) -> usize {
        self.lock().destroy_calls
    }

    pub fn destroyed_filters(&self) -> Vec<FilterRef> {
        self.lock().destroyed.clone()
    }

    pub fn poll_calls(&self) -> usize {
        self.lock().polled_versions.len()
    }

    pub fn polled_versions(&self) -> Vec<Cursor> {
        self.lock().polled_versions.clone()
    }

    pub fn last_filter_spec(&self) -> Option<FilterSpec> {
        self.lock().last_filter_spec.clone()
    }

    pub fn last_partial_updates(&self) -> Option<bool> {
        self.lock().last_partial_updates
    }

    pub fn last_wait_options(&self) -> Option<WaitOptions> {
        self.lock().last_wait_options
    }
}

#[async_trait]
impl RemoteConnection for ScriptedConnection {
    fn root_folder(&self) -> ManagedObjectRef {
        self.root.clone()
    }

    async fn create_filter(&self, spec: &FilterSpec, partial_updates: bool) -> Result<FilterRef> {
        let mut state = self.lock();
        state.create_calls += 1;
        state.last_filter_spec = Some(spec.clone());
        state.last_partial_updates = Some(partial_updates);
        match &self.create_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.filter.clone()),
        }
    }

    async fn destroy_filter(&self, filter: &FilterRef) -> Result<()> {
        let mut state = self.lock();
        state.destroy_calls += 1;
        state.destroyed.push(filter.clone());
        match &self.destroy_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    async fn wait_for_updates(
        &self,
        version: &Cursor,
        options: &WaitOptions,
    ) -> Result<Option<UpdateSet>> {
        let (poll_number, next) = {
            let mut state = self.lock();
            state.polled_versions.push(version.clone());
            state.last_wait_options = Some(*options);
            (state.polled_versions.len(), state.script.pop_front())
        };

        if let Some(hook) = &self.poll_hook {
            hook(poll_number);
        }

        match next {
            Some(ScriptedPoll::Updates(set)) => Ok(Some(set)),
            Some(ScriptedPoll::NoUpdates) | None => Ok(None),
            Some(ScriptedPoll::Error(message)) => Err(anyhow!("{message}")),
        }
    }
}

#[derive(Default)]
struct StoreState {
    entities: Vec<LocalEntity>,
    facets: HashMap<i64, VirtualizationFacet>,
    fail_persist: HashSet<i64>,
    fail_lookups: bool,
    persist_calls: usize,
    facet_builds: usize,
}

/// An [`EntityStore`] backed by in-process maps.
#[derive(Default)]
pub struct MemoryEntityStore {
    state: Mutex<StoreState>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: Vec<LocalEntity>) -> Self {
        let store = Self::new();
        store.lock().entities = entities;
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_entity(&self, compute_resource: &str, id: i64, uuid: &str, name: &str) {
        self.lock().entities.push(LocalEntity {
            id,
            compute_resource: compute_resource.to_string(),
            uuid: uuid.to_string(),
            name: name.to_string(),
        });
    }

    /// Make `persist` fail for the given entity.
    pub fn fail_persist_for(&self, entity_id: i64) {
        self.lock().fail_persist.insert(entity_id);
    }

    /// Make every lookup fail, as an unreachable database would.
    pub fn fail_lookups(&self) {
        self.lock().fail_lookups = true;
    }

    pub fn facet(&self, entity_id: i64) -> Option<VirtualizationFacet> {
        self.lock().facets.get(&entity_id).cloned()
    }

    /// Persisted facets ordered by entity id.
    pub fn facets(&self) -> Vec<VirtualizationFacet> {
        let mut facets: Vec<_> = self.lock().facets.values().cloned().collect();
        facets.sort_by_key(|f| f.entity_id);
        facets
    }

    pub fn persist_calls(&self) -> usize {
        self.lock().persist_calls
    }

    /// Number of facets built because none existed yet.
    pub fn facet_builds(&self) -> usize {
        self.lock().facet_builds
    }
}

impl EntityStore for MemoryEntityStore {
    fn find_by_compute_resource_and_identifier(
        &self,
        compute_resource: &str,
        identifier: &str,
    ) -> Result<Option<LocalEntity>> {
        let state = self.lock();
        if state.fail_lookups {
            return Err(anyhow!("entity store unavailable"));
        }
        Ok(state
            .entities
            .iter()
            .find(|e| e.compute_resource == compute_resource && e.uuid == identifier)
            .cloned())
    }

    fn get_or_create_virtualization_facet(
        &self,
        entity: &LocalEntity,
    ) -> Result<VirtualizationFacet> {
        let mut state = self.lock();
        if let Some(facet) = state.facets.get(&entity.id) {
            return Ok(facet.clone());
        }
        state.facet_builds += 1;
        Ok(VirtualizationFacet::new(entity.id))
    }

    fn persist(&self, facet: &VirtualizationFacet, _attributes: &AttributeMap) -> Result<()> {
        let mut state = self.lock();
        state.persist_calls += 1;
        if state.fail_persist.contains(&facet.entity_id) {
            return Err(anyhow!("failed to persist facet for entity {}", facet.entity_id));
        }
        state.facets.insert(facet.entity_id, facet.clone());
        Ok(())
    }
}

/// An update set addressed to [`SCRIPTED_FILTER`].
pub fn update_set(version: &str, truncated: bool, object_updates: Vec<ObjectUpdate>) -> UpdateSet {
    UpdateSet {
        version: Cursor::new(version),
        truncated,
        filter_updates: vec![FilterUpdate {
            filter: FilterRef::new(SCRIPTED_FILTER),
            object_updates,
        }],
    }
}

/// A VM entering the filter, carrying its instance identifier.
pub fn vm_enter(moref: &str, uuid: &str, mut changes: Vec<PropertyChange>) -> ObjectUpdate {
    changes.insert(0, PropertyChange::assign(INSTANCE_UUID_PATH, uuid));
    ObjectUpdate {
        kind: ObjectUpdateKind::Enter,
        object: ManagedObjectRef::new(ObjectKind::VirtualMachine, moref),
        change_set: changes,
    }
}

/// A partial VM modification without the instance identifier.
pub fn vm_modify(moref: &str, changes: Vec<PropertyChange>) -> ObjectUpdate {
    ObjectUpdate {
        kind: ObjectUpdateKind::Modify,
        object: ManagedObjectRef::new(ObjectKind::VirtualMachine, moref),
        change_set: changes,
    }
}
