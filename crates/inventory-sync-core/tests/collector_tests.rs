use inventory_sync_core::test_utils::{
    update_set, vm_enter, vm_modify, MemoryEntityStore, ScriptedConnection,
};
use inventory_sync_core::{Collector, CollectorConfig, CollectorState, StopHandle, SyncError};
use inventory_sync_protocol::{
    Cursor, ManagedObjectRef, ObjectKind, ObjectUpdate, ObjectUpdateKind, PropertyChange,
    ToolsState,
};
use std::sync::{Arc, OnceLock};

const RESOURCE: &str = "vcenter-1";

fn collector(connection: &Arc<ScriptedConnection>, store: &Arc<MemoryEntityStore>) -> Collector {
    Collector::new(
        RESOURCE,
        connection.clone(),
        store.clone(),
        CollectorConfig::default(),
    )
}

fn sized_vm(moref: &str, uuid: &str) -> ObjectUpdate {
    vm_enter(
        moref,
        uuid,
        vec![
            PropertyChange::assign("name", "web01"),
            PropertyChange::assign("config.hardware.numCPU", 4),
            PropertyChange::assign("config.hardware.memoryMB", 8192),
        ],
    )
}

#[tokio::test]
async fn known_vm_gets_cpu_and_memory_on_facet() {
    let connection = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("1", false, vec![sized_vm("vm-42", "uuid-42")])),
    );
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity(RESOURCE, 42, "uuid-42", "web01.example.com");

    let report = collector(&connection, &store).run().await.unwrap();

    assert_eq!(report.state, CollectorState::Completed);
    assert_eq!(report.stats.applied, 1);
    let facet = store.facet(42).expect("facet");
    assert_eq!(facet.cpus, Some(4));
    assert_eq!(facet.memory_mb, Some(8192));
}

#[tokio::test]
async fn unknown_vm_leaves_store_untouched() {
    let connection = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("1", false, vec![sized_vm("vm-42", "uuid-42")])),
    );
    let store = Arc::new(MemoryEntityStore::new());

    let report = collector(&connection, &store).run().await.unwrap();

    assert_eq!(report.state, CollectorState::Completed);
    assert_eq!(report.stats.resolution_misses, 1);
    assert_eq!(store.persist_calls(), 0);
    assert_eq!(store.facet_builds(), 0);
    assert!(store.facets().is_empty());
}

#[tokio::test]
async fn entities_on_other_compute_resources_are_not_matched() {
    let connection = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("1", false, vec![sized_vm("vm-42", "uuid-42")])),
    );
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity("vcenter-2", 42, "uuid-42", "web01.example.com");

    let report = collector(&connection, &store).run().await.unwrap();

    assert_eq!(report.stats.resolution_misses, 1);
    assert!(store.facet(42).is_none());
}

#[tokio::test]
async fn partial_modify_in_truncated_batch_updates_existing_facet() {
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_update_set(update_set("1", true, vec![sized_vm("vm-42", "uuid-42")]))
            .with_update_set(update_set(
                "2",
                false,
                vec![vm_modify(
                    "vm-42",
                    vec![
                        PropertyChange::assign("config.hardware.numCPU", 8),
                        PropertyChange::assign("guest.toolsStatus", "toolsOld"),
                    ],
                )],
            )),
    );
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity(RESOURCE, 42, "uuid-42", "web01.example.com");

    let report = collector(&connection, &store).run().await.unwrap();

    assert_eq!(report.polls, 2);
    assert_eq!(report.version, Cursor::new("2"));
    let facet = store.facet(42).expect("facet");
    assert_eq!(facet.cpus, Some(8));
    assert_eq!(facet.memory_mb, Some(8192));
    assert_eq!(facet.tools_state, Some(ToolsState::Old));
    assert_eq!(store.facet_builds(), 1);
}

#[tokio::test]
async fn create_failure_issues_no_destroy() {
    let connection = Arc::new(ScriptedConnection::new().fail_create("InvalidLogin"));
    let store = Arc::new(MemoryEntityStore::new());
    let collector = collector(&connection, &store);

    let err = collector.run().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteProtocol { .. }));
    assert_eq!(collector.state(), CollectorState::Failed);
    assert_eq!(connection.create_calls(), 1);
    assert_eq!(connection.destroy_calls(), 0);
    assert_eq!(connection.poll_calls(), 0);
}

#[tokio::test]
async fn store_failure_fails_run_and_destroys_filter() {
    let connection = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("1", false, vec![sized_vm("vm-42", "uuid-42")])),
    );
    let store = Arc::new(MemoryEntityStore::new());
    store.fail_lookups();
    let collector = collector(&connection, &store);

    let err = collector.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(collector.state(), CollectorState::Failed);
    assert_eq!(connection.create_calls(), 1);
    assert_eq!(connection.destroy_calls(), 1);
    assert_eq!(
        connection.destroyed_filters(),
        vec![inventory_sync_protocol::FilterRef::new(
            inventory_sync_core::test_utils::SCRIPTED_FILTER
        )]
    );
}

#[tokio::test]
async fn poll_error_mid_batch_keeps_earlier_writes() {
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_update_set(update_set("1", true, vec![sized_vm("vm-42", "uuid-42")]))
            .with_poll_error("connection reset by peer"),
    );
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity(RESOURCE, 42, "uuid-42", "web01.example.com");

    let err = collector(&connection, &store).run().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteProtocol { .. }));
    assert_eq!(store.facet(42).unwrap().cpus, Some(4));
    assert_eq!(connection.destroy_calls(), 1);
}

#[tokio::test]
async fn stop_during_run_exits_at_next_iteration() {
    let stop: Arc<OnceLock<StopHandle>> = Arc::new(OnceLock::new());
    let hook_stop = stop.clone();
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_update_set(update_set("1", true, vec![]))
            .with_update_set(update_set("2", true, vec![]))
            .with_update_set(update_set("3", false, vec![]))
            .with_poll_hook(move |poll| {
                if poll == 1 {
                    if let Some(handle) = hook_stop.get() {
                        handle.stop();
                    }
                }
            }),
    );
    let store = Arc::new(MemoryEntityStore::new());
    let collector = collector(&connection, &store);
    stop.set(collector.stop_handle()).unwrap();

    let report = collector.run().await.unwrap();

    // The in-flight poll completes and is processed; the next one is never issued.
    assert_eq!(report.state, CollectorState::Stopped);
    assert_eq!(report.polls, 1);
    assert_eq!(report.update_sets, 1);
    assert_eq!(report.version, Cursor::new("1"));
    assert_eq!(connection.destroy_calls(), 1);
}

#[tokio::test]
async fn folders_and_datacenters_are_traversed_but_not_applied() {
    let folder = ObjectUpdate {
        kind: ObjectUpdateKind::Enter,
        object: ManagedObjectRef::new(ObjectKind::Folder, "group-v3"),
        change_set: vec![PropertyChange::assign("name", "vm")],
    };
    let datacenter = ObjectUpdate {
        kind: ObjectUpdateKind::Enter,
        object: ManagedObjectRef::new(ObjectKind::Datacenter, "datacenter-2"),
        change_set: vec![],
    };
    let connection = Arc::new(ScriptedConnection::new().with_update_set(update_set(
        "1",
        false,
        vec![folder, datacenter, sized_vm("vm-42", "uuid-42")],
    )));
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity(RESOURCE, 42, "uuid-42", "web01.example.com");

    let report = collector(&connection, &store).run().await.unwrap();

    assert_eq!(report.stats.object_updates, 3);
    assert_eq!(report.stats.ignored, 2);
    assert_eq!(report.stats.applied, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collectors_for_different_resources_run_concurrently() {
    let store = Arc::new(MemoryEntityStore::new());
    store.add_entity("vcenter-a", 1, "uuid-a", "a.example.com");
    store.add_entity("vcenter-b", 2, "uuid-b", "b.example.com");

    let conn_a = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("1", false, vec![sized_vm("vm-1", "uuid-a")])),
    );
    let conn_b = Arc::new(
        ScriptedConnection::new().with_update_set(update_set("9", false, vec![sized_vm("vm-1", "uuid-b")])),
    );

    let collector_a = Collector::new("vcenter-a", conn_a.clone(), store.clone(), CollectorConfig::default());
    let collector_b = Collector::new("vcenter-b", conn_b.clone(), store.clone(), CollectorConfig::default());

    let results = futures::future::join_all(vec![collector_a.run(), collector_b.run()]).await;

    for result in results {
        assert_eq!(result.unwrap().state, CollectorState::Completed);
    }
    assert_eq!(store.facets().len(), 2);
    assert_eq!(conn_a.destroy_calls(), 1);
    assert_eq!(conn_b.destroy_calls(), 1);
}
