//! Integration tests exercising the persistence pipeline over real HTTP
//! against the fake document store in `conclave-test-utils`.

use chrono::Utc;
use conclave_core::task::{EventType, TaskExecutionEvent, TaskSnapshot, TaskStatus};
use conclave_store::client::DocumentStoreClient;
use conclave_store::event_store::EventStore;
use conclave_store::schema::ensure_schema;
use conclave_store::snapshot_store::SnapshotStore;
use conclave_test_utils::FakeDocumentStore;

async fn client(server: &FakeDocumentStore) -> DocumentStoreClient {
    DocumentStoreClient::new(server.base_url.clone(), "conclave", "root", "pw")
}

#[tokio::test]
async fn schema_bootstrap_is_idempotent_against_the_fake_backend() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;

    ensure_schema(&client).await;
    ensure_schema(&client).await;
}

#[tokio::test]
async fn snapshot_store_round_trips_through_upsert_and_get() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;
    let store = SnapshotStore::new(client);

    let mut snapshot = TaskSnapshot::new("t1", "title", "desc", "run-1", Utc::now());
    store.upsert(&snapshot).await;

    let fetched = store.get("t1").await.expect("snapshot present");
    assert_eq!(fetched.task_id, "t1");
    assert_eq!(fetched.run_id, "run-1");
    assert_eq!(fetched.status, TaskStatus::Queued);

    snapshot.status = TaskStatus::Done;
    snapshot.summary = Some("done".to_string());
    store.upsert(&snapshot).await;

    let fetched = store.get("t1").await.expect("snapshot present after update");
    assert_eq!(fetched.status, TaskStatus::Done);
    assert_eq!(fetched.summary.as_deref(), Some("done"));
}

#[tokio::test]
async fn snapshot_store_list_by_run_id_filters_correctly() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;
    let store = SnapshotStore::new(client);

    store.upsert(&TaskSnapshot::new("a", "t", "d", "run-x", Utc::now())).await;
    store.upsert(&TaskSnapshot::new("b", "t", "d", "run-x", Utc::now())).await;
    store.upsert(&TaskSnapshot::new("c", "t", "d", "run-y", Utc::now())).await;

    let run_x = store.list_by_run_id("run-x", 10).await;
    assert_eq!(run_x.len(), 2);
    assert!(run_x.iter().all(|s| s.run_id == "run-x"));
}

#[tokio::test]
async fn snapshot_store_get_returns_none_for_missing_task() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;
    let store = SnapshotStore::new(client);

    assert!(store.get("nonexistent").await.is_none());
}

#[tokio::test]
async fn event_store_allocates_monotonic_sequences_seeded_from_backend() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;
    let store = EventStore::new(client);

    let first = TaskExecutionEvent::new(
        "run-1",
        "t1",
        EventType::TaskSubmitted,
        "{}",
        Utc::now(),
        0,
        0,
    );
    let first = store.append(first).await.expect("append succeeds");
    assert_eq!(first.task_sequence, 1);
    assert_eq!(first.run_sequence, 1);

    let second = TaskExecutionEvent::new(
        "run-1",
        "t1",
        EventType::TaskDone,
        "{}",
        Utc::now(),
        0,
        0,
    );
    let second = store.append(second).await.expect("append succeeds");
    assert_eq!(second.task_sequence, 2);
    assert_eq!(second.run_sequence, 2);
}

#[tokio::test]
async fn event_store_seeds_a_fresh_allocator_from_already_persisted_events() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;

    {
        let store = EventStore::new(client.clone());
        let event = TaskExecutionEvent::new("run-2", "t2", EventType::TaskSubmitted, "{}", Utc::now(), 0, 0);
        store.append(event).await.expect("append succeeds");
    }

    // A fresh allocator (simulating a process restart) must seed from
    // the max already-persisted sequence rather than starting at 1.
    let store = EventStore::new(client);
    let event = TaskExecutionEvent::new("run-2", "t2", EventType::RoleCompleted, "{}", Utc::now(), 0, 0);
    let appended = store.append(event).await.expect("append succeeds");
    assert_eq!(appended.task_sequence, 2);
    assert_eq!(appended.run_sequence, 2);
}

#[tokio::test]
async fn event_store_lists_events_for_a_task_in_sequence_order() {
    let server = FakeDocumentStore::start().await;
    let client = client(&server).await;
    let store = EventStore::new(client);

    store.append(TaskExecutionEvent::new("r1", "t1", EventType::TaskSubmitted, "{}", Utc::now(), 0, 0)).await.unwrap();
    store.append(TaskExecutionEvent::new("r1", "t1", EventType::CoordinationStarted, "{}", Utc::now(), 0, 0)).await.unwrap();
    store.append(TaskExecutionEvent::new("r1", "other", EventType::TaskSubmitted, "{}", Utc::now(), 0, 0)).await.unwrap();

    let events = store.list_by_task_id("t1", 10).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::TaskSubmitted);
    assert_eq!(events[1].event_type, EventType::CoordinationStarted);
    assert_eq!(events[0].task_sequence, 1);
    assert_eq!(events[1].task_sequence, 2);
}
