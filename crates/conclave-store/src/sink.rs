//! [`EventSink`] wiring the coordinator's domain events into the
//! append-only event store, per spec §4.5 "Event store (append-only)".
//!
//! Grounded on `conclave_core::coordinator::EventSink`'s seam (the
//! coordinator only ever sees the trait) and on `SnapshotStore`'s own
//! best-effort-never-propagate discipline: a stalled backend must never
//! stall a coordinator mid-transition.

use chrono::Utc;
use conclave_core::coordinator::EventSink;
use conclave_core::task::{EventType, TaskExecutionEvent};
use tracing::debug;

use crate::event_store::EventStore;

pub struct StoreEventSink {
    store: EventStore,
}

impl StoreEventSink {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl EventSink for StoreEventSink {
    async fn emit(&self, task_id: &str, run_id: &str, event_type: EventType, payload: String) {
        let event = TaskExecutionEvent::new(run_id, task_id, event_type, payload, Utc::now(), 0, 0);
        if let Err(err) = self.store.append(event).await {
            debug!(task_id, run_id, error = %err, "event append failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DocumentStoreClient;
    use conclave_test_utils::FakeDocumentStore;

    #[tokio::test]
    async fn emit_is_best_effort_and_never_panics_on_a_closed_backend() {
        let sink = StoreEventSink::new(EventStore::new(DocumentStoreClient::new(
            "http://127.0.0.1:1",
            "conclave",
            "root",
            "root",
        )));
        sink.emit("t1", "r1", EventType::TaskSubmitted, "{}".to_string()).await;
    }

    #[tokio::test]
    async fn emit_appends_a_real_event_against_the_fake_backend() {
        let fake = FakeDocumentStore::start().await;
        let client = DocumentStoreClient::new(fake.base_url.clone(), "conclave", "root", "root");
        let sink = StoreEventSink::new(EventStore::new(client));
        sink.emit("t1", "r1", EventType::RoleStarted, "{\"role\":\"Builder\"}".to_string()).await;
    }
}
