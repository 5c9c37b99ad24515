//! Append-only event store, per spec §4.5 "Event store (append-only)".

use async_trait::async_trait;
use conclave_core::task::TaskExecutionEvent;
use serde_json::json;
use tracing::debug;

use crate::client::{DocumentStoreClient, parse_long};
use crate::sequence::{SequenceAllocator, SequenceSeed};

/// Seeds a sequence counter from the backend by selecting the max
/// already-persisted value for the given selector field, per spec §4.5
/// "seed the counter from `SELECT max(<seqField>) WHERE
/// <selectorField>=key`".
struct BackendSeed {
    client: DocumentStoreClient,
    selector_field: &'static str,
    seq_field: &'static str,
}

#[async_trait]
impl SequenceSeed for BackendSeed {
    async fn seed(&self, key: &str) -> u64 {
        let command = format!(
            "SELECT max({}) AS maxSeq FROM TaskExecutionEvent WHERE {} = :key",
            self.seq_field, self.selector_field
        );
        let params = json!({ "key": key });
        match self.client.command(&command, Some(params)).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get("maxSeq"))
                .and_then(parse_long)
                .map(|v| v.max(0) as u64)
                .unwrap_or(0),
            Err(err) => {
                debug!(key, error = %err, "sequence seed query failed, starting from 0");
                0
            }
        }
    }
}

pub struct EventStore {
    client: DocumentStoreClient,
    task_sequences: SequenceAllocator<BackendSeed>,
    run_sequences: SequenceAllocator<BackendSeed>,
}

impl EventStore {
    pub fn new(client: DocumentStoreClient) -> Self {
        let task_sequences = SequenceAllocator::new(BackendSeed {
            client: client.clone(),
            selector_field: "taskId",
            seq_field: "taskSequence",
        });
        let run_sequences = SequenceAllocator::new(BackendSeed {
            client: client.clone(),
            selector_field: "runId",
            seq_field: "runSequence",
        });
        Self {
            client,
            task_sequences,
            run_sequences,
        }
    }

    /// Allocate the next `(taskSequence, runSequence)` pair for
    /// `task_id`/`run_id` and append the event. The caller supplies
    /// everything but the sequence numbers; this is the only place
    /// those are assigned.
    pub async fn append(
        &self,
        mut event: TaskExecutionEvent,
    ) -> Result<TaskExecutionEvent, crate::client::DocumentStoreError> {
        event.task_sequence = self.task_sequences.next(&event.task_id).await;
        event.run_sequence = self.run_sequences.next(&event.run_id).await;

        let params = json!({
            "eventId": event.event_id,
            "runId": event.run_id,
            "taskId": event.task_id,
            "eventType": event.event_type.to_string(),
            "payload": event.payload,
            "occurredAt": event.occurred_at.to_rfc3339(),
            "taskSequence": event.task_sequence,
            "runSequence": event.run_sequence,
            "traceId": event.trace_id,
            "spanId": event.span_id,
        });
        let command = "INSERT INTO TaskExecutionEvent CONTENT :params";
        self.client.command(command, Some(params)).await?;
        Ok(event)
    }

    /// Up to `limit` events for `task_id`, ordered by `taskSequence`;
    /// empty on transport failure, per the read-API contract §4.5 gives
    /// the snapshot store.
    pub async fn list_by_task_id(&self, task_id: &str, limit: usize) -> Vec<TaskExecutionEvent> {
        let command = format!("SELECT FROM TaskExecutionEvent WHERE taskId = :taskId ORDER BY taskSequence LIMIT {limit}");
        let params = json!({ "taskId": task_id });
        match self.client.command(&command, Some(params)).await {
            Ok(rows) => rows.iter().filter_map(row_to_event).collect(),
            Err(err) => {
                debug!(task_id, error = %err, "event list failed, returning empty");
                Vec::new()
            }
        }
    }
}

fn row_to_event(row: &serde_json::Value) -> Option<TaskExecutionEvent> {
    let event_id = row.get("eventId")?.as_str()?.to_string();
    let run_id = row.get("runId")?.as_str().unwrap_or_default().to_string();
    let task_id = row.get("taskId")?.as_str().unwrap_or_default().to_string();
    let event_type = row.get("eventType").and_then(|v| v.as_str()).and_then(parse_event_type)?;
    let payload = row.get("payload").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let occurred_at = row
        .get("occurredAt")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let task_sequence = row.get("taskSequence").and_then(parse_long).unwrap_or(0).max(0) as u64;
    let run_sequence = row.get("runSequence").and_then(parse_long).unwrap_or(0).max(0) as u64;

    Some(TaskExecutionEvent {
        event_id,
        run_id,
        task_id,
        event_type,
        payload,
        occurred_at,
        task_sequence,
        run_sequence,
        trace_id: row.get("traceId").and_then(|v| v.as_str()).map(String::from),
        span_id: row.get("spanId").and_then(|v| v.as_str()).map(String::from),
    })
}

fn parse_event_type(s: &str) -> Option<conclave_core::task::EventType> {
    use conclave_core::task::EventType::*;
    Some(match s {
        "task.submitted" => TaskSubmitted,
        "coordination.started" => CoordinationStarted,
        "role.started" => RoleStarted,
        "role.completed" => RoleCompleted,
        "role.failed" => RoleFailed,
        "task.done" => TaskDone,
        "task.failed" => TaskFailed,
        "diagnostic.context" => DiagnosticContext,
        _ => return None,
    })
}

// Network-backed behavior (sequence seeding, append against a real
// wire response) is covered in tests/store_test.rs against the fake
// document-store server in conclave-test-utils.
