//! `conclave escalate` command: an operator override that forces a task
//! straight to `Blocked` for human review, bypassing the coordinator's
//! own rework/retry cycle.

use anyhow::{bail, Result};
use chrono::Utc;
use conclave_core::config::RuntimeOptions;
use conclave_core::task::{EventType, TaskExecutionEvent, TaskStatus};
use conclave_store::snapshot_store::SnapshotStore;
use conclave_store::EventStore;

use crate::store::connect_client;

pub async fn run_escalate(opts: &RuntimeOptions, task_id: &str, reason: &str) -> Result<()> {
    let client = connect_client(opts).await?;
    let snapshot_store = SnapshotStore::new(client.clone());
    let event_store = EventStore::new(client);

    let mut snapshot = match snapshot_store.get(task_id).await {
        Some(s) => s,
        None => bail!("task {task_id} not found"),
    };
    if snapshot.status.is_terminal() {
        bail!("task {task_id} is already {}, nothing to escalate", snapshot.status);
    }

    snapshot.status = TaskStatus::Blocked;
    snapshot.error = Some(format!("manually escalated: {reason}"));
    snapshot.updated_at = Utc::now();
    snapshot_store.upsert(&snapshot).await;

    let event = TaskExecutionEvent::new(
        snapshot.run_id.clone(),
        task_id.to_string(),
        EventType::TaskFailed,
        format!("{{\"reason\":\"manually escalated\",\"detail\":{reason:?}}}"),
        Utc::now(),
        0,
        0,
    );
    event_store.append(event).await.ok();

    println!("Task {task_id} escalated to Blocked.");
    Ok(())
}
