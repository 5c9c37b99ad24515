//! `conclave events` command: list the persisted, sequence-ordered
//! event log for one task, per spec §3 event taxonomy.

use anyhow::Result;
use conclave_core::config::RuntimeOptions;
use conclave_store::EventStore;

use crate::store::connect_client;

pub async fn run_events(opts: &RuntimeOptions, task_id: &str, limit: usize) -> Result<()> {
    let client = connect_client(opts).await?;
    let store = EventStore::new(client);

    let events = store.list_by_task_id(task_id, limit).await;
    if events.is_empty() {
        println!("No events for task {task_id}");
        return Ok(());
    }
    for event in &events {
        println!(
            "[{:>4}] {} {}  {}",
            event.task_sequence,
            event.occurred_at.to_rfc3339(),
            event.event_type,
            event.payload
        );
    }
    Ok(())
}
