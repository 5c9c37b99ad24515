//! `conclave status` command: show one task's persisted snapshot, or a
//! summary list of the most recent tasks.

use anyhow::Result;
use conclave_core::config::RuntimeOptions;
use conclave_store::snapshot_store::SnapshotStore;

use crate::store::connect_client;

pub async fn run_status(opts: &RuntimeOptions, task_id: Option<&str>, limit: usize) -> Result<()> {
    let client = connect_client(opts).await?;
    let store = SnapshotStore::new(client);

    match task_id {
        Some(id) => match store.get(id).await {
            Some(snapshot) => {
                println!("Task: {} ({})", snapshot.task_id, snapshot.title);
                println!("Run: {}", snapshot.run_id);
                println!("Status: {}", snapshot.status);
                if let Some(summary) = &snapshot.summary {
                    println!("Summary: {summary}");
                }
                if let Some(error) = &snapshot.error {
                    println!("Error: {error}");
                }
                if !snapshot.child_task_ids.is_empty() {
                    println!("Children: {}", snapshot.child_task_ids.join(", "));
                }
            }
            None => println!("Task {id} not found"),
        },
        None => {
            let tasks = store.list(limit, None).await;
            if tasks.is_empty() {
                println!("No tasks found.");
                return Ok(());
            }
            println!("{:<40} {:<12} {:<30}", "TASK ID", "STATUS", "TITLE");
            for task in &tasks {
                println!("{:<40} {:<12} {:<30}", task.task_id, task.status, task.title);
            }
        }
    }
    Ok(())
}
