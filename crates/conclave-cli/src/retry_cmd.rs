//! `conclave retry` command: resubmit a `Blocked` task's title and
//! description as a fresh run through the mesh.
//!
//! There is no long-running daemon holding the original run's in-memory
//! state (spec §1 scopes that out), so "retry" here means what an
//! operator means by it at the shell: take the persisted description of
//! a blocked task and run it again from scratch, rather than resuming
//! the exhausted coordinator FSM in place.

use std::time::Duration;

use anyhow::{bail, Result};
use conclave_core::config::RuntimeOptions;
use conclave_core::task::TaskStatus;
use conclave_store::snapshot_store::SnapshotStore;

use crate::engine::Engine;
use crate::store::connect_client;

pub async fn run_retry(opts: &RuntimeOptions, task_id: &str, wait_seconds: u64) -> Result<()> {
    let client = connect_client(opts).await?;
    let store = SnapshotStore::new(client);

    let snapshot = match store.get(task_id).await {
        Some(s) => s,
        None => bail!("task {task_id} not found"),
    };
    if snapshot.status != TaskStatus::Blocked {
        bail!("task {task_id} is {}, only Blocked tasks can be retried", snapshot.status);
    }

    let engine = Engine::start(opts).await?;
    let new_task_id = engine.submit(snapshot.title.clone(), snapshot.description.clone()).await?;
    println!("Retrying {task_id} as new task: {new_task_id}");

    let outcome = engine.await_terminal(&new_task_id, Duration::from_secs(wait_seconds)).await;
    engine.shutdown().await;

    match outcome {
        Some(result) => {
            println!("Status: {}", result.status);
            Ok(())
        }
        None => bail!("task {new_task_id} did not reach a terminal status within {wait_seconds}s"),
    }
}
