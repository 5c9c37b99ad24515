//! `conclave submit` command: spin up the mesh, submit one task, and
//! wait for it to reach a terminal status.

use std::time::Duration;

use anyhow::{bail, Result};
use conclave_core::config::RuntimeOptions;
use conclave_core::task::TaskStatus;

use crate::engine::Engine;

pub async fn run_submit(opts: &RuntimeOptions, title: String, description: String, wait_seconds: u64) -> Result<()> {
    let engine = Engine::start(opts).await?;

    let task_id = engine.submit(title, description).await?;
    println!("Submitted task: {task_id}");

    let outcome = engine.await_terminal(&task_id, Duration::from_secs(wait_seconds)).await;
    engine.shutdown().await;

    match outcome {
        Some(snapshot) => {
            println!("Status: {}", snapshot.status);
            match snapshot.status {
                TaskStatus::Done => {
                    if let Some(summary) = &snapshot.summary {
                        println!("Summary: {summary}");
                    }
                }
                TaskStatus::Blocked => {
                    if let Some(error) = &snapshot.error {
                        println!("Error: {error}");
                    }
                    bail!("task {task_id} ended Blocked");
                }
                _ => unreachable!("await_terminal only returns terminal snapshots"),
            }
            Ok(())
        }
        None => bail!("task {task_id} did not reach a terminal status within {wait_seconds}s"),
    }
}
