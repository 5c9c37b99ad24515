//! The persistence drain task: the single reader on the registry's
//! drop-oldest handoff channel, per spec §4.4 "Persistence handoff" /
//! §4.5 "Snapshot store".
//!
//! The consumer's only job is to UPSERT whatever snapshot it was
//! handed, logging and moving on over a stalled backend rather than
//! retrying or buffering further.

use std::sync::Arc;

use conclave_core::task::TaskSnapshot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::snapshot_store::SnapshotStore;

/// Spawn the drain task. Returns its [`JoinHandle`] so callers can await
/// it after closing the sender side, per spec §4.4 "Disposal completes
/// the channel and awaits the drain task."
pub fn spawn_persistence_drain(mut rx: mpsc::Receiver<TaskSnapshot>, store: Arc<SnapshotStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            debug!(task_id = %snapshot.task_id, "persisting snapshot");
            store.upsert(&snapshot).await;
        }
        debug!("persistence drain task terminating, channel closed");
    })
}
