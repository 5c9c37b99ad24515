//! Supervisor actor (spec §4.6): tracks aggregate counters across every
//! task the mesh has handled and answers a bounded snapshot query.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub escalations: u64,
}

pub enum SupervisorMsg {
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskEscalated,
    GetSnapshot { respond_to: oneshot::Sender<SupervisorSnapshot> },
}

#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorMsg>,
}

/// Bound on how long a caller waits for a supervisor snapshot, per spec
/// §4.6 "answers `GetSupervisorSnapshot` with a bounded 2-second
/// timeout".
pub const SNAPSHOT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

impl SupervisorHandle {
    pub fn spawn(ct: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run(rx, ct));
        Self { tx }
    }

    pub async fn notify(&self, msg: SupervisorMsg) {
        let _ = self.tx.send(msg).await;
    }

    /// `None` if the supervisor does not answer within [`SNAPSHOT_TIMEOUT`]
    /// or its mailbox is gone.
    pub async fn snapshot(&self) -> Option<SupervisorSnapshot> {
        let (respond_to, rx) = oneshot::channel();
        if self.tx.send(SupervisorMsg::GetSnapshot { respond_to }).await.is_err() {
            return None;
        }
        tokio::time::timeout(SNAPSHOT_TIMEOUT, rx).await.ok()?.ok()
    }
}

async fn run(mut rx: mpsc::Receiver<SupervisorMsg>, ct: CancellationToken) {
    let mut snapshot = SupervisorSnapshot::default();
    loop {
        let msg = tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = ct.cancelled() => {
                rx.close();
                rx.recv().await
            }
        };
        match msg {
            Some(SupervisorMsg::TaskStarted) => snapshot.started += 1,
            Some(SupervisorMsg::TaskCompleted) => snapshot.completed += 1,
            Some(SupervisorMsg::TaskFailed) => snapshot.failed += 1,
            Some(SupervisorMsg::TaskEscalated) => snapshot.escalations += 1,
            Some(SupervisorMsg::GetSnapshot { respond_to }) => {
                let _ = respond_to.send(snapshot);
            }
            None => {
                debug!("supervisor mailbox closed, terminating");
                return;
            }
        }
    }
}
