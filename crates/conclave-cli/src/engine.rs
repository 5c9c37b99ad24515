//! Bootstraps the in-process actor mesh a `submit` invocation needs:
//! registry, store-backed event sink, pools, supervisor, monitor,
//! blackboard, and dispatcher, torn down cleanly on exit.
//!
//! There is no separate long-running daemon process in this design
//! (spec §1 scopes out an HTTP event-polling surface): every invocation
//! of `conclave submit` spawns the mesh, assigns one task, awaits its
//! terminal status, and tears the mesh back down -- it is itself the
//! daemon for the lifetime of that one task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use conclave_actors::dispatcher::TaskAssigned;
use conclave_actors::{ActorPool, BlackboardHandle, DispatcherHandle, SupervisorHandle};
use conclave_core::config::RuntimeOptions;
use conclave_core::coordinator::EventSink;
use conclave_core::executor::RoleExecutor;
use conclave_core::registry::TaskRegistry;
use conclave_core::task::TaskSnapshot;
use conclave_store::client::DocumentStoreClient;
use conclave_store::snapshot_store::SnapshotStore;
use conclave_store::{EventStore, StoreEventSink};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::adapters::build_adapters;
use crate::store::connect_client;

pub struct Engine {
    pub registry: Arc<TaskRegistry>,
    pub dispatcher: DispatcherHandle,
    pub supervisor: SupervisorHandle,
    pub blackboard: BlackboardHandle,
    ct: CancellationToken,
    drain: tokio::task::JoinHandle<()>,
    monitor: tokio::task::JoinHandle<()>,
}

impl Engine {
    pub async fn start(opts: &RuntimeOptions) -> Result<Self> {
        let client = connect_client(opts).await?;

        let (registry, persistence_rx) = TaskRegistry::new();
        let registry = Arc::new(registry);
        let snapshot_store = Arc::new(SnapshotStore::new(client.clone()));
        let sink: Arc<dyn EventSink> = Arc::new(StoreEventSink::new(EventStore::new(client)));

        let ct = CancellationToken::new();
        let drain = conclave_store::spawn_persistence_drain(persistence_rx, snapshot_store);

        let executor = Arc::new(RoleExecutor::new(
            build_adapters(opts),
            opts.max_cli_concurrency,
            opts.role_execution_timeout_seconds,
        ));
        let worker_pool = Arc::new(ActorPool::spawn("worker", opts.worker_pool_size, executor.clone(), ct.clone()));
        let reviewer_pool = Arc::new(ActorPool::spawn("reviewer", opts.reviewer_pool_size, executor, ct.clone()));
        let supervisor = SupervisorHandle::spawn(ct.clone());
        let blackboard = BlackboardHandle::spawn();

        let heartbeat_seconds = opts.heartbeat_seconds;
        let monitor_supervisor = supervisor.clone();
        let monitor_sink = sink.clone();
        let monitor_ct = ct.clone();
        let monitor = tokio::spawn(async move {
            conclave_actors::monitor::run_monitor(monitor_supervisor, monitor_sink.as_ref(), heartbeat_seconds, monitor_ct).await;
        });

        let dispatcher = DispatcherHandle::spawn(
            registry.clone(),
            worker_pool,
            reviewer_pool,
            sink,
            supervisor.clone(),
            opts.max_retries,
            ct.clone(),
        );

        Ok(Self { registry, dispatcher, supervisor, blackboard, ct, drain, monitor })
    }

    pub async fn submit(&self, title: String, description: String) -> Result<String> {
        let task_id = format!("task-{}", Uuid::new_v4());
        let run_id = format!("run-{}", Uuid::new_v4());
        self.dispatcher
            .assign(TaskAssigned { task_id: task_id.clone(), title, description, run_id })
            .await?;
        Ok(task_id)
    }

    /// Poll the in-memory registry until `task_id` reaches a terminal
    /// status or `timeout` elapses.
    pub async fn await_terminal(&self, task_id: &str, timeout: Duration) -> Option<TaskSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(snapshot) = self.registry.get(task_id) {
                if snapshot.status.is_terminal() {
                    return Some(snapshot);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Cancel the mesh and wait for the monitor and persistence drain
    /// tasks to finish, per spec §4.4 "Disposal completes the channel
    /// and awaits the drain task."
    pub async fn shutdown(self) {
        self.ct.cancel();
        let _ = self.monitor.await;
        let _ = self.drain.await;
    }
}
