//! Dispatcher actor (spec §4.6): the mesh's entry point. Receives
//! `TaskAssigned`, registers the task, and drives it to completion via a
//! per-task [`TaskCoordinator`] that routes role commands into the
//! worker/reviewer pools, spawning one coordinator per task and
//! updating the supervisor's aggregate counters once it finishes.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::coordinator::{EventSink, RoleDispatcher, TaskCoordinator, TerminationKind};
use conclave_core::executor::adapter::{AdapterOutcome, ExecuteRequest, RoleExecutorError};
use conclave_core::registry::TaskRegistry;
use conclave_core::role::Role;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pool::{ActorPool, PoolError};
use crate::supervisor::{SupervisorHandle, SupervisorMsg};

pub struct TaskAssigned {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub run_id: String,
}

/// Routes a role-execution request into the worker pool for every role
/// except `Reviewer`, which goes to the reviewer pool, per spec §4.6
/// "Worker pool / Reviewer pool".
struct PoolRoleDispatcher {
    worker_pool: Arc<ActorPool>,
    reviewer_pool: Arc<ActorPool>,
}

#[async_trait]
impl RoleDispatcher for PoolRoleDispatcher {
    async fn dispatch(
        &self,
        request: &ExecuteRequest,
        preferred_adapter: Option<&str>,
        _ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError> {
        let pool = if matches!(request.role, Role::Reviewer) {
            &self.reviewer_pool
        } else {
            &self.worker_pool
        };
        pool.dispatch(request.clone(), preferred_adapter.map(String::from))
            .await
            .map_err(|err: PoolError| RoleExecutorError::NoAdapterSucceeded(err.to_string()))
    }
}

#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<TaskAssigned>,
}

impl DispatcherHandle {
    pub fn spawn(
        registry: Arc<TaskRegistry>,
        worker_pool: Arc<ActorPool>,
        reviewer_pool: Arc<ActorPool>,
        sink: Arc<dyn EventSink>,
        supervisor: SupervisorHandle,
        max_retries: u32,
        ct: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run(rx, registry, worker_pool, reviewer_pool, sink, supervisor, max_retries, ct));
        Self { tx }
    }

    pub async fn assign(&self, task: TaskAssigned) -> Result<(), mpsc::error::SendError<TaskAssigned>> {
        self.tx.send(task).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    mut rx: mpsc::Receiver<TaskAssigned>,
    registry: Arc<TaskRegistry>,
    worker_pool: Arc<ActorPool>,
    reviewer_pool: Arc<ActorPool>,
    sink: Arc<dyn EventSink>,
    supervisor: SupervisorHandle,
    max_retries: u32,
    ct: CancellationToken,
) {
    loop {
        let assigned = tokio::select! {
            biased;
            assigned = rx.recv() => assigned,
            _ = ct.cancelled() => {
                rx.close();
                rx.recv().await
            }
        };
        let Some(assigned) = assigned else {
            info!("dispatcher mailbox closed, terminating");
            return;
        };

        registry
            .register(assigned.task_id.clone(), assigned.title, assigned.description, assigned.run_id.clone())
            .await;
        supervisor.notify(SupervisorMsg::TaskStarted).await;

        let registry = registry.clone();
        let role_dispatcher = PoolRoleDispatcher { worker_pool: worker_pool.clone(), reviewer_pool: reviewer_pool.clone() };
        let sink = sink.clone();
        let supervisor = supervisor.clone();
        let ct = ct.clone();
        let task_id = assigned.task_id;
        let run_id = assigned.run_id;

        tokio::spawn(async move {
            let mut coordinator = TaskCoordinator::new(&registry, &role_dispatcher, sink.as_ref(), max_retries);
            match coordinator.run(&task_id, &run_id, &ct).await {
                Ok(TerminationKind::Success) => {
                    supervisor.notify(SupervisorMsg::TaskCompleted).await;
                }
                Ok(TerminationKind::Blocked) => {
                    supervisor.notify(SupervisorMsg::TaskFailed).await;
                    supervisor.notify(SupervisorMsg::TaskEscalated).await;
                }
                Err(err) => {
                    warn!(task_id, error = %err, "coordinator exited with a registry error");
                    supervisor.notify(SupervisorMsg::TaskFailed).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::executor::RoleExecutor;
    use conclave_core::executor::adapter::LocalEchoAdapter;
    use conclave_core::task::TaskStatus;

    struct NullSink;
    #[async_trait]
    impl EventSink for NullSink {
        async fn emit(&self, _task_id: &str, _run_id: &str, _event_type: conclave_core::task::EventType, _payload: String) {}
    }

    #[tokio::test]
    async fn assigning_a_task_drives_it_to_done_through_local_echo() {
        let (registry, _rx) = TaskRegistry::new();
        let registry = Arc::new(registry);
        let executor = Arc::new(RoleExecutor::new(vec![Box::new(LocalEchoAdapter)], 4, 30));
        let ct = CancellationToken::new();
        let worker_pool = Arc::new(ActorPool::spawn("worker", 2, executor.clone(), ct.clone()));
        let reviewer_pool = Arc::new(ActorPool::spawn("reviewer", 1, executor, ct.clone()));
        let supervisor = SupervisorHandle::spawn(ct.clone());

        let dispatcher = DispatcherHandle::spawn(
            registry.clone(),
            worker_pool,
            reviewer_pool,
            Arc::new(NullSink),
            supervisor.clone(),
            2,
            ct.clone(),
        );

        dispatcher
            .assign(TaskAssigned {
                task_id: "t1".to_string(),
                title: "add flag".to_string(),
                description: "do it".to_string(),
                run_id: "r1".to_string(),
            })
            .await
            .unwrap();

        let mut done = false;
        for _ in 0..200 {
            if let Some(snapshot) = registry.get("t1") {
                if snapshot.status.is_terminal() {
                    done = true;
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(done, "task did not reach a terminal status in time");
        assert_eq!(registry.get("t1").unwrap().status, TaskStatus::Done);

        let snapshot = supervisor.snapshot().await.unwrap();
        assert_eq!(snapshot.started, 1);
        assert_eq!(snapshot.completed, 1);
    }
}
