//! End-to-end actor mesh scenarios: several tasks assigned concurrently
//! through the dispatcher, routed across pool children, with the
//! supervisor's aggregate counters checked against the outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conclave_actors::dispatcher::TaskAssigned;
use conclave_actors::{ActorPool, BlackboardHandle, DispatcherHandle, SupervisorHandle};
use conclave_core::coordinator::EventSink;
use conclave_core::executor::RoleExecutor;
use conclave_core::executor::adapter::LocalEchoAdapter;
use conclave_core::registry::TaskRegistry;
use conclave_core::task::{EventType, TaskStatus};
use tokio_util::sync::CancellationToken;

struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _task_id: &str, _run_id: &str, _event_type: EventType, _payload: String) {}
}

async fn wait_for_terminal(registry: &TaskRegistry, task_id: &str) -> TaskStatus {
    for _ in 0..400 {
        if let Some(snapshot) = registry.get(task_id) {
            if snapshot.status.is_terminal() {
                return snapshot.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached a terminal status");
}

#[tokio::test]
async fn ten_concurrent_tasks_all_reach_done_through_the_mesh() {
    let (registry, _rx) = TaskRegistry::new();
    let registry = Arc::new(registry);
    let executor = Arc::new(RoleExecutor::new(vec![Box::new(LocalEchoAdapter)], 8, 30));
    let ct = CancellationToken::new();
    let worker_pool = Arc::new(ActorPool::spawn("worker", 4, executor.clone(), ct.clone()));
    let reviewer_pool = Arc::new(ActorPool::spawn("reviewer", 2, executor, ct.clone()));
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

    for i in 0..10 {
        dispatcher
            .assign(TaskAssigned {
                task_id: format!("t{i}"),
                title: "title".to_string(),
                description: "desc".to_string(),
                run_id: format!("run-{i}"),
            })
            .await
            .unwrap();
    }

    for i in 0..10 {
        let status = wait_for_terminal(&registry, &format!("t{i}")).await;
        assert_eq!(status, TaskStatus::Done);
    }

    let snapshot = supervisor.snapshot().await.unwrap();
    assert_eq!(snapshot.started, 10);
    assert_eq!(snapshot.completed, 10);
    assert_eq!(snapshot.failed, 0);
}

#[tokio::test]
async fn blackboard_writes_from_one_task_are_visible_independently_of_task_progress() {
    let blackboard = BlackboardHandle::spawn();
    blackboard.put("hint", "prefer-rework").await;
    for _ in 0..20 {
        if blackboard.get("hint").is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    // The blackboard is write-only stigmergy: nothing in the mesh reads
    // it to decide task progress, it is purely an observability surface.
    assert_eq!(blackboard.get("hint").as_deref(), Some("prefer-rework"));
}
