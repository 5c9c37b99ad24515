//! Task Coordinator FSM (C7): per-task driver that asks the planner,
//! dispatches the next action, records the outcome, and loops or
//! terminates, per spec §4.2.
//!
//! Transitions are validated by matching on `(from, to)` tuples, with a
//! defensive walk-back-through-intermediate-states recovery block when
//! an action fails mid-flight, driven by the planner's `WorldState`
//! selection rather than a fixed state graph, and escalating through a
//! rework-then-retry-then-escalate cycle instead of a single DAG retry.
//!
//! The coordinator never holds a direct reference to worker/reviewer
//! pools (per spec §9 "cyclic reference risk"): it talks to a
//! [`RoleDispatcher`] and an [`EventSink`], both mailbox-address-shaped
//! seams the actor mesh crate implements.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::adapter::{AdapterOutcome, ExecuteRequest, RoleExecutorError};
use crate::executor::normalize::is_reviewer_rejection;
use crate::planner::{self};
use crate::registry::{RegistryError, TaskRegistry};
use crate::role::{ActionDisposition, Role, disposition_for};
use crate::task::{EventType, TaskSnapshot};
use crate::world::{Goal, WorldKey, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Success,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Planning,
    AwaitingRole(Role),
    Rework,
    Terminating(TerminationKind),
}

/// Dispatches a role execution request through the actor mesh and
/// awaits the outcome. Implemented by `conclave-actors`; the coordinator
/// only ever sees this trait, never a pool directly.
#[async_trait]
pub trait RoleDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        request: &ExecuteRequest,
        preferred_adapter: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError>;
}

/// Emits a domain event. The sink owns sequence allocation (C5); the
/// coordinator only names what happened.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, task_id: &str, run_id: &str, event_type: EventType, payload: String);
}

/// Run-local counters the FSM keeps alongside the registry snapshot;
/// these are not part of `TaskSnapshot` because they are coordination
/// bookkeeping, not task-visible state (spec §4.2 step 6-7 and the
/// Rework/RetryLimitReached Open Question resolution).
#[derive(Debug, Clone, Default)]
struct RunLocalCounters {
    rework_count: u32,
    retries_for_role: std::collections::HashMap<Role, u32>,
    review_rejected: bool,
    review_passed: bool,
    subtasks_spawned: bool,
    subtasks_completed: bool,
    agents_available: bool,
    negotiation_complete: bool,
}

impl RunLocalCounters {
    fn retry_limit_reached(&self, max_retries: u32) -> bool {
        self.rework_count >= max_retries
    }
}

pub struct TaskCoordinator<'a> {
    registry: &'a TaskRegistry,
    dispatcher: &'a dyn RoleDispatcher,
    sink: &'a dyn EventSink,
    max_retries: u32,
    counters: RunLocalCounters,
}

impl<'a> TaskCoordinator<'a> {
    pub fn new(
        registry: &'a TaskRegistry,
        dispatcher: &'a dyn RoleDispatcher,
        sink: &'a dyn EventSink,
        max_retries: u32,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            sink,
            max_retries,
            counters: RunLocalCounters::default(),
        }
    }

    fn build_world_state(&self, snapshot: &TaskSnapshot) -> WorldState {
        WorldState::from_pairs([
            (WorldKey::TaskExists, true),
            (WorldKey::PlanExists, snapshot.planning_output.is_some()),
            (WorldKey::BuildExists, snapshot.build_output.is_some()),
            (WorldKey::ReviewPassed, self.counters.review_passed),
            (WorldKey::ReviewRejected, self.counters.review_rejected),
            (
                WorldKey::RetryLimitReached,
                self.counters.retry_limit_reached(self.max_retries),
            ),
            (WorldKey::ReworkAttempted, self.counters.rework_count > 0),
            (WorldKey::TaskCompleted, false),
            (WorldKey::TaskBlocked, false),
            (WorldKey::SubTasksSpawned, self.counters.subtasks_spawned),
            (WorldKey::SubTasksCompleted, self.counters.subtasks_completed),
            (WorldKey::AgentsAvailable, self.counters.agents_available),
            (WorldKey::NegotiationComplete, self.counters.negotiation_complete),
        ])
    }

    /// Run one task to a terminal state, returning which terminal state
    /// it reached. Loops through `Planning -> dispatch -> record` until
    /// `Finalize`/`Escalate` is chosen.
    pub async fn run(
        &mut self,
        task_id: &str,
        run_id: &str,
        ct: &CancellationToken,
    ) -> Result<TerminationKind, RegistryError> {
        self.sink
            .emit(task_id, run_id, EventType::CoordinationStarted, "{}".to_string())
            .await;

        loop {
            let snapshot = self
                .registry
                .get(task_id)
                .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
            let state = self.build_world_state(&snapshot);

            let mut result = planner::plan(&state, &Goal::complete_task(), None);
            if result.dead_end {
                result = planner::plan(&state, &Goal::escalate_task(), None);
            }
            let Some(plan) = result.recommended else {
                warn!(task_id, "planner produced no plan at all, escalating directly");
                self.registry.mark_failed(task_id, "no viable plan").await?;
                self.sink
                    .emit(task_id, run_id, EventType::TaskFailed, "{}".to_string())
                    .await;
                return Ok(TerminationKind::Blocked);
            };
            let Some(action_name) = plan.first() else {
                // Empty plan: goal already satisfied, nothing left to do.
                self.registry.mark_done(task_id, "already complete").await?;
                self.sink
                    .emit(task_id, run_id, EventType::TaskDone, "{}".to_string())
                    .await;
                return Ok(TerminationKind::Success);
            };

            match disposition_for(action_name) {
                ActionDisposition::Terminal if action_name == "Finalize" => {
                    self.registry.transition(task_id, crate::task::TaskStatus::Done).await?;
                    self.registry.mark_done(task_id, "task completed").await?;
                    self.sink
                        .emit(task_id, run_id, EventType::TaskDone, "{}".to_string())
                        .await;
                    return Ok(TerminationKind::Success);
                }
                ActionDisposition::Terminal => {
                    // Escalate.
                    self.registry.mark_failed(task_id, "escalated after exhausting retries").await?;
                    self.sink
                        .emit(task_id, run_id, EventType::TaskFailed, "{}".to_string())
                        .await;
                    return Ok(TerminationKind::Blocked);
                }
                ActionDisposition::Internal => {
                    if action_name == "Negotiate" {
                        self.counters.negotiation_complete = true;
                    }
                }
                ActionDisposition::AwaitSubTasks => {
                    let children_done = snapshot.child_task_ids.iter().all(|child| {
                        self.registry
                            .get(child)
                            .map(|c| c.status == crate::task::TaskStatus::Done)
                            .unwrap_or(false)
                    });
                    self.counters.subtasks_completed = children_done;
                    if !children_done {
                        return Ok(TerminationKind::Blocked);
                    }
                }
                ActionDisposition::DispatchRole(role) => {
                    self.dispatch_role(task_id, run_id, role, action_name, &snapshot, ct).await?;
                }
            }
        }
    }

    async fn dispatch_role(
        &mut self,
        task_id: &str,
        run_id: &str,
        role: Role,
        action_name: &str,
        snapshot: &TaskSnapshot,
        ct: &CancellationToken,
    ) -> Result<(), RegistryError> {
        self.sink
            .emit(task_id, run_id, EventType::RoleStarted, format!("{{\"role\":\"{role}\"}}"))
            .await;

        let request = ExecuteRequest {
            task_id: task_id.to_string(),
            task_title: snapshot.title.clone(),
            task_description: snapshot.description.clone(),
            role,
            prompt: snapshot.description.clone(),
            workspace: format!("/workspace/{task_id}"),
            model: None,
            reasoning: None,
        };

        let outcome = self.dispatcher.dispatch(&request, None, ct).await;

        if action_name == "Rework" {
            self.counters.rework_count += 1;
        }

        match outcome {
            Ok(outcome) => {
                self.registry.set_role_output(task_id, role, outcome.output.clone()).await?;
                self.sink
                    .emit(task_id, run_id, EventType::RoleCompleted, format!("{{\"role\":\"{role}\"}}"))
                    .await;
                if matches!(role, Role::Reviewer) {
                    if is_reviewer_rejection(&outcome.output, outcome.rejected) {
                        self.counters.review_rejected = true;
                        self.counters.review_passed = false;
                    } else {
                        self.counters.review_passed = true;
                        self.counters.review_rejected = false;
                    }
                } else if action_name == "Rework" {
                    self.counters.review_rejected = false;
                }
                *self.counters.retries_for_role.entry(role).or_insert(0) = 0;
                Ok(())
            }
            Err(err) => {
                info!(task_id, role = %role, error = %err, "role execution failed");
                self.sink
                    .emit(task_id, run_id, EventType::RoleFailed, format!("{{\"role\":\"{role}\"}}"))
                    .await;
                let retries = self.counters.retries_for_role.entry(role).or_insert(0);
                if *retries < 1 {
                    *retries += 1;
                } else {
                    self.counters.review_rejected = true;
                    self.counters.rework_count = self.max_retries;
                }
                Ok(())
            }
        }
    }
}
