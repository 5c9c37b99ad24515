//! Task-domain data types: [`TaskStatus`], [`TaskSnapshot`],
//! [`TaskArtifact`], [`RoleExecutionRecord`], [`TaskExecutionEvent`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    InProgress,
    Done,
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
            Self::Blocked => "Blocked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized task status: {0}")]
pub struct TaskStatusParseError(String);

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(Self::Queued),
            "InProgress" => Ok(Self::InProgress),
            "Done" => Ok(Self::Done),
            "Blocked" => Ok(Self::Blocked),
            other => Err(TaskStatusParseError(other.to_string())),
        }
    }
}

impl TaskStatus {
    /// `Done`/`Blocked` are terminal; the registry refuses further
    /// transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Blocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    File,
    Design,
    Trace,
    Message,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Design => "design",
            Self::Trace => "trace",
            Self::Message => "message",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized artifact type: {0}")]
pub struct ArtifactTypeParseError(String);

impl FromStr for ArtifactType {
    type Err = ArtifactTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "design" => Ok(Self::Design),
            "trace" => Ok(Self::Trace),
            "message" => Ok(Self::Message),
            other => Err(ArtifactTypeParseError(other.to_string())),
        }
    }
}

/// Derive the content-addressed artifact id: `"art-"` plus the first 24
/// hex characters of the SHA-256 digest of `bytes`.
pub fn artifact_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = hex::encode(digest);
    format!("art-{}", &hex[..24])
}

/// `"sha256:"` plus the lowercase hex digest, used for `contentHash`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskArtifact {
    pub artifact_id: String,
    pub run_id: String,
    pub task_id: String,
    pub agent_id: String,
    pub artifact_type: ArtifactType,
    pub path: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl TaskArtifact {
    pub fn from_bytes(
        bytes: &[u8],
        run_id: impl Into<String>,
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        artifact_type: ArtifactType,
        path: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            artifact_id: artifact_id(bytes),
            run_id: run_id.into(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            artifact_type,
            path,
            content_hash: content_hash(bytes),
            created_at,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleExecutionRecord {
    pub task_id: String,
    pub role: Role,
    pub adapter_used: Option<String>,
    pub retry_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub succeeded: bool,
    /// Clamped to `[0.0, 1.0]` on construction.
    confidence: f64,
}

impl RoleExecutionRecord {
    pub fn new(task_id: impl Into<String>, role: Role) -> Self {
        Self {
            task_id: task_id.into(),
            role,
            adapter_used: None,
            retry_count: 0,
            started_at: None,
            completed_at: None,
            succeeded: false,
            confidence: 0.0,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn with_confidence(mut self, value: f64) -> Self {
        self.confidence = value.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub planning_output: Option<String>,
    pub build_output: Option<String>,
    pub review_output: Option<String>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub parent_task_id: Option<String>,
    pub child_task_ids: Vec<String>,
    pub run_id: String,
    pub artifacts: Vec<TaskArtifact>,
}

impl TaskSnapshot {
    pub fn new(
        task_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        run_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Queued,
            created_at: now,
            updated_at: now,
            planning_output: None,
            build_output: None,
            review_output: None,
            summary: None,
            error: None,
            parent_task_id: None,
            child_task_ids: Vec::new(),
            run_id: run_id.into(),
            artifacts: Vec::new(),
        }
    }
}

/// At least the event types spec.md §3 names; other values are
/// accepted but these are the ones the coordinator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    TaskSubmitted,
    CoordinationStarted,
    RoleStarted,
    RoleCompleted,
    RoleFailed,
    TaskDone,
    TaskFailed,
    DiagnosticContext,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TaskSubmitted => "task.submitted",
            Self::CoordinationStarted => "coordination.started",
            Self::RoleStarted => "role.started",
            Self::RoleCompleted => "role.completed",
            Self::RoleFailed => "role.failed",
            Self::TaskDone => "task.done",
            Self::TaskFailed => "task.failed",
            Self::DiagnosticContext => "diagnostic.context",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExecutionEvent {
    pub event_id: String,
    pub run_id: String,
    pub task_id: String,
    pub event_type: EventType,
    /// Opaque JSON payload, serialized by the caller.
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
    pub task_sequence: u64,
    pub run_sequence: u64,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl TaskExecutionEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: impl Into<String>,
        task_id: impl Into<String>,
        event_type: EventType,
        payload: impl Into<String>,
        occurred_at: DateTime<Utc>,
        task_sequence: u64,
        run_sequence: u64,
    ) -> Self {
        Self {
            event_id: format!("evt-{}", Uuid::new_v4()),
            run_id: run_id.into(),
            task_id: task_id.into(),
            event_type,
            payload: payload.into(),
            occurred_at,
            task_sequence,
            run_sequence,
            trace_id: None,
            span_id: None,
        }
    }
}

/// When a record's `runId` is null/empty, readers must synthesize this
/// deterministic value rather than ever seeing `None`, per spec §4.5
/// "Legacy run-id rule".
pub fn legacy_run_id(task_id: &str) -> String {
    format!("legacy-{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_id_is_pure_function_of_content() {
        let a = artifact_id(b"hello world");
        let b = artifact_id(b"hello world");
        let c = artifact_id(b"hello worlD");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("art-"));
        assert_eq!(a.len(), 4 + 24);
    }

    #[test]
    fn content_hash_matches_artifact_id_prefix() {
        let hash = content_hash(b"payload");
        let id = artifact_id(b"payload");
        assert!(hash.starts_with("sha256:"));
        assert!(hash[7..].starts_with(&id[4..]));
    }

    #[test]
    fn status_terminal_classification() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn legacy_run_id_is_deterministic() {
        assert_eq!(legacy_run_id("t1"), "legacy-t1");
        assert_eq!(legacy_run_id("t1"), legacy_run_id("t1"));
    }

    #[test]
    fn confidence_is_clamped() {
        let rec = RoleExecutionRecord::new("t1", Role::Builder).with_confidence(1.5);
        assert_eq!(rec.confidence(), 1.0);
        let rec = RoleExecutionRecord::new("t1", Role::Builder).with_confidence(-0.5);
        assert_eq!(rec.confidence(), 0.0);
    }

    #[test]
    fn status_display_and_parse_round_trip() {
        for status in [
            TaskStatus::Queued,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Blocked,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
    }
}
