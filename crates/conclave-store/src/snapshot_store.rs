//! The snapshot store: UPSERT-by-`taskId` persistence of
//! [`TaskSnapshot`], per spec §4.5 "Snapshot store".

use std::sync::Arc;
use std::time::{Duration, Instant};

use conclave_core::task::{TaskSnapshot, TaskStatus, legacy_run_id};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

use crate::client::DocumentStoreClient;

/// Read APIs throttle error logs to at most one per this interval, per
/// spec §4.5.
const ERROR_LOG_THROTTLE: Duration = Duration::from_secs(15);

pub struct SnapshotStore {
    client: DocumentStoreClient,
    last_error_logged_at: Arc<Mutex<Option<Instant>>>,
}

impl SnapshotStore {
    pub fn new(client: DocumentStoreClient) -> Self {
        Self {
            client,
            last_error_logged_at: Arc::new(Mutex::new(None)),
        }
    }

    async fn log_throttled(&self, context: &str, error: impl std::fmt::Display) {
        let mut last = self.last_error_logged_at.lock().await;
        let should_log = last.map(|t| t.elapsed() >= ERROR_LOG_THROTTLE).unwrap_or(true);
        if should_log {
            warn!(context, %error, "document store read failed");
            *last = Some(Instant::now());
        }
    }

    /// UPSERT a snapshot. Best-effort: logs and returns on failure,
    /// never propagates a hard error to the caller.
    pub async fn upsert(&self, snapshot: &TaskSnapshot) {
        let params = json!({
            "taskId": snapshot.task_id,
            "title": snapshot.title,
            "description": snapshot.description,
            "status": snapshot.status.to_string(),
            "createdAt": snapshot.created_at.to_rfc3339(),
            "updatedAt": snapshot.updated_at.to_rfc3339(),
            "planningOutput": snapshot.planning_output,
            "buildOutput": snapshot.build_output,
            "reviewOutput": snapshot.review_output,
            "summary": snapshot.summary,
            "error": snapshot.error,
            "parentTaskId": snapshot.parent_task_id,
            "childTaskIds": snapshot.child_task_ids,
            "runId": snapshot.run_id,
        });
        let command = "UPDATE SwarmTask SET @this = :params UPSERT WHERE taskId = :taskId RETURN AFTER @rid";
        if let Err(err) = self.client.command(command, Some(params)).await {
            warn!(task_id = %snapshot.task_id, error = %err, "snapshot upsert failed, best-effort");
        }
    }

    /// Up to `limit` snapshots; empty on transport failure.
    pub async fn list(&self, limit: usize, order_by: Option<&str>) -> Vec<TaskSnapshot> {
        let order = order_by.unwrap_or("updatedAt DESC");
        let command = format!("SELECT FROM SwarmTask ORDER BY {order} LIMIT {limit}");
        match self.client.command(&command, None).await {
            Ok(rows) => rows.iter().filter_map(row_to_snapshot).collect(),
            Err(err) => {
                self.log_throttled("list", err).await;
                Vec::new()
            }
        }
    }

    /// `None` on transport failure or missing record.
    pub async fn get(&self, task_id: &str) -> Option<TaskSnapshot> {
        let command = "SELECT FROM SwarmTask WHERE taskId = :taskId LIMIT 1";
        let params = json!({ "taskId": task_id });
        match self.client.command(command, Some(params)).await {
            Ok(rows) => rows.first().and_then(row_to_snapshot),
            Err(err) => {
                self.log_throttled("get", err).await;
                None
            }
        }
    }

    pub async fn list_by_run_id(&self, run_id: &str, limit: usize) -> Vec<TaskSnapshot> {
        let command = format!("SELECT FROM SwarmTask WHERE runId = :runId LIMIT {limit}");
        let params = json!({ "runId": run_id });
        match self.client.command(&command, Some(params)).await {
            Ok(rows) => rows.iter().filter_map(row_to_snapshot).collect(),
            Err(err) => {
                self.log_throttled("list_by_run_id", err).await;
                Vec::new()
            }
        }
    }
}

fn row_to_snapshot(row: &serde_json::Value) -> Option<TaskSnapshot> {
    let task_id = row.get("taskId")?.as_str()?.to_string();
    let title = row.get("title")?.as_str().unwrap_or_default().to_string();
    let description = row.get("description")?.as_str().unwrap_or_default().to_string();
    let status: TaskStatus = row
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(TaskStatus::Queued);
    let created_at = row
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let updated_at = row
        .get("updatedAt")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or(created_at);
    let run_id = row
        .get("runId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| legacy_run_id(&task_id));

    Some(TaskSnapshot {
        task_id,
        title,
        description,
        status,
        created_at,
        updated_at,
        planning_output: row.get("planningOutput").and_then(|v| v.as_str()).map(String::from),
        build_output: row.get("buildOutput").and_then(|v| v.as_str()).map(String::from),
        review_output: row.get("reviewOutput").and_then(|v| v.as_str()).map(String::from),
        summary: row.get("summary").and_then(|v| v.as_str()).map(String::from),
        error: row.get("error").and_then(|v| v.as_str()).map(String::from),
        parent_task_id: row.get("parentTaskId").and_then(|v| v.as_str()).map(String::from),
        child_task_ids: row
            .get("childTaskIds")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        run_id,
        artifacts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_to_snapshot_synthesizes_legacy_run_id_when_missing() {
        let row = json!({
            "taskId": "t1",
            "title": "x",
            "description": "y",
            "status": "Queued",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
        });
        let snapshot = row_to_snapshot(&row).unwrap();
        assert_eq!(snapshot.run_id, "legacy-t1");
    }

    #[test]
    fn row_to_snapshot_keeps_explicit_run_id() {
        let row = json!({
            "taskId": "t1",
            "title": "x",
            "description": "y",
            "status": "Done",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "runId": "run-5",
        });
        let snapshot = row_to_snapshot(&row).unwrap();
        assert_eq!(snapshot.run_id, "run-5");
        assert_eq!(snapshot.status, TaskStatus::Done);
    }

    #[test]
    fn row_to_snapshot_is_none_without_task_id() {
        let row = json!({ "title": "x" });
        assert!(row_to_snapshot(&row).is_none());
    }
}
