//! Idempotent schema bootstrap, per spec §6 "Schema bootstrap" and §4.5
//! "On schema-ensure failure, continue writing".

use tracing::debug;

use crate::client::DocumentStoreClient;

/// One document type per persisted entity, per spec §6 "Persisted-state
/// layout".
pub const DOCUMENT_TYPES: &[&str] = &["SwarmTask", "SwarmRun", "TaskOutcome", "TaskExecutionEvent"];

fn bootstrap_commands() -> Vec<String> {
    let mut commands = Vec::new();
    for doc_type in DOCUMENT_TYPES {
        commands.push(format!("CREATE DOCUMENT TYPE {doc_type} IF NOT EXISTS"));
    }
    commands.push("CREATE PROPERTY SwarmTask.taskId IF NOT EXISTS STRING".to_string());
    commands.push("CREATE PROPERTY SwarmRun.runId IF NOT EXISTS STRING".to_string());
    commands.push("CREATE PROPERTY TaskExecutionEvent.eventId IF NOT EXISTS STRING".to_string());
    commands.push("CREATE PROPERTY TaskExecutionEvent.taskId IF NOT EXISTS STRING".to_string());
    commands.push("CREATE PROPERTY TaskExecutionEvent.runId IF NOT EXISTS STRING".to_string());
    commands.push("CREATE PROPERTY TaskExecutionEvent.taskSequence IF NOT EXISTS LONG".to_string());
    commands.push("CREATE PROPERTY TaskExecutionEvent.runSequence IF NOT EXISTS LONG".to_string());
    commands.push("CREATE INDEX ON SwarmTask (taskId) UNIQUE IF NOT EXISTS".to_string());
    commands.push("CREATE INDEX ON SwarmRun (runId) UNIQUE IF NOT EXISTS".to_string());
    commands.push("CREATE INDEX ON TaskExecutionEvent (eventId) UNIQUE IF NOT EXISTS".to_string());
    commands.push(
        "CREATE INDEX ON TaskExecutionEvent (taskId, taskSequence) IF NOT EXISTS".to_string(),
    );
    commands.push(
        "CREATE INDEX ON TaskExecutionEvent (runId, runSequence) IF NOT EXISTS".to_string(),
    );
    commands
}

/// Run every bootstrap command once; a failing statement is logged at
/// debug and does not abort the remaining statements or the caller's
/// subsequent writes.
pub async fn ensure_schema(client: &DocumentStoreClient) {
    for command in bootstrap_commands() {
        if let Err(err) = client.command(&command, None).await {
            debug!(command = %command, error = %err, "schema bootstrap statement failed, continuing");
        }
    }
}
