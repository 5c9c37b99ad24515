//! A tiny in-process fake HTTP document store implementing just enough
//! of the §6 wire contract (`POST /api/v1/command/{database}`,
//! `{"result":[...]}` shape, idempotent `CREATE ... IF NOT EXISTS`) for
//! `conclave-store`'s integration tests to exercise real HTTP round
//! trips without a live backend. Built on `axum`/`tower`, the same HTTP
//! stack the rest of the workspace already depends on.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::debug;

#[derive(Default)]
struct Store {
    /// One vec of records per document type, e.g. `"SwarmTask"`.
    collections: DashMap<String, Vec<Value>>,
}

/// A running fake document-store server. Drop to stop serving (the
/// spawned task is aborted when the handle goes out of scope).
pub struct FakeDocumentStore {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for FakeDocumentStore {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl FakeDocumentStore {
    /// Bind to an ephemeral local port and start serving immediately.
    pub async fn start() -> Self {
        let store = Arc::new(Store::default());
        let app = Router::new()
            .route("/api/v1/command/{database}", post(handle_command))
            .with_state(store);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake document store server");
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

#[derive(serde::Deserialize)]
struct CommandRequest {
    command: String,
    params: Option<Value>,
}

async fn handle_command(
    State(store): State<Arc<Store>>,
    Path(_database): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Json<Value> {
    debug!(command = %request.command, "fake document store received command");
    let result = interpret(&store, &request.command, request.params.unwrap_or(Value::Null));
    Json(json!({ "result": result }))
}

fn doc_type_after(command: &str, marker: &str) -> Option<String> {
    let idx = command.find(marker)?;
    command[idx + marker.len()..]
        .split_whitespace()
        .next()
        .map(str::to_string)
}

fn interpret(store: &Store, command: &str, params: Value) -> Vec<Value> {
    let upper = command.to_uppercase();

    if upper.starts_with("CREATE DOCUMENT TYPE") {
        if let Some(doc_type) = doc_type_after(command, "CREATE DOCUMENT TYPE ") {
            store.collections.entry(doc_type).or_default();
        }
        return Vec::new();
    }
    if upper.starts_with("CREATE PROPERTY") || upper.starts_with("CREATE INDEX") {
        return Vec::new();
    }

    if upper.starts_with("INSERT INTO") {
        if let Some(doc_type) = doc_type_after(command, "INSERT INTO ") {
            store.collections.entry(doc_type).or_default().push(params);
        }
        return vec![json!({"inserted": true})];
    }

    if upper.starts_with("UPDATE") && upper.contains("UPSERT") {
        if let Some(doc_type) = doc_type_after(command, "UPDATE ") {
            let key_field = if upper.contains("TASKID") { "taskId" } else { "runId" };
            let mut entries = store.collections.entry(doc_type).or_default();
            let key_value = params.get(key_field).cloned();
            if let Some(existing) = entries
                .iter_mut()
                .find(|row| row.get(key_field) == key_value.as_ref())
            {
                *existing = params;
            } else {
                entries.push(params);
            }
        }
        return vec![json!({"@rid": "#1:1"})];
    }

    if upper.starts_with("SELECT MAX(") {
        if let Some(doc_type) = doc_type_after(command, "FROM ") {
            let (selector_field, key) = extract_where_key(&upper, command, &params);
            let seq_field = extract_max_field(command);
            let max_value = store
                .collections
                .get(&doc_type)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| {
                            selector_field
                                .as_ref()
                                .map(|f| row.get(f) == key.as_ref())
                                .unwrap_or(true)
                        })
                        .filter_map(|row| row.get(&seq_field).and_then(|v| v.as_i64()))
                        .max()
                })
                .unwrap_or(None);
            return vec![json!({"maxSeq": max_value})];
        }
        return vec![json!({"maxSeq": Value::Null})];
    }

    if upper.starts_with("SELECT FROM") {
        if let Some(doc_type) = doc_type_after(command, "FROM ") {
            let limit = extract_limit(&upper);
            let rows = store.collections.get(&doc_type).map(|r| r.clone()).unwrap_or_default();
            let filtered: Vec<Value> = if upper.contains("WHERE") {
                let (field, key) = extract_where_key(&upper, command, &params);
                rows.into_iter()
                    .filter(|row| field.as_ref().map(|f| row.get(f) == key.as_ref()).unwrap_or(true))
                    .collect()
            } else {
                rows
            };
            let limited: Vec<Value> = filtered.into_iter().take(limit).collect();
            return limited;
        }
    }

    Vec::new()
}

fn extract_limit(upper: &str) -> usize {
    if let Some(idx) = upper.find("LIMIT ") {
        upper[idx + "LIMIT ".len()..]
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(usize::MAX)
    } else {
        usize::MAX
    }
}

fn extract_max_field(command: &str) -> String {
    let marker = "max(";
    let lower = command.to_lowercase();
    if let Some(idx) = lower.find(marker) {
        let rest = &command[idx + marker.len()..];
        if let Some(end) = rest.find(')') {
            return rest[..end].to_string();
        }
    }
    String::new()
}

/// Find `WHERE <field> = :<paramName>` and resolve `params.<paramName>`.
fn extract_where_key(upper: &str, original: &str, params: &Value) -> (Option<String>, Option<Value>) {
    let Some(where_idx) = upper.find("WHERE ") else {
        return (None, None);
    };
    let clause = &original[where_idx + "WHERE ".len()..];
    let mut parts = clause.split_whitespace();
    let field = parts.next().map(str::to_string);
    // skip "="
    parts.next();
    let param_ref = parts.next().unwrap_or("");
    let param_name = param_ref.trim_start_matches(':');
    let key = if param_name.is_empty() {
        None
    } else {
        let mut map = HashMap::new();
        if let Value::Object(obj) = params {
            for (k, v) in obj {
                map.insert(k.clone(), v.clone());
            }
        }
        map.get(param_name).cloned()
    };
    (field, key)
}
