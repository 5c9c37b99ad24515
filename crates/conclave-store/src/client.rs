//! HTTP document-store wire client, per spec §6 "External backend wire
//! contract".
//!
//! Request/await/deserialize/log-and-degrade: build the request, await
//! the response, parse JSON, never propagate a hard error out of a
//! best-effort store operation.

use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("non-2xx response: {0}")]
    NonSuccess(reqwest::StatusCode),
    #[error("malformed result shape: {0}")]
    MalformedResult(String),
}

#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
}

impl DocumentStoreClient {
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let user = user.into();
        if user.contains(':') {
            warn!("document store user contains ':', HTTP Basic auth encoding will be invalid");
        }
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            database: database.into(),
            user,
            password: password.into(),
        }
    }

    fn command_url(&self) -> String {
        format!(
            "{}/api/v1/command/{}",
            self.base_url.trim_end_matches('/'),
            percent_encode_path_segment(&self.database)
        )
    }

    /// Run a single SQL-like command against the document store,
    /// returning the `result` array verbatim (as `serde_json::Value`s)
    /// for callers to interpret per their own entity mapping.
    pub async fn command(
        &self,
        command: &str,
        params: Option<Value>,
    ) -> Result<Vec<Value>, DocumentStoreError> {
        let body = json!({
            "language": "sql",
            "command": command,
            "serializer": "record",
            "autoCommit": true,
            "params": params,
        });

        let response = self
            .http
            .post(self.command_url())
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocumentStoreError::NonSuccess(response.status()));
        }

        let parsed: Value = response.json().await?;
        match parsed.get("result") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(DocumentStoreError::MalformedResult(parsed.to_string())),
        }
    }
}

/// Minimal path-segment percent-encoding sufficient for a database
/// name: the reserved characters that would otherwise split the URL
/// path. Not a general-purpose percent-encoder.
fn percent_encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Parse a value that may arrive as a JSON number or a numeric string,
/// per spec §6 "Numbers may arrive as strings; long-integer parsing
/// must fall back to string-then-parse."
pub fn parse_long(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_url_escapes_database_name() {
        let client = DocumentStoreClient::new("http://localhost:2480", "my db/name", "root", "pw");
        assert_eq!(
            client.command_url(),
            "http://localhost:2480/api/v1/command/my%20db%2Fname"
        );
    }

    #[test]
    fn command_url_strips_trailing_slash_on_base() {
        let client = DocumentStoreClient::new("http://localhost:2480/", "db", "root", "pw");
        assert_eq!(client.command_url(), "http://localhost:2480/api/v1/command/db");
    }

    #[test]
    fn parse_long_accepts_number_and_numeric_string() {
        assert_eq!(parse_long(&json!(42)), Some(42));
        assert_eq!(parse_long(&json!("42")), Some(42));
        assert_eq!(parse_long(&json!("not a number")), None);
    }
}
