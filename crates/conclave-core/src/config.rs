//! `RuntimeOptions`: the single immutable config struct threaded through
//! every constructor, per spec §9 "Config objects".
//!
//! Resolution (CLI-flag > config-file > environment > compiled-default)
//! lives in `conclave-cli::config`, which loads a file/env layer and
//! calls [`RuntimeOptions::with_overrides`]; this crate owns only the
//! struct and its defaults so that library code never depends on a CLI
//! or filesystem layer.

use crate::executor::sandbox::SandboxLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct ArcadeDbOptions {
    pub enabled: bool,
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub auto_create_schema: bool,
}

impl Default for ArcadeDbOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:2480".to_string(),
            database: "conclave".to_string(),
            user: "root".to_string(),
            password: String::new(),
            auto_create_schema: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOptions {
    pub sandbox_mode: String,
    pub sandbox_level: SandboxLevel,
    pub sandbox_allowed_hosts: Vec<String>,
    pub worker_pool_size: u32,
    pub reviewer_pool_size: u32,
    pub max_cli_concurrency: u32,
    pub cli_adapter_order: Vec<String>,
    pub role_execution_timeout_seconds: u64,
    pub memory_bootstrap_enabled: bool,
    pub memory_bootstrap_limit: u32,
    pub arcade_db: ArcadeDbOptions,
    pub role_model_mapping: std::collections::BTreeMap<String, String>,
    pub api_provider_order: Vec<String>,
    pub auto_submit_demo_task: bool,
    pub demo_task_title: String,
    pub demo_task_description: String,
    pub workspace_path: String,
    pub max_retries: u32,
    pub heartbeat_seconds: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            sandbox_mode: "auto".to_string(),
            sandbox_level: SandboxLevel::OsSandboxed,
            sandbox_allowed_hosts: Vec::new(),
            worker_pool_size: 4,
            reviewer_pool_size: 2,
            max_cli_concurrency: 8,
            cli_adapter_order: vec!["claude".to_string(), "codex".to_string(), "local-echo".to_string()],
            role_execution_timeout_seconds: 300,
            memory_bootstrap_enabled: false,
            memory_bootstrap_limit: 100,
            arcade_db: ArcadeDbOptions::default(),
            role_model_mapping: std::collections::BTreeMap::new(),
            api_provider_order: vec!["provider-a".to_string(), "provider-b".to_string()],
            auto_submit_demo_task: false,
            demo_task_title: "demo task".to_string(),
            demo_task_description: "exercise the pipeline end to end".to_string(),
            workspace_path: "./workspace".to_string(),
            max_retries: 2,
            heartbeat_seconds: 5,
        }
    }
}

impl RuntimeOptions {
    /// Clamp every bounded field to its documented range. Called once
    /// after resolving precedence, so downstream code can assume the
    /// invariants hold without re-checking.
    pub fn normalized(mut self) -> Self {
        self.worker_pool_size = self.worker_pool_size.clamp(1, 16);
        self.reviewer_pool_size = self.reviewer_pool_size.clamp(1, 16);
        self.max_cli_concurrency = self.max_cli_concurrency.clamp(1, 32);
        self.role_execution_timeout_seconds = self.role_execution_timeout_seconds.clamp(5, 900);
        self.heartbeat_seconds = self.heartbeat_seconds.max(5);
        self
    }
}

/// The practically-configurable subset of [`RuntimeOptions`] a caller
/// resolves from CLI flags / env / file before overlaying onto
/// defaults; not every field is worth exposing as a flag. Unset fields
/// keep the default.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptionsOverrides {
    pub worker_pool_size: Option<u32>,
    pub reviewer_pool_size: Option<u32>,
    pub max_cli_concurrency: Option<u32>,
    pub role_execution_timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub heartbeat_seconds: Option<u64>,
    pub workspace_path: Option<String>,
    pub sandbox_mode: Option<String>,
    pub arcade_db_url: Option<String>,
    pub arcade_db_database: Option<String>,
    pub arcade_db_user: Option<String>,
    pub arcade_db_password: Option<String>,
}

impl RuntimeOptions {
    /// Overlay `overrides` onto `self`, then [`normalized`](Self::normalized).
    pub fn with_overrides(mut self, overrides: RuntimeOptionsOverrides) -> Self {
        if let Some(v) = overrides.worker_pool_size {
            self.worker_pool_size = v;
        }
        if let Some(v) = overrides.reviewer_pool_size {
            self.reviewer_pool_size = v;
        }
        if let Some(v) = overrides.max_cli_concurrency {
            self.max_cli_concurrency = v;
        }
        if let Some(v) = overrides.role_execution_timeout_seconds {
            self.role_execution_timeout_seconds = v;
        }
        if let Some(v) = overrides.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = overrides.heartbeat_seconds {
            self.heartbeat_seconds = v;
        }
        if let Some(v) = overrides.workspace_path {
            self.workspace_path = v;
        }
        if let Some(v) = overrides.sandbox_mode {
            self.sandbox_mode = v;
        }
        if let Some(v) = overrides.arcade_db_url {
            self.arcade_db.url = v;
        }
        if let Some(v) = overrides.arcade_db_database {
            self.arcade_db.database = v;
        }
        if let Some(v) = overrides.arcade_db_user {
            self.arcade_db.user = v;
        }
        if let Some(v) = overrides.arcade_db_password {
            self.arcade_db.password = v;
        }
        self.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_overrides_applies_only_set_fields() {
        let opts = RuntimeOptions::default().with_overrides(RuntimeOptionsOverrides {
            worker_pool_size: Some(6),
            arcade_db_url: Some("http://db.internal:2480".to_string()),
            ..Default::default()
        });
        assert_eq!(opts.worker_pool_size, 6);
        assert_eq!(opts.arcade_db.url, "http://db.internal:2480");
        assert_eq!(opts.reviewer_pool_size, RuntimeOptions::default().reviewer_pool_size);
    }

    #[test]
    fn defaults_are_already_in_range() {
        let opts = RuntimeOptions::default().normalized();
        assert_eq!(opts, RuntimeOptions::default());
    }

    #[test]
    fn normalized_clamps_out_of_range_pool_sizes() {
        let mut opts = RuntimeOptions::default();
        opts.worker_pool_size = 99;
        opts.reviewer_pool_size = 0;
        opts.max_cli_concurrency = 0;
        opts.role_execution_timeout_seconds = 1;
        opts.heartbeat_seconds = 1;
        let opts = opts.normalized();
        assert_eq!(opts.worker_pool_size, 16);
        assert_eq!(opts.reviewer_pool_size, 1);
        assert_eq!(opts.max_cli_concurrency, 1);
        assert_eq!(opts.role_execution_timeout_seconds, 5);
        assert_eq!(opts.heartbeat_seconds, 5);
    }
}
