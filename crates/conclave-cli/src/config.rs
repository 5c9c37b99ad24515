//! Configuration file management, per spec §2 "Configuration": a
//! TOML-based config file and a CLI-flag > config-file > environment >
//! compiled-default resolution chain.

use std::path::PathBuf;

use anyhow::{Context, Result};
use conclave_core::config::{RuntimeOptions, RuntimeOptionsOverrides};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub pools: PoolsSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub arcade_db: ArcadeDbSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PoolsSection {
    pub worker_pool_size: Option<u32>,
    pub reviewer_pool_size: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExecutionSection {
    pub max_cli_concurrency: Option<u32>,
    pub role_execution_timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub heartbeat_seconds: Option<u64>,
    pub workspace_path: Option<String>,
    pub sandbox_mode: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ArcadeDbSection {
    pub url: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Always uses XDG layout: `$XDG_CONFIG_HOME/conclave` or
/// `~/.config/conclave`. We intentionally ignore the platform-specific
/// `dirs::config_dir()` (which returns `~/Library/Application Support`
/// on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("conclave");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config").join("conclave")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load and parse the config file. Returns `Ok(None)` (not an error) if
/// it does not exist, since the file layer is optional in the
/// precedence chain.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let parsed: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
            Ok(Some(parsed))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read config file at {}", path.display())),
    }
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create config directory {}", dir.display()))?;
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(config_path(), contents).context("failed to write config file")?;
    Ok(())
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// CLI overrides a caller may have parsed from flags; every field is
/// optional since not every subcommand exposes every flag.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub worker_pool_size: Option<u32>,
    pub reviewer_pool_size: Option<u32>,
    pub arcade_db_url: Option<String>,
}

/// Resolve a [`RuntimeOptions`] using the chain: CLI flag > config file >
/// environment > compiled default, per spec §2.
pub fn resolve(cli: CliOverrides) -> Result<RuntimeOptions> {
    let file = load_config()?;

    let worker_pool_size = cli
        .worker_pool_size
        .or_else(|| file.as_ref().and_then(|f| f.pools.worker_pool_size))
        .or_else(|| env_u32("CONCLAVE_WORKER_POOL_SIZE"));
    let reviewer_pool_size = cli
        .reviewer_pool_size
        .or_else(|| file.as_ref().and_then(|f| f.pools.reviewer_pool_size))
        .or_else(|| env_u32("CONCLAVE_REVIEWER_POOL_SIZE"));
    let max_cli_concurrency = file
        .as_ref()
        .and_then(|f| f.execution.max_cli_concurrency)
        .or_else(|| env_u32("CONCLAVE_MAX_CLI_CONCURRENCY"));
    let role_execution_timeout_seconds = file
        .as_ref()
        .and_then(|f| f.execution.role_execution_timeout_seconds)
        .or_else(|| env_u64("CONCLAVE_ROLE_TIMEOUT_SECONDS"));
    let max_retries = file
        .as_ref()
        .and_then(|f| f.execution.max_retries)
        .or_else(|| env_u32("CONCLAVE_MAX_RETRIES"));
    let heartbeat_seconds = file
        .as_ref()
        .and_then(|f| f.execution.heartbeat_seconds)
        .or_else(|| env_u64("CONCLAVE_HEARTBEAT_SECONDS"));
    let workspace_path = file
        .as_ref()
        .and_then(|f| f.execution.workspace_path.clone())
        .or_else(|| std::env::var("CONCLAVE_WORKSPACE_PATH").ok());
    let sandbox_mode = file
        .as_ref()
        .and_then(|f| f.execution.sandbox_mode.clone())
        .or_else(|| std::env::var("CONCLAVE_SANDBOX_MODE").ok());
    let arcade_db_url = cli
        .arcade_db_url
        .or_else(|| file.as_ref().and_then(|f| f.arcade_db.url.clone()))
        .or_else(|| std::env::var("CONCLAVE_ARCADE_DB_URL").ok());
    let arcade_db_database = file
        .as_ref()
        .and_then(|f| f.arcade_db.database.clone())
        .or_else(|| std::env::var("CONCLAVE_ARCADE_DB_DATABASE").ok());
    let arcade_db_user = file
        .as_ref()
        .and_then(|f| f.arcade_db.user.clone())
        .or_else(|| std::env::var("CONCLAVE_ARCADE_DB_USER").ok());
    let arcade_db_password = file
        .as_ref()
        .and_then(|f| f.arcade_db.password.clone())
        .or_else(|| std::env::var("CONCLAVE_ARCADE_DB_PASSWORD").ok());

    Ok(RuntimeOptions::default().with_overrides(RuntimeOptionsOverrides {
        worker_pool_size,
        reviewer_pool_size,
        max_cli_concurrency,
        role_execution_timeout_seconds,
        max_retries,
        heartbeat_seconds,
        workspace_path,
        sandbox_mode,
        arcade_db_url,
        arcade_db_database,
        arcade_db_user,
        arcade_db_password,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn resolve_with_cli_flag_overrides_env_and_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var("CONCLAVE_WORKER_POOL_SIZE", "9") };
        unsafe { std::env::set_var("XDG_CONFIG_HOME", "/nonexistent-conclave-config-dir") };

        let opts = resolve(CliOverrides { worker_pool_size: Some(3), ..Default::default() }).unwrap();
        assert_eq!(opts.worker_pool_size, 3);

        unsafe { std::env::remove_var("CONCLAVE_WORKER_POOL_SIZE") };
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn resolve_falls_back_to_env_then_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", "/nonexistent-conclave-config-dir") };
        unsafe { std::env::set_var("CONCLAVE_REVIEWER_POOL_SIZE", "5") };

        let opts = resolve(CliOverrides::default()).unwrap();
        assert_eq!(opts.reviewer_pool_size, 5);

        unsafe { std::env::remove_var("CONCLAVE_REVIEWER_POOL_SIZE") };
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn resolve_defaults_when_nothing_is_set() {
        let _lock = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", "/nonexistent-conclave-config-dir") };
        unsafe { std::env::remove_var("CONCLAVE_WORKER_POOL_SIZE") };
        unsafe { std::env::remove_var("CONCLAVE_REVIEWER_POOL_SIZE") };

        let opts = resolve(CliOverrides::default()).unwrap();
        assert_eq!(opts, RuntimeOptions::default());

        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        assert!(config_path().ends_with("conclave/config.toml"));
    }
}
