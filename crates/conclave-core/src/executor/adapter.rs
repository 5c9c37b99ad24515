//! Adapter definitions and the two adapter kinds: external CLI adapters
//! spawned through the sandbox wrapper, and the always-available
//! internal `local-echo` fallback.
//!
//! The `Adapter` trait is object-safe via `async_trait`. `CliAdapter`
//! spawns the external process, drains stdout/stderr concurrently, and
//! shuts it down on timeout or cancellation with a graceful
//! SIGTERM-then-wait-then-SIGKILL sequence: the main process alone gets
//! the SIGTERM and three seconds to exit, and only if it is still
//! running after that does the whole process group (placed at spawn
//! time via `setsid`) get SIGKILLed, so the role timeout can still reap
//! anything the adapter process forked.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::normalize::{matched_reject_substring, normalize};
use super::sandbox::{HostCapabilities, SandboxConfig, wrap_command};
use crate::role::Role;

#[derive(Debug, thiserror::Error)]
pub enum RoleExecutorError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("adapter {adapter} unavailable: {reason}")]
    AdapterUnavailable { adapter: String, reason: String },
    #[error("adapter {adapter} rejected: {snippet}")]
    AdapterRejected { adapter: String, snippet: String },
    #[error("adapter {adapter} timed out after {seconds}s")]
    ExecutionTimeout { adapter: String, seconds: u64 },
    #[error("adapter {adapter} exited non-zero: {detail}")]
    NonZeroExit { adapter: String, detail: String },
    #[error("no adapter succeeded: {0}")]
    NoAdapterSucceeded(String),
}

/// Output envelope every adapter returns on success (spec §4.3
/// supplement, used to resolve the reviewer-rejection Open Question).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOutcome {
    pub output: String,
    pub rejected: Option<bool>,
    pub adapter_id: String,
    pub model: Option<String>,
    pub reasoning: Option<String>,
}

/// A role-execution request, already bound to a concrete task.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub task_id: String,
    pub task_title: String,
    pub task_description: String,
    pub role: Role,
    pub prompt: String,
    pub workspace: String,
    pub model: Option<String>,
    pub reasoning: Option<String>,
}

/// Declared shape of an external CLI adapter (spec §4.3 "Adapter
/// definition").
#[derive(Debug, Clone)]
pub struct CliAdapterSpec {
    pub id: String,
    pub probe_command: String,
    pub probe_args: Vec<String>,
    pub execute_command: String,
    pub execute_args: Vec<String>,
    pub reject_output_substrings: Vec<String>,
    pub model_flag: Option<String>,
    pub model_env_var: Option<String>,
    pub reasoning_flag: Option<String>,
    pub reasoning_env_var: Option<String>,
    pub mode_flag: Option<String>,
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The probe-then-execute-then-normalize contract every adapter
/// satisfies, object-safe so [`super::mod::RoleExecutor`] can hold a
/// heterogeneous, ordered `Vec<Box<dyn Adapter>>`.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn id(&self) -> &str;
    fn is_internal(&self) -> bool {
        false
    }
    async fn probe(&self, ct: &CancellationToken) -> Result<(), String>;
    async fn execute(
        &self,
        request: &ExecuteRequest,
        role_timeout: Duration,
        ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError>;
}

fn render_template(template: &str, request: &ExecuteRequest) -> String {
    template
        .replace("{{prompt}}", &request.prompt)
        .replace("{{task_id}}", &request.task_id)
        .replace("{{task_title}}", &request.task_title)
        .replace("{{task_description}}", &request.task_description)
        .replace("{{role}}", &request.role.to_string())
        .replace("{{workspace}}", &request.workspace)
}

/// A spawned external CLI adapter, wrapped through the sandbox.
pub struct CliAdapter {
    spec: CliAdapterSpec,
    sandbox: SandboxConfig,
    caps: Box<dyn HostCapabilities + Send + Sync>,
}

impl CliAdapter {
    pub fn new(
        spec: CliAdapterSpec,
        sandbox: SandboxConfig,
        caps: Box<dyn HostCapabilities + Send + Sync>,
    ) -> Self {
        Self { spec, sandbox, caps }
    }

    fn render_execute_args(&self, request: &ExecuteRequest) -> Vec<String> {
        let mut args = Vec::new();
        for arg in &self.spec.execute_args {
            if arg == "{{args}}" {
                args.extend(render_template(&request.prompt, request).split_whitespace().map(String::from));
            } else {
                args.push(render_template(arg, request));
            }
        }
        if let (Some(flag), Some(model)) = (&self.spec.model_flag, &request.model) {
            args.push(flag.clone());
            args.push(model.clone());
        }
        if let (Some(flag), Some(reasoning)) = (&self.spec.reasoning_flag, &request.reasoning) {
            args.push(flag.clone());
            args.push(reasoning.clone());
        }
        if let Some(mode_flag) = &self.spec.mode_flag {
            args.push(mode_flag.clone());
            args.push(request.role.mode().to_string());
        }
        args
    }

    fn env_overrides(&self, request: &ExecuteRequest) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let (Some(var), Some(model)) = (&self.spec.model_env_var, &request.model) {
            env.insert(var.clone(), model.clone());
        }
        if let (Some(var), Some(reasoning)) = (&self.spec.reasoning_env_var, &request.reasoning) {
            env.insert(var.clone(), reasoning.clone());
        }
        env
    }
}

#[async_trait]
impl Adapter for CliAdapter {
    fn id(&self) -> &str {
        &self.spec.id
    }

    async fn probe(&self, _ct: &CancellationToken) -> Result<(), String> {
        let wrapped = wrap_command(
            &self.sandbox,
            self.caps.as_ref(),
            &self.spec.probe_command,
            &self.spec.probe_args,
        );
        let mut cmd = Command::new(&wrapped.program);
        cmd.args(&wrapped.args).stdout(Stdio::null()).stderr(Stdio::null());

        let spawn = cmd.spawn().map_err(|e| format!("failed to start probe: {e}"))?;
        match timeout(PROBE_TIMEOUT, spawn.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(format!("probe exited with {:?}", output.status.code())),
            Ok(Err(e)) => Err(format!("probe I/O error: {e}")),
            Err(_) => Err("probe timed out after 10s".to_string()),
        }
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        role_timeout: Duration,
        ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError> {
        let rendered_args = self.render_execute_args(request);
        let wrapped = wrap_command(&self.sandbox, self.caps.as_ref(), &self.spec.execute_command, &rendered_args);

        let mut cmd = Command::new(&wrapped.program);
        cmd.args(&wrapped.args)
            .current_dir(&request.workspace)
            .envs(self.env_overrides(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Put the child in its own process group so a timeout kill
            // can reach anything it forked, not only the direct child.
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn().map_err(|e| RoleExecutorError::AdapterUnavailable {
            adapter: self.spec.id.clone(),
            reason: format!("failed to spawn: {e}"),
        })?;
        let pid = child.id();

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let stdout_task = tokio::spawn(drain(stdout));
        let stderr_task = tokio::spawn(drain(stderr));

        let wait_result = tokio::select! {
            result = timeout(role_timeout, child.wait()) => result,
            _ = ct.cancelled() => {
                kill_gracefully(&mut child, pid).await;
                return Err(RoleExecutorError::ExecutionTimeout {
                    adapter: self.spec.id.clone(),
                    seconds: role_timeout.as_secs(),
                });
            }
        };

        let status = match wait_result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(RoleExecutorError::AdapterUnavailable {
                    adapter: self.spec.id.clone(),
                    reason: format!("wait failed: {e}"),
                });
            }
            Err(_) => {
                kill_gracefully(&mut child, pid).await;
                return Err(RoleExecutorError::ExecutionTimeout {
                    adapter: self.spec.id.clone(),
                    seconds: role_timeout.as_secs(),
                });
            }
        };

        let stdout_text = stdout_task.await.unwrap_or_default();
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let detail = if stderr_text.trim().is_empty() {
                format!("exit code {}", status.code().unwrap_or(-1))
            } else {
                stderr_text.trim().to_string()
            };
            return Err(RoleExecutorError::NonZeroExit {
                adapter: self.spec.id.clone(),
                detail,
            });
        }

        let normalized = normalize(&stdout_text);
        if normalized.is_empty() {
            return Err(RoleExecutorError::AdapterUnavailable {
                adapter: self.spec.id.clone(),
                reason: "empty output".to_string(),
            });
        }
        if let Some(snippet) = matched_reject_substring(&normalized, &self.spec.reject_output_substrings) {
            return Err(RoleExecutorError::AdapterRejected {
                adapter: self.spec.id.clone(),
                snippet,
            });
        }

        Ok(AdapterOutcome {
            output: normalized,
            rejected: None,
            adapter_id: self.spec.id.clone(),
            model: request.model.clone(),
            reasoning: request.reasoning.clone(),
        })
    }
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(reader: R) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(unix)]
async fn kill_gracefully(child: &mut tokio::process::Child, pid: Option<u32>) {
    let Some(pid) = pid else { return };
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
    if timeout(Duration::from_secs(3), child.wait()).await.is_ok() {
        debug!(pid, "process exited after graceful SIGTERM");
        return;
    }
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
    debug!(pid, "main process still running after grace period, sent process-group SIGKILL");
}

#[cfg(not(unix))]
async fn kill_gracefully(_child: &mut tokio::process::Child, _pid: Option<u32>) {
    warn!("graceful process-group kill is unix-only; relying on handle drop");
}

/// The always-available internal fallback: deterministic synthesized
/// output per role, no process spawned. Must appear last in the
/// configured adapter order.
pub struct LocalEchoAdapter;

pub const LOCAL_ECHO_ID: &str = "local-echo";

#[async_trait]
impl Adapter for LocalEchoAdapter {
    fn id(&self) -> &str {
        LOCAL_ECHO_ID
    }

    fn is_internal(&self) -> bool {
        true
    }

    async fn probe(&self, _ct: &CancellationToken) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        _role_timeout: Duration,
        _ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError> {
        let output = match request.role {
            Role::Planner => format!("plan: break down '{}' into buildable steps", request.task_title),
            Role::Builder => format!("build: implemented changes for '{}'", request.task_title),
            Role::Reviewer => format!("review: '{}' looks correct, approved", request.task_title),
            Role::Orchestrator => format!("orchestration note for '{}'", request.task_title),
            Role::Researcher => format!("research summary for '{}'", request.task_title),
            Role::Debugger => format!("debug notes for '{}'", request.task_title),
            Role::Tester => format!("test results for '{}'", request.task_title),
        };
        Ok(AdapterOutcome {
            output,
            rejected: Some(false),
            adapter_id: LOCAL_ECHO_ID.to_string(),
            model: None,
            reasoning: None,
        })
    }
}
