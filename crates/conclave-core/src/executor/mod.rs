//! Role Executor (C3): adapter probe, ordered fallthrough, sandbox
//! wrapping, concurrency gate, per spec §4.3.
//!
//! Adapters are held as an ordered `Vec` of boxed trait objects rather
//! than a name-keyed lookup table, since probe order (not just
//! lookup-by-name) determines which adapter handles a given role.

pub mod adapter;
pub mod normalize;
pub mod sandbox;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use adapter::{Adapter, AdapterOutcome, ExecuteRequest, RoleExecutorError};
use async_trait::async_trait;

/// Clamp helper shared by every config knob with a documented range.
pub fn clamp_u64(value: u64, min: u64, max: u64) -> u64 {
    value.clamp(min, max)
}

/// Bounds concurrent `execute` calls across every role executor
/// instance that shares the same gate, per spec §4.3 "Concurrency
/// gate".
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(max_cli_concurrency: u32) -> Self {
        let clamped = max_cli_concurrency.clamp(1, 32);
        Self {
            semaphore: Arc::new(Semaphore::new(clamped as usize)),
        }
    }
}

/// Resolve the adapter order: `preferred` (when it names a known
/// adapter) is moved to the front of `configured`, deduplicated
/// case-insensitively. If `preferred` is unknown, the configured order
/// is used unchanged.
pub fn resolve_adapter_order(configured: &[String], preferred: Option<&str>) -> Vec<String> {
    let Some(preferred) = preferred else {
        return configured.to_vec();
    };
    let known = configured
        .iter()
        .any(|name| name.eq_ignore_ascii_case(preferred));
    if !known {
        warn!(preferred, "preferred adapter unknown to registry, falling back to configured order");
        return configured.to_vec();
    }
    let mut order = vec![preferred.to_string()];
    for name in configured {
        if !name.eq_ignore_ascii_case(preferred) {
            order.push(name.clone());
        }
    }
    order
}

pub struct RoleExecutor {
    adapters: Vec<Box<dyn Adapter>>,
    gate: ConcurrencyGate,
    role_timeout: Duration,
}

impl RoleExecutor {
    /// `adapters` must list every external adapter followed by the
    /// internal `local-echo` fallback last; this is asserted in debug
    /// builds via [`adapter::LOCAL_ECHO_ID`].
    pub fn new(adapters: Vec<Box<dyn Adapter>>, max_cli_concurrency: u32, role_timeout_secs: u64) -> Self {
        debug_assert!(
            adapters.last().map(|a| a.is_internal()).unwrap_or(false),
            "local-echo must always appear last in the adapter list"
        );
        Self {
            adapters,
            gate: ConcurrencyGate::new(max_cli_concurrency),
            role_timeout: Duration::from_secs(clamp_u64(role_timeout_secs, 5, 900)),
        }
    }

    /// Execute `request` against the first adapter (in resolved order)
    /// that probes successfully, executes without error, and produces
    /// accepted output. Fails with `NoAdapterSucceeded` only once the
    /// entire ordered list -- including `local-echo` -- is exhausted,
    /// which in practice only happens if `local-echo` itself errors.
    pub async fn execute(
        &self,
        request: &ExecuteRequest,
        preferred_adapter: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError> {
        let configured: Vec<String> = self.adapters.iter().map(|a| a.id().to_string()).collect();
        let order = resolve_adapter_order(&configured, preferred_adapter);

        let _permit = self
            .gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RoleExecutorError::Configuration("concurrency gate closed".to_string()))?;

        let mut errors = Vec::new();
        for name in &order {
            let Some(adapter) = self.adapters.iter().find(|a| a.id() == name) else {
                continue;
            };

            if let Err(reason) = adapter.probe(ct).await {
                info!(adapter = adapter.id(), reason = %reason, "adapter probe failed");
                errors.push(format!("{}: {reason}", adapter.id()));
                continue;
            }

            match adapter.execute(request, self.role_timeout, ct).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    info!(adapter = adapter.id(), error = %err, "adapter execution did not succeed");
                    errors.push(format!("{}: {err}", adapter.id()));
                }
            }
        }

        Err(RoleExecutorError::NoAdapterSucceeded(errors.join(" | ")))
    }
}

/// A pool child (or, for single-process tests, the coordinator itself)
/// dispatches a role by calling straight through to a `RoleExecutor`.
/// The actor mesh crate's worker/reviewer pool children hold one of
/// these each, routed to by mailbox address rather than this trait
/// object being handed to the coordinator directly.
#[async_trait]
impl crate::coordinator::RoleDispatcher for RoleExecutor {
    async fn dispatch(
        &self,
        request: &ExecuteRequest,
        preferred_adapter: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<AdapterOutcome, RoleExecutorError> {
        self.execute(request, preferred_adapter, ct).await
    }
}
