//! Monitor actor (spec §4.6): ticks on a fixed interval, asks the
//! supervisor for a snapshot, and publishes it as a diagnostic event.
//! `tokio::select!` races the tick timer against cancellation so the
//! heartbeat fires on a fixed cadence regardless of mesh activity.

use std::time::Duration;

use conclave_core::coordinator::EventSink;
use conclave_core::task::EventType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::supervisor::SupervisorHandle;

/// There is no per-task scope for a mesh-wide heartbeat; these sentinel
/// ids mark the diagnostic event as system-level rather than belonging
/// to any one task.
const SYSTEM_TASK_ID: &str = "system";
const SYSTEM_RUN_ID: &str = "system";

/// `max(5, heartbeat_seconds)`, per spec §4.6 "`max(5, heartbeatSec)`
/// monitor tick".
pub fn tick_interval(heartbeat_seconds: u64) -> Duration {
    Duration::from_secs(heartbeat_seconds.max(5))
}

/// Run the monitor loop until `ct` is cancelled.
pub async fn run_monitor(supervisor: SupervisorHandle, sink: &dyn EventSink, heartbeat_seconds: u64, ct: CancellationToken) {
    let mut interval = tokio::time::interval(tick_interval(heartbeat_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match supervisor.snapshot().await {
                    Some(snapshot) => {
                        let payload = format!(
                            "{{\"started\":{},\"completed\":{},\"failed\":{},\"escalations\":{}}}",
                            snapshot.started, snapshot.completed, snapshot.failed, snapshot.escalations
                        );
                        sink.emit(SYSTEM_TASK_ID, SYSTEM_RUN_ID, EventType::DiagnosticContext, payload).await;
                    }
                    None => warn!("monitor tick: supervisor snapshot timed out or mailbox closed"),
                }
            }
            _ = ct.cancelled() => {
                debug!("monitor shutting down");
                return;
            }
        }
    }
}
