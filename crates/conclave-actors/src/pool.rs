//! Worker pool / Reviewer pool (spec §4.6): a fixed number of children,
//! each a `tokio::spawn`ed task owning one mailbox, routed to by
//! smallest-mailbox policy. Each child invokes the Role Executor for one
//! role at a time -- the mailbox recv loop is what gives "one message
//! at a time" cooperative serialization per child.

use std::sync::Arc;

use conclave_core::executor::RoleExecutor;
use conclave_core::executor::adapter::{AdapterOutcome, ExecuteRequest, RoleExecutorError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mailbox::{MailboxAddress, mailbox, smallest_mailbox};

/// Mailbox capacity per pool child. Small on purpose: a deep backlog on
/// one child means the smallest-mailbox policy should already have
/// routed new work elsewhere.
const CHILD_MAILBOX_CAPACITY: usize = 32;

pub struct RoleCommand {
    pub request: ExecuteRequest,
    pub preferred_adapter: Option<String>,
    pub respond_to: oneshot::Sender<Result<AdapterOutcome, RoleExecutorError>>,
}

/// A fixed-size pool of role-executing children, routed by smallest
/// current mailbox depth.
pub struct ActorPool {
    children: Vec<MailboxAddress<RoleCommand>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool has no children")]
    Empty,
    #[error("pool child mailbox closed")]
    ChildGone,
    #[error("pool child dropped the response channel")]
    NoResponse,
}

impl ActorPool {
    /// Spawn `pool_size` (clamped to `[1,16]`) children, each sharing
    /// `executor` and terminating once `ct` is cancelled and its mailbox
    /// has drained.
    pub fn spawn(name: &'static str, pool_size: u32, executor: Arc<RoleExecutor>, ct: CancellationToken) -> Self {
        let size = pool_size.clamp(1, 16) as usize;
        let mut children = Vec::with_capacity(size);
        for index in 0..size {
            let (address, rx) = mailbox(CHILD_MAILBOX_CAPACITY);
            let executor = executor.clone();
            let ct = ct.clone();
            tokio::spawn(run_child(name, index, executor, rx, ct));
            children.push(address);
        }
        Self { children }
    }

    /// Route `command` to the currently least-loaded child and await its
    /// dedicated response.
    pub async fn dispatch(
        &self,
        request: ExecuteRequest,
        preferred_adapter: Option<String>,
    ) -> Result<AdapterOutcome, PoolError> {
        let address = smallest_mailbox(&self.children).ok_or(PoolError::Empty)?;
        let (respond_to, response) = oneshot::channel();
        address
            .send(RoleCommand {
                request,
                preferred_adapter,
                respond_to,
            })
            .await
            .map_err(|_| PoolError::ChildGone)?;
        response
            .await
            .map_err(|_| PoolError::NoResponse)?
            .map_err(|err| {
                warn!(error = %err, "pool child's role execution failed");
                PoolError::ChildGone
            })
    }
}

async fn run_child(
    pool_name: &'static str,
    index: usize,
    executor: Arc<RoleExecutor>,
    mut mailbox_rx: tokio::sync::mpsc::Receiver<RoleCommand>,
    ct: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;
            command = mailbox_rx.recv() => command,
            _ = ct.cancelled() => {
                debug!(pool = pool_name, index, "pool child draining mailbox before shutdown");
                mailbox_rx.close();
                mailbox_rx.recv().await
            }
        };
        let Some(command) = command else {
            debug!(pool = pool_name, index, "pool child mailbox closed, terminating");
            return;
        };

        let outcome = executor
            .execute(&command.request, command.preferred_adapter.as_deref(), &ct)
            .await;
        let _ = command.respond_to.send(outcome);
    }
}
