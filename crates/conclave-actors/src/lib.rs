//! The Actor Mesh (C6): Dispatcher, Worker/Reviewer pools, Supervisor,
//! Monitor, and Blackboard, wired together with bare `tokio::spawn` +
//! `tokio::sync::mpsc` mailboxes per spec §4.6.

pub mod blackboard;
pub mod dispatcher;
pub mod mailbox;
pub mod monitor;
pub mod pool;
pub mod supervisor;

pub use blackboard::BlackboardHandle;
pub use dispatcher::{DispatcherHandle, TaskAssigned};
pub use pool::ActorPool;
pub use supervisor::SupervisorHandle;
