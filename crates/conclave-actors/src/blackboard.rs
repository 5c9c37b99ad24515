//! Blackboard actor (spec §4.6): a shared write-only key/value bulletin
//! for stigmergy signals. Not on the critical path -- nothing in the
//! coordinator or pools ever reads it before deciding whether to make
//! progress; it exists purely as an out-of-band observability surface.
//!
//! Grounded on the confined-mutable-counters guidance in spec.md §9
//! (`DashMap` over `static mut`), the same discipline
//! `conclave_core::registry::TaskRegistry` and the sequence allocator
//! already follow.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

pub enum BlackboardMsg {
    Put { key: String, value: String },
}

#[derive(Clone)]
pub struct BlackboardHandle {
    tx: mpsc::Sender<BlackboardMsg>,
    /// Shared with the actor task so reads never have to round-trip
    /// through the mailbox -- writes are the only thing serialized.
    entries: Arc<DashMap<String, String>>,
}

impl BlackboardHandle {
    pub fn spawn() -> Self {
        let entries = Arc::new(DashMap::new());
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run(rx, entries.clone()));
        Self { tx, entries }
    }

    /// Fire-and-forget: the caller never waits on a write landing.
    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.tx.send(BlackboardMsg::Put { key: key.into(), value: value.into() }).await;
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|r| r.value().clone())
    }
}

async fn run(mut rx: mpsc::Receiver<BlackboardMsg>, entries: Arc<DashMap<String, String>>) {
    while let Some(BlackboardMsg::Put { key, value }) = rx.recv().await {
        entries.insert(key, value);
    }
    debug!("blackboard mailbox closed, terminating");
}
