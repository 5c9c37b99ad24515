//! Persistence pipeline (C5): the HTTP document-store wire client,
//! idempotent schema bootstrap, snapshot/event stores, and per-key
//! sequence allocation.

pub mod client;
pub mod event_store;
pub mod pipeline;
pub mod schema;
pub mod sequence;
pub mod sink;
pub mod snapshot_store;

pub use client::DocumentStoreClient;
pub use event_store::EventStore;
pub use pipeline::spawn_persistence_drain;
pub use sink::StoreEventSink;
pub use snapshot_store::SnapshotStore;
