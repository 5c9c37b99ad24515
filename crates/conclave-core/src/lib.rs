//! Core orchestration engine: GOAP planner, task coordinator FSM, role
//! executor, and task registry. The actor mesh and HTTP persistence
//! pipeline that wire these pieces into a running service live in
//! `conclave-actors` and `conclave-store`; this crate has no network or
//! process-tree dependency beyond spawning the role executor's own
//! adapter subprocesses.

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod planner;
pub mod registry;
pub mod role;
pub mod task;
pub mod world;
