// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinator and worker actors implementing the per-token wait/notify protocol.
//!
//! All actors are spawned anonymously. The coordinator is the single owner of the token →
//! waiter registry; workers are one-shot and never reused. Concurrency between actors is
//! achieved purely by message passing, never shared mutable state.
mod coordinator;
mod worker;

pub use coordinator::{Coordinator, ToCoordinator};
pub use worker::{ToWorker, Worker, WorkerReply};
