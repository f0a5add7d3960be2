//! Task Executor
//!
//! A fixed pool of worker threads fed by a [`BoundedQueue`](crate::queue::BoundedQueue).
//! Producers block (per the configured wait strategy) when the queue is
//! full, which is how backpressure reaches callers.
//!
//! ```text
//!   submit/execute ──> BoundedQueue<Job> ──> worker-0 ─┐
//!        ^                 (backlog)     ──> worker-1 ─┼─> TaskHandle / error handler
//!        │                               ──> worker-N ─┘
//!   DelayScheduler (timer thread) ─ dispatch ─┘
//! ```
//!
//! Two kinds are offered: `RingBuffer` (exactly one worker, FIFO execution)
//! and `WorkQueue` (N workers competing for tasks).

pub mod api;
mod config;
mod engine;
mod error;
mod invoke;
mod worker;

pub use config::{ExecutorConfig, ExecutorKind, ShutdownMode, DEFAULT_BACKLOG};
pub use engine::{ExecutorState, TaskExecutor, TaskExecutorBuilder};
pub use error::ExecutorError;

use crate::queue::QueueStats;

/// Point-in-time view of an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    pub name: String,
    pub state: ExecutorState,
    pub threads: usize,
    pub queue: QueueStats,
    /// Jobs that ran without reporting a failure
    pub completed: u64,
    /// Failures passed to the error handler
    pub failed: u64,
}

#[cfg(test)]
mod tests;
