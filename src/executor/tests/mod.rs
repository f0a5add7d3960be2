//! Test modules for the task executor
//!
//! Organised by functional area. Timing-sensitive tests run serially.

mod backpressure;
mod events;

use crate::executor::api::{ExecutorConfig, TaskExecutor};

/// A started work-queue executor
pub(super) fn running_executor(name: &str, threads: usize, backlog: usize) -> TaskExecutor {
    let config = ExecutorConfig::work_queue(name)
        .with_threads(threads)
        .unwrap()
        .with_backlog(backlog);
    let executor = TaskExecutor::new(config).unwrap();
    executor.start().unwrap();
    executor
}
