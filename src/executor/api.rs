//! Public API for the executor
//!
//! External modules should import from here rather than from the
//! implementation modules.

pub use crate::executor::config::{ExecutorConfig, ExecutorKind, ShutdownMode, DEFAULT_BACKLOG};
pub use crate::executor::engine::{ExecutorState, TaskExecutor, TaskExecutorBuilder};
pub use crate::executor::error::ExecutorError;
pub use crate::executor::ExecutorStats;

pub use crate::scheduler::{ScheduleHandle, ScheduleMode, ScheduledHandle};
pub use crate::task::{TaskError, TaskHandle};
