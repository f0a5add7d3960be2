//! Timers and the delay scheduler
//!
//! - [`Timer`]: one thread, one deadline heap
//! - [`TimerPool`]: timers shared round-robin between executors
//! - [`DelayScheduler`]: one-shot, fixed-rate and fixed-delay scheduling
//!   onto a [`TaskDispatcher`](crate::task::TaskDispatcher)

mod delay;
mod handle;
mod pool;
mod timer;

pub use delay::DelayScheduler;
pub use handle::{ScheduleHandle, ScheduleMode, ScheduledHandle};
pub use pool::TimerPool;
pub use timer::{Timer, TimerRegistration};
