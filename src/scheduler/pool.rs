//! A fixed set of timers handed out round-robin
//!
//! Lets many executors share a few timer threads instead of one each.

use crate::executor::ExecutorError;
use crate::scheduler::timer::Timer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct TimerPool {
    timers: Vec<Arc<Timer>>,
    next: AtomicUsize,
}

impl TimerPool {
    /// Start `size` timer threads named `{name}-{index}`
    pub fn new(name: &str, size: usize) -> Result<Self, ExecutorError> {
        if size == 0 {
            return Err(ExecutorError::IllegalConfiguration {
                message: "Timer pool size must be greater than zero".to_string(),
            });
        }
        let timers = (0..size)
            .map(|index| Timer::new(format!("{}-{}", name, index)).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            timers,
            next: AtomicUsize::new(0),
        })
    }

    /// The next timer in rotation
    pub fn next_timer(&self) -> Arc<Timer> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.timers.len();
        Arc::clone(&self.timers[index])
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn shutdown(&self) {
        for timer in &self.timers {
            timer.shutdown();
        }
    }
}
