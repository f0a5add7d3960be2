//! Handles returned by the delay scheduler

use crate::core::sync::lock_recovering;
use crate::executor::ExecutorError;
use crate::scheduler::timer::TimerRegistration;
use crate::task::{TaskError, TaskHandle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// When a scheduled task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    OneShot,
    /// Starts anchored on the previous intended start; runs may overlap
    FixedRate(Duration),
    /// Next run starts this long after the previous one finished
    FixedDelay(Duration),
}

/// Handle to a delayed one-shot task
#[derive(Debug)]
pub struct ScheduledHandle<T> {
    handle: TaskHandle<T>,
    registration: TimerRegistration,
}

impl<T> ScheduledHandle<T> {
    pub(crate) fn new(handle: TaskHandle<T>, registration: TimerRegistration) -> Self {
        Self {
            handle,
            registration,
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        ScheduleMode::OneShot
    }

    /// Cancel before the fire time, or skip the task if it is still queued
    ///
    /// Has no effect once the task completed.
    pub fn cancel(&self) -> bool {
        let before_fire = self.registration.cancel();
        let before_run = self.handle.cancel();
        before_fire || before_run
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// True once the delay elapsed and the task was handed to the executor
    pub fn has_fired(&self) -> bool {
        self.registration.has_fired()
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.handle.wait_timeout(timeout)
    }

    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Result<T, TaskError>) + Send + 'static,
    {
        self.handle.on_complete(callback)
    }

    pub fn get(self) -> Result<T, ExecutorError> {
        self.handle.get()
    }

    pub fn get_timeout(self, timeout: Duration) -> Result<T, ExecutorError> {
        self.handle.get_timeout(timeout)
    }

    pub fn into_task_handle(self) -> TaskHandle<T> {
        self.handle
    }
}

#[derive(Debug)]
pub(crate) struct ScheduleState {
    pub(crate) id: u64,
    pub(crate) mode: ScheduleMode,
    cancelled: AtomicBool,
    fire_count: AtomicU64,
    registration: Mutex<Option<TimerRegistration>>,
}

impl ScheduleState {
    pub(crate) fn new(id: u64, mode: ScheduleMode) -> Self {
        Self {
            id,
            mode,
            cancelled: AtomicBool::new(false),
            fire_count: AtomicU64::new(0),
            registration: Mutex::new(None),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns false if already cancelled
    pub(crate) fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let registration = lock_recovering(&self.registration, "schedule").take();
        if let Some(registration) = registration {
            registration.cancel();
        }
        true
    }

    pub(crate) fn set_registration(&self, registration: TimerRegistration) {
        let mut slot = lock_recovering(&self.registration, "schedule");
        // cancel() may have run between arming and storing
        if self.is_cancelled() {
            registration.cancel();
        } else {
            *slot = Some(registration);
        }
    }

    pub(crate) fn record_fire(&self) {
        self.fire_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }
}

/// Handle to a repeating schedule
///
/// Dropping the handle leaves the schedule running.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    state: Arc<ScheduleState>,
}

impl ScheduleHandle {
    pub(crate) fn new(state: Arc<ScheduleState>) -> Self {
        Self { state }
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Stop future runs; a run already handed to the executor still completes
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// True when cancelled by the caller, a task failure or executor shutdown
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// How many times the task has started
    pub fn fire_count(&self) -> u64 {
        self.state.fire_count()
    }

    pub fn mode(&self) -> ScheduleMode {
        self.state.mode
    }
}
