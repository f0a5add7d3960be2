//! Completion handles for submitted tasks
//!
//! A [`TaskHandle`] is the caller's side of a one-shot completion slot; the
//! worker side holds a [`Completer`]. Cancellation is advisory: a pending
//! task is skipped when dequeued, a running task is left to finish and its
//! result is discarded.

use crate::core::sync::lock_recovering;
use crate::executor::ExecutorError;
use crate::task::error::TaskError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

type Callback<T> = Box<dyn FnOnce(&Result<T, TaskError>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    /// Outcome decided, callbacks running outside the lock
    Completing,
    Done,
}

struct HandleState<T> {
    phase: Phase,
    cancelled: bool,
    outcome: Option<Result<T, TaskError>>,
    callbacks: Vec<Callback<T>>,
}

struct Shared<T> {
    state: Mutex<HandleState<T>>,
    done: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, HandleState<T>> {
        lock_recovering(&self.state, "task handle")
    }

    /// Fire callbacks without the lock, then publish the outcome
    ///
    /// Callbacks registered while others run are picked up before the
    /// handle turns done, so each fires exactly once.
    fn finish<'a>(&'a self, mut state: MutexGuard<'a, HandleState<T>>, outcome: Result<T, TaskError>) {
        state.phase = Phase::Completing;
        loop {
            let callbacks = std::mem::take(&mut state.callbacks);
            if callbacks.is_empty() {
                break;
            }
            drop(state);
            for callback in callbacks {
                run_callback(callback, &outcome);
            }
            state = self.lock();
        }
        state.phase = Phase::Done;
        state.outcome = Some(outcome);
        drop(state);
        self.done.notify_all();
    }

    fn cancel(&self) -> bool {
        let mut state = self.lock();
        if matches!(state.phase, Phase::Completing | Phase::Done) {
            return false;
        }
        state.cancelled = true;
        self.finish(state, Err(TaskError::Cancelled));
        true
    }
}

fn run_callback<T>(callback: Callback<T>, outcome: &Result<T, TaskError>) {
    if catch_unwind(AssertUnwindSafe(|| callback(outcome))).is_err() {
        log::warn!("Task completion callback panicked");
    }
}

/// Caller-side handle to a submitted task's result
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

/// Worker-side half of a [`TaskHandle`]
pub(crate) struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn pair() -> (TaskHandle<T>, Completer<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(HandleState {
                phase: Phase::Pending,
                cancelled: false,
                outcome: None,
                callbacks: Vec::new(),
            }),
            done: Condvar::new(),
        });
        (
            TaskHandle {
                shared: Arc::clone(&shared),
            },
            Completer { shared },
        )
    }

    /// True once the task finished, failed or was cancelled
    pub fn is_done(&self) -> bool {
        self.shared.lock().phase == Phase::Done
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().cancelled
    }

    /// Request cancellation
    ///
    /// Returns false if the task already completed. A running task is not
    /// interrupted, but its result is discarded and `get` reports
    /// [`TaskError::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Block until the task is done
    pub fn wait(&self) {
        let mut state = self.shared.lock();
        while state.phase != Phase::Done {
            state = self
                .shared
                .done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Block up to `timeout`; returns whether the task is done
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.lock();
        while state.phase != Phase::Done {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return false;
            }
            state = self
                .shared
                .done
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }

    /// Wait for the task and take its result
    pub fn get(self) -> Result<T, ExecutorError> {
        self.wait();
        self.take_outcome()
    }

    /// Wait up to `timeout` for the task and take its result
    pub fn get_timeout(self, timeout: Duration) -> Result<T, ExecutorError> {
        if !self.wait_timeout(timeout) {
            return Err(ExecutorError::Timeout { timeout });
        }
        self.take_outcome()
    }

    fn take_outcome(self) -> Result<T, ExecutorError> {
        let outcome = self
            .shared
            .lock()
            .outcome
            .take()
            .unwrap_or(Err(TaskError::Cancelled));
        outcome.map_err(ExecutorError::from)
    }

    /// Register a callback for the task's outcome
    ///
    /// Runs on the completing thread, or immediately on the caller's thread
    /// when the task is already done. Callbacks run without the handle's
    /// lock held but must not block; the handle reports done only after
    /// they return.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Result<T, TaskError>) + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.phase != Phase::Done {
            state.callbacks.push(Box::new(callback));
            return;
        }
        // only `get` reads the outcome and it needs the handle by value, so
        // lending it out while the callback runs is unobservable
        let outcome = state.outcome.take();
        drop(state);
        if let Some(outcome) = outcome.as_ref() {
            run_callback(Box::new(callback), outcome);
        }
        self.shared.lock().outcome = outcome;
    }
}

impl<T: Send + 'static> TaskHandle<T> {
    /// A detached cancel function that does not keep the task alive
    pub(crate) fn canceller(&self) -> Box<dyn Fn() -> bool + Send + Sync> {
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Box::new(move || weak.upgrade().is_some_and(|shared| shared.cancel()))
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("TaskHandle")
            .field("phase", &state.phase)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

impl<T> Completer<T> {
    /// Mark the task running; false when it was cancelled while pending
    pub(crate) fn begin(&self) -> bool {
        let mut state = self.shared.lock();
        if state.phase != Phase::Pending {
            return false;
        }
        state.phase = Phase::Running;
        true
    }

    pub(crate) fn complete(&self, outcome: Result<T, TaskError>) {
        let state = self.shared.lock();
        if matches!(state.phase, Phase::Completing | Phase::Done) {
            log::trace!("Discarding result of cancelled task");
            return;
        }
        self.shared.finish(state, outcome);
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        // Job dropped before it could complete: queue drained or closed
        self.shared.cancel();
    }
}
