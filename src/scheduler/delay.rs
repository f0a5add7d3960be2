//! Delayed and periodic task submission
//!
//! The timer thread only decides *when*; at fire time work is handed to a
//! [`TaskDispatcher`] and runs on its workers. A scheduled task therefore
//! starts no earlier than its fire time, and later under load.
//!
//! Fixed-rate schedules re-arm on the timer thread before dispatching, so a
//! slow run does not delay the next one and runs may overlap on a
//! multi-threaded executor. Fixed-delay schedules re-arm from the worker after
//! the run completes and never overlap. Any failure ends the schedule.

use crate::core::sync::lock_recovering;
use crate::executor::ExecutorError;
use crate::scheduler::handle::{ScheduleHandle, ScheduleMode, ScheduleState, ScheduledHandle};
use crate::scheduler::timer::{Timer, TimerRegistration};
use crate::task::{completing_job, IntoTaskResult, Job, TaskDispatcher, TaskError};
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

type PeriodicFn = Box<dyn Fn() -> Result<(), TaskError> + Send + Sync + 'static>;

enum Tracked {
    Once {
        registration: TimerRegistration,
        cancel_task: Box<dyn Fn() -> bool + Send + Sync>,
    },
    Periodic(Weak<ScheduleState>),
}

impl Tracked {
    fn is_live(&self) -> bool {
        match self {
            Tracked::Once { registration, .. } => registration.is_pending(),
            Tracked::Periodic(state) => state.upgrade().is_some_and(|s| !s.is_cancelled()),
        }
    }

    fn cancel(self) -> bool {
        match self {
            Tracked::Once {
                registration,
                cancel_task,
            } => registration.cancel() && cancel_task(),
            Tracked::Periodic(state) => state.upgrade().is_some_and(|s| s.cancel()),
        }
    }
}

/// Schedules tasks onto a dispatcher using a shared timer
pub struct DelayScheduler {
    timer: Arc<Timer>,
    dispatcher: Weak<dyn TaskDispatcher>,
    tracked: Mutex<Vec<Tracked>>,
    next_id: AtomicU64,
}

impl DelayScheduler {
    pub fn new(timer: Arc<Timer>, dispatcher: Weak<dyn TaskDispatcher>) -> Self {
        Self {
            timer,
            dispatcher,
            tracked: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }

    fn track(&self, entry: Tracked) {
        let mut tracked = lock_recovering(&self.tracked, "scheduler registry");
        tracked.retain(Tracked::is_live);
        tracked.push(entry);
    }

    /// Schedules that can still fire
    pub fn active_schedules(&self) -> usize {
        lock_recovering(&self.tracked, "scheduler registry")
            .iter()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// Run `task` once after `delay`
    pub fn schedule_once<F, T>(&self, task: F, delay: Duration) -> Result<ScheduledHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = completing_job(move || Ok::<T, Infallible>(task()));
        let dispatcher = self.dispatcher.clone();

        let registration = self.timer.submit(delay, move || match dispatcher.upgrade() {
            Some(dispatcher) => {
                if let Err(e) = dispatcher.dispatch(job) {
                    log::debug!("Delayed task not dispatched to '{}': {}", dispatcher.name(), e);
                }
            }
            None => log::debug!("Delayed task dropped: executor no longer exists"),
        })?;

        self.track(Tracked::Once {
            registration: registration.clone(),
            cancel_task: handle.canceller(),
        });
        Ok(ScheduledHandle::new(handle, registration))
    }

    /// Run `task` at `initial_delay`, then every `period` measured from the
    /// previous intended start
    ///
    /// Runs are not serialized: if a run outlasts `period`, the next one
    /// still starts on time and both execute concurrently.
    pub fn schedule_at_fixed_rate<F, R>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduleHandle, ExecutorError>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.schedule_periodic(task, initial_delay, ScheduleMode::FixedRate(period), period)
    }

    /// Run `task` at `initial_delay`, then `delay` after each run completes
    pub fn schedule_with_fixed_delay<F, R>(
        &self,
        task: F,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduleHandle, ExecutorError>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        self.schedule_periodic(task, initial_delay, ScheduleMode::FixedDelay(delay), delay)
    }

    fn schedule_periodic<F, R>(
        &self,
        task: F,
        initial_delay: Duration,
        mode: ScheduleMode,
        interval: Duration,
    ) -> Result<ScheduleHandle, ExecutorError>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoTaskResult,
    {
        if interval.is_zero() {
            return Err(ExecutorError::IllegalConfiguration {
                message: format!("{:?} requires a non-zero interval", mode),
            });
        }
        let first_fire = Instant::now().checked_add(initial_delay).ok_or_else(|| {
            ExecutorError::IllegalConfiguration {
                message: format!("Initial delay {:?} is out of range", initial_delay),
            }
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ScheduleState::new(id, mode));
        let periodic = Arc::new(Periodic {
            state: Arc::clone(&state),
            task: Box::new(move || task().into_task_result().map(|_| ())),
            timer: Arc::downgrade(&self.timer),
            dispatcher: self.dispatcher.clone(),
            interval,
        });

        // Arm before tracking so a failed first arm surfaces to the caller
        let registration = self.timer.submit(initial_delay, {
            let periodic = Arc::clone(&periodic);
            move || periodic.fire(first_fire)
        })?;
        state.set_registration(registration);

        self.track(Tracked::Periodic(Arc::downgrade(&state)));
        log::debug!("Schedule {} armed: {:?}", id, mode);
        Ok(ScheduleHandle::new(state))
    }

    /// Cancel every pending one-shot and periodic schedule
    ///
    /// One-shot tasks that already fired are left to run.
    pub fn cancel_all(&self) -> usize {
        let tracked = std::mem::take(&mut *lock_recovering(&self.tracked, "scheduler registry"));
        let cancelled = tracked
            .into_iter()
            .map(Tracked::cancel)
            .filter(|cancelled| *cancelled)
            .count();
        if cancelled > 0 {
            log::debug!("Cancelled {} pending schedules", cancelled);
        }
        cancelled
    }
}

impl std::fmt::Debug for DelayScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayScheduler")
            .field("timer", &self.timer.name())
            .field("active_schedules", &self.active_schedules())
            .finish()
    }
}

struct Periodic {
    state: Arc<ScheduleState>,
    task: PeriodicFn,
    timer: Weak<Timer>,
    dispatcher: Weak<dyn TaskDispatcher>,
    interval: Duration,
}

impl Periodic {
    fn arm(self: &Arc<Self>, fire_at: Instant) {
        if self.state.is_cancelled() {
            return;
        }
        let Some(timer) = self.timer.upgrade() else {
            self.end("timer no longer exists");
            return;
        };
        let delay = fire_at.saturating_duration_since(Instant::now());
        let periodic = Arc::clone(self);
        match timer.submit(delay, move || periodic.fire(fire_at)) {
            Ok(registration) => self.state.set_registration(registration),
            Err(e) => self.end(&e.to_string()),
        }
    }

    /// Timer callback: hand one run to the dispatcher
    fn fire(self: Arc<Self>, fire_at: Instant) {
        if self.state.is_cancelled() {
            return;
        }
        let Some(dispatcher) = self.dispatcher.upgrade() else {
            self.end("executor no longer exists");
            return;
        };

        if let ScheduleMode::FixedRate(period) = self.state.mode {
            match fire_at.checked_add(period) {
                Some(next) => self.arm(next),
                None => self.end("next fire time out of range"),
            }
        }

        if let Err(e) = dispatcher.dispatch(self.run_job()) {
            self.end(&format!("dispatch rejected: {}", e));
        }
    }

    fn run_job(self: &Arc<Self>) -> Job {
        let periodic = Arc::clone(self);
        Box::new(move || {
            periodic.state.record_fire();
            let outcome = catch_unwind(AssertUnwindSafe(|| (periodic.task)()))
                .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));

            match outcome {
                Ok(()) => {
                    if let ScheduleMode::FixedDelay(delay) = periodic.state.mode {
                        match Instant::now().checked_add(delay) {
                            Some(next) => periodic.arm(next),
                            None => periodic.end("next fire time out of range"),
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    periodic.end(&format!("task failed: {}", e));
                    Err(e)
                }
            }
        })
    }

    fn end(&self, reason: &str) {
        if !self.state.cancel() {
            return;
        }
        log::debug!("Schedule {} ended: {}", self.state.id, reason);
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.schedule_cancelled(self.state.id, reason);
        }
    }
}
