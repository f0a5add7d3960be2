//! The task executor: a bounded queue, a worker pool and a delay scheduler
//!
//! State machine:
//!
//! ```text
//! Stopped --start--> Running --stop--> Draining --last worker exits--> Stopped
//! ```
//!
//! Transitions are serialized; `start` and `stop` are no-ops in the wrong
//! state. The lifecycle lock is never held while waiting for workers, so a
//! task may stop its own executor while another thread is stopping it too.
//! Restarting after a stop builds a fresh queue.

use crate::core::lifecycle::{Lifecycle, StopCallback};
use crate::core::sync::{handle_mutex_poison, lock_recovering};
use crate::events::{EventPublisher, ExecutorEvent, ExecutorEventType, PublishingErrorHandler};
use crate::executor::config::{ExecutorConfig, ShutdownMode};
use crate::executor::error::ExecutorError;
use crate::executor::worker::{spawn_worker, Termination, WorkerContext, WorkerCounters};
use crate::executor::ExecutorStats;
use crate::queue::{BoundedQueue, QueueError};
use crate::scheduler::{DelayScheduler, ScheduleHandle, ScheduledHandle, Timer};
use crate::task::{
    completing_job, detached_job, IntoTaskResult, Job, LoggingErrorHandler, TaskDispatcher,
    TaskErrorHandler, TaskHandle,
};
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecutorState {
    Stopped = 0,
    Running = 1,
    Draining = 2,
}

impl ExecutorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExecutorState::Running,
            2 => ExecutorState::Draining,
            _ => ExecutorState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Submit {
    Blocking,
    Immediate,
    Timeout(Duration),
}

pub(crate) struct ExecutorInner {
    config: ExecutorConfig,
    threads: usize,
    state: AtomicU8,
    queue: RwLock<Arc<BoundedQueue<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    termination: Mutex<Arc<Termination>>,
    transition: Mutex<()>,
    discarded: AtomicUsize,
    on_stopped: Mutex<Vec<StopCallback>>,
    context: WorkerContext,
    events: Option<Arc<dyn EventPublisher>>,
}

/// A stop in progress: what to wait for
struct Stopping {
    discarded: usize,
    termination: Arc<Termination>,
}

fn queue_poisoned(message: String) -> ExecutorError {
    ExecutorError::Queue(QueueError::OperationFailed { message })
}

impl ExecutorInner {
    fn state(&self) -> ExecutorState {
        ExecutorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: ExecutorState, to: ExecutorState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn queue(&self) -> Result<Arc<BoundedQueue<Job>>, ExecutorError> {
        let queue = handle_mutex_poison(self.queue.read(), queue_poisoned)?;
        Ok(Arc::clone(&queue))
    }

    /// The current queue, replaced first if a previous stop closed it
    fn open_queue(&self) -> Result<Arc<BoundedQueue<Job>>, ExecutorError> {
        let mut slot = handle_mutex_poison(self.queue.write(), queue_poisoned)?;
        if slot.is_closed() {
            *slot = Arc::new(BoundedQueue::new(self.config.queue_config())?);
        }
        Ok(Arc::clone(&slot))
    }

    fn ensure_running(&self) -> Result<(), ExecutorError> {
        match self.state() {
            ExecutorState::Running => Ok(()),
            ExecutorState::Draining => Err(QueueError::Closed.into()),
            ExecutorState::Stopped => Err(ExecutorError::NotRunning {
                name: self.config.name.clone(),
            }),
        }
    }

    fn enqueue(&self, job: Job, submit: Submit) -> Result<(), ExecutorError> {
        self.ensure_running()?;
        let queue = self.queue()?;
        let sequence = match submit {
            Submit::Blocking => queue.enqueue(job)?,
            Submit::Immediate => queue.try_enqueue(job)?,
            Submit::Timeout(timeout) => queue.enqueue_timeout(job, timeout)?,
        };
        log::trace!("Task {} queued on '{}'", sequence, self.config.name);
        Ok(())
    }

    fn publish(&self, event: ExecutorEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.publish(event) {
                log::debug!("Executor '{}' event not published: {}", self.config.name, e);
            }
        }
    }

    fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        lock_recovering(&self.workers, "executor workers")
            .iter()
            .any(|worker| worker.thread().id() == current)
    }

    /// Draining -> Stopped for the run tracked by `run`
    ///
    /// Called by whoever sees the pool empty first: the last worker out or a
    /// waiting stopper. Only one call per run gets past the transition.
    fn complete_stop(&self, run: &Termination) {
        if self.state() != ExecutorState::Draining {
            return;
        }
        let (workers, callbacks) = {
            let _transition = lock_recovering(&self.transition, "executor lifecycle");
            let current = Arc::clone(&*lock_recovering(&self.termination, "executor termination"));
            if !std::ptr::eq(Arc::as_ptr(&current), run)
                || !self.transition(ExecutorState::Draining, ExecutorState::Stopped)
            {
                return;
            }
            (
                std::mem::take(&mut *lock_recovering(&self.workers, "executor workers")),
                std::mem::take(&mut *lock_recovering(&self.on_stopped, "stop callbacks")),
            )
        };
        join_workers(&self.config.name, workers);

        let discarded = self.discarded.load(Ordering::Acquire);
        log::debug!(
            "Executor '{}' stopped ({} queued tasks discarded)",
            self.config.name,
            discarded
        );
        self.publish(ExecutorEvent::with_message(
            ExecutorEventType::Stopped,
            self.config.name.clone(),
            format!("{} queued tasks discarded", discarded),
        ));
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                log::warn!("Stop callback of '{}' panicked", self.config.name);
            }
        }
        run.mark_finished();
    }

    /// Spawn the worker pool; on failure, tear down whatever started
    fn spawn_workers(
        &self,
        queue: &Arc<BoundedQueue<Job>>,
        termination: &Arc<Termination>,
    ) -> Result<Vec<JoinHandle<()>>, ExecutorError> {
        let mut workers = Vec::with_capacity(self.threads);
        for index in 0..self.threads {
            let thread_name = format!("{}-{}", self.config.name, index);
            let spawned = queue
                .consumer(thread_name.clone())
                .map_err(ExecutorError::from)
                .and_then(|consumer| {
                    spawn_worker(thread_name.clone(), consumer, self.context.clone(), termination)
                        .map_err(|source| ExecutorError::ThreadSpawn {
                            name: thread_name,
                            source,
                        })
                });

            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    let _ = queue.close();
                    drop(queue.drain());
                    join_workers(&self.config.name, workers);
                    return Err(e);
                }
            }
        }
        Ok(workers)
    }
}

fn join_workers(name: &str, workers: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for worker in workers {
        if worker.thread().id() == current {
            // the last worker out completes the stop on its own thread
            continue;
        }
        if worker.join().is_err() {
            log::warn!("A worker of '{}' panicked", name);
        }
    }
}

impl TaskDispatcher for ExecutorInner {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn dispatch(&self, job: Job) -> Result<(), ExecutorError> {
        self.enqueue(job, Submit::Blocking)
    }

    fn schedule_cancelled(&self, schedule_id: u64, reason: &str) {
        self.publish(ExecutorEvent::with_message(
            ExecutorEventType::ScheduleCancelled,
            self.config.name.clone(),
            format!("schedule {}: {}", schedule_id, reason),
        ));
    }
}

/// Builds a [`TaskExecutor`] with optional collaborators
pub struct TaskExecutorBuilder {
    config: ExecutorConfig,
    error_handler: Option<Arc<dyn TaskErrorHandler>>,
    events: Option<Arc<dyn EventPublisher>>,
    timer: Option<Arc<Timer>>,
}

impl TaskExecutorBuilder {
    /// Receives failures of tasks submitted without a handle
    pub fn error_handler<H>(mut self, handler: H) -> Self
    where
        H: TaskErrorHandler + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Publish lifecycle events; also reports task failures there unless an
    /// error handler is set explicitly
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a timer (for example from a `TimerPool`) instead of starting one
    pub fn timer(mut self, timer: Arc<Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn build(self) -> Result<TaskExecutor, ExecutorError> {
        let config = self.config;
        config.validate()?;

        let error_handler: Arc<dyn TaskErrorHandler> = match (self.error_handler, &self.events) {
            (Some(handler), _) => handler,
            (None, Some(events)) => Arc::new(PublishingErrorHandler::new(Arc::clone(events))),
            (None, None) => Arc::new(LoggingErrorHandler),
        };
        let timer = match self.timer {
            Some(timer) => timer,
            None => Arc::new(Timer::new(format!("{}-timer", config.name))?),
        };
        let queue = Arc::new(BoundedQueue::new(config.queue_config())?);

        let inner = Arc::new(ExecutorInner {
            threads: config.effective_threads(),
            state: AtomicU8::new(ExecutorState::Stopped as u8),
            queue: RwLock::new(queue),
            workers: Mutex::new(Vec::new()),
            termination: Mutex::new(Arc::new(Termination::new(|_: &Termination| ()))),
            transition: Mutex::new(()),
            discarded: AtomicUsize::new(0),
            on_stopped: Mutex::new(Vec::new()),
            context: WorkerContext {
                executor: config.name.clone(),
                error_handler,
                counters: Arc::new(WorkerCounters::default()),
            },
            events: self.events,
            config,
        });

        let weak: Weak<ExecutorInner> = Arc::downgrade(&inner);
        let dispatcher: Weak<dyn TaskDispatcher> = weak;
        let scheduler = DelayScheduler::new(timer, dispatcher);
        Ok(TaskExecutor { inner, scheduler })
    }
}

/// Bounded, backpressure-aware task executor
///
/// # Example
///
/// ```rust
/// use taskring::executor::api::{ExecutorConfig, TaskExecutor};
///
/// let executor = TaskExecutor::new(ExecutorConfig::work_queue("example").with_backlog(16))?;
/// executor.start()?;
///
/// let handle = executor.submit(|| 2 + 2)?;
/// assert_eq!(handle.get()?, 4);
///
/// executor.stop()?;
/// # Ok::<(), taskring::executor::api::ExecutorError>(())
/// ```
pub struct TaskExecutor {
    inner: Arc<ExecutorInner>,
    scheduler: DelayScheduler,
}

impl TaskExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ExecutorConfig) -> TaskExecutorBuilder {
        TaskExecutorBuilder {
            config,
            error_handler: None,
            events: None,
            timer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    pub fn threads(&self) -> usize {
        self.inner.threads
    }

    pub fn state(&self) -> ExecutorState {
        self.inner.state()
    }

    pub fn scheduler(&self) -> &DelayScheduler {
        &self.scheduler
    }

    /// Start the worker pool; no-op unless stopped
    pub fn start(&self) -> Result<(), ExecutorError> {
        let _transition = lock_recovering(&self.inner.transition, "executor lifecycle");
        if !self
            .inner
            .transition(ExecutorState::Stopped, ExecutorState::Running)
        {
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let termination = Arc::new(Termination::new(move |run: &Termination| {
            if let Some(inner) = weak.upgrade() {
                inner.complete_stop(run);
            }
        }));
        let started = self
            .inner
            .open_queue()
            .and_then(|queue| self.inner.spawn_workers(&queue, &termination));
        match started {
            Ok(workers) => {
                *lock_recovering(&self.inner.workers, "executor workers") = workers;
                *lock_recovering(&self.inner.termination, "executor termination") = termination;
            }
            Err(e) => {
                self.inner.state.store(ExecutorState::Stopped as u8, Ordering::Release);
                return Err(e);
            }
        }

        log::debug!(
            "Executor '{}' started with {} worker(s)",
            self.name(),
            self.inner.threads
        );
        self.inner
            .publish(ExecutorEvent::new(ExecutorEventType::Started, self.name()));
        Ok(())
    }

    /// Graceful stop: run every queued task, then wait for the workers
    pub fn stop(&self) -> Result<(), ExecutorError> {
        self.stop_with(ShutdownMode::Graceful).map(|_| ())
    }

    /// Stop the executor; returns how many queued tasks were discarded
    ///
    /// Pending schedules are cancelled either way. Discarded tasks that have
    /// a handle complete as cancelled. Blocks until every worker has exited,
    /// except when called from one of this executor's own tasks: the stop
    /// then completes once that task returns. No-op when stopped.
    pub fn stop_with(&self, mode: ShutdownMode) -> Result<usize, ExecutorError> {
        match self.begin_stop(mode)? {
            Some(stopping) => {
                self.await_stopping(&stopping.termination, None);
                Ok(stopping.discarded)
            }
            None => Ok(0),
        }
    }

    /// Stop, waiting at most `timeout` for the workers to exit
    ///
    /// Returns whether the executor terminated in time. When it did not,
    /// the workers keep draining and the executor moves to `Stopped` on its
    /// own once the last one exits.
    pub fn stop_timeout(&self, mode: ShutdownMode, timeout: Duration) -> Result<bool, ExecutorError> {
        let deadline = Instant::now().checked_add(timeout);
        match self.begin_stop(mode)? {
            Some(stopping) => Ok(self.await_stopping(&stopping.termination, deadline)),
            None => Ok(true),
        }
    }

    /// Wait up to `timeout` for a stop in progress to finish
    ///
    /// True once the executor is stopped. A running executor that nobody
    /// stops never terminates, so this returns false after `timeout`.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        if self.is_terminated() {
            return true;
        }
        let termination = Arc::clone(&*lock_recovering(&self.inner.termination, "executor termination"));
        self.await_stopping(&termination, deadline)
    }

    /// True when stopped and no worker is left running
    pub fn is_terminated(&self) -> bool {
        self.state() == ExecutorState::Stopped
    }

    /// Enter `Draining` and close the queue; joins a stop already in progress
    fn begin_stop(&self, mode: ShutdownMode) -> Result<Option<Stopping>, ExecutorError> {
        let _transition = lock_recovering(&self.inner.transition, "executor lifecycle");
        let termination = Arc::clone(&*lock_recovering(&self.inner.termination, "executor termination"));
        if self
            .inner
            .transition(ExecutorState::Running, ExecutorState::Draining)
        {
            let schedules = self.scheduler.cancel_all();
            let discarded = self.drain(mode)?;
            self.inner.discarded.store(discarded, Ordering::Release);
            log::debug!(
                "Executor '{}' draining ({:?}, {} discarded, {} schedules cancelled)",
                self.name(),
                mode,
                discarded,
                schedules
            );
            return Ok(Some(Stopping {
                discarded,
                termination,
            }));
        }
        Ok((self.state() == ExecutorState::Draining).then_some(Stopping {
            discarded: 0,
            termination,
        }))
    }

    /// Wait for the run tracked by `termination` to empty, then for its stop
    /// to be reported
    ///
    /// Never waits on a worker thread of this executor; it would be waiting
    /// for itself.
    fn await_stopping(&self, termination: &Arc<Termination>, deadline: Option<Instant>) -> bool {
        if self.inner.is_worker_thread() {
            log::debug!("Executor '{}' stop requested from one of its tasks", self.name());
            return self.is_terminated();
        }
        if !termination.wait(deadline) {
            log::debug!(
                "Executor '{}' still has {} live worker(s)",
                self.name(),
                termination.live()
            );
            return false;
        }
        self.inner.complete_stop(termination);
        termination.wait_finished(deadline)
    }

    fn drain(&self, mode: ShutdownMode) -> Result<usize, ExecutorError> {
        let queue = self.inner.queue()?;
        queue.close()?;
        match mode {
            ShutdownMode::Graceful => Ok(0),
            ShutdownMode::Immediate => {
                let discarded = queue.drain()?;
                Ok(discarded.len())
            }
        }
    }

    /// Run `callback` once the executor has stopped
    ///
    /// Runs immediately on the calling thread when already stopped,
    /// otherwise on whichever thread completes the stop.
    pub fn on_stopped(&self, callback: StopCallback) {
        let transition = lock_recovering(&self.inner.transition, "executor lifecycle");
        if self.state() == ExecutorState::Stopped {
            drop(transition);
            callback();
            return;
        }
        lock_recovering(&self.inner.on_stopped, "stop callbacks").push(callback);
    }

    pub fn is_running(&self) -> bool {
        self.inner.state() == ExecutorState::Running
    }

    /// Queue a task and return a handle to its result
    ///
    /// Waits per the wait strategy while the queue is full. Submitting from
    /// inside a task can therefore deadlock a saturated pool.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_result(move || Ok::<T, Infallible>(task()))
    }

    /// Like [`submit`](Self::submit) for tasks returning `Result`; an `Err`
    /// surfaces from the handle as [`TaskError::Failed`](crate::task::TaskError::Failed)
    pub fn submit_result<F, R>(&self, task: F) -> Result<TaskHandle<R::Output>, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        let (job, handle) = completing_job(task);
        self.inner.enqueue(job, Submit::Blocking)?;
        Ok(handle)
    }

    /// Fire-and-forget; failures go to the error handler
    pub fn execute<F, R>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.inner.enqueue(detached_job(task), Submit::Blocking)
    }

    /// Fire-and-forget without waiting; `QueueError::Full` when saturated
    pub fn try_execute<F, R>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.inner.enqueue(detached_job(task), Submit::Immediate)
    }

    /// Fire-and-forget, waiting at most `timeout` for queue space
    pub fn execute_timeout<F, R>(&self, task: F, timeout: Duration) -> Result<(), ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.inner.enqueue(detached_job(task), Submit::Timeout(timeout))
    }

    /// Run `task` once after `delay`
    pub fn schedule<F, T>(&self, task: F, delay: Duration) -> Result<ScheduledHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.inner.ensure_running()?;
        self.scheduler.schedule_once(task, delay)
    }

    /// Fixed-rate schedule; runs may overlap when a run outlasts `period`
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
        self.inner.ensure_running()?;
        self.scheduler
            .schedule_at_fixed_rate(task, initial_delay, period)
    }

    /// Fixed-delay schedule; runs never overlap
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
        self.inner.ensure_running()?;
        self.scheduler
            .schedule_with_fixed_delay(task, initial_delay, delay)
    }

    pub fn stats(&self) -> Result<ExecutorStats, ExecutorError> {
        let counters = &self.inner.context.counters;
        Ok(ExecutorStats {
            name: self.name().to_string(),
            state: self.state(),
            threads: self.inner.threads,
            queue: self.inner.queue()?.stats()?,
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        })
    }
}

impl Lifecycle for TaskExecutor {
    type Error = ExecutorError;

    fn start(&self) -> Result<(), ExecutorError> {
        TaskExecutor::start(self)
    }

    fn stop(&self) -> Result<(), ExecutorError> {
        TaskExecutor::stop(self)
    }

    fn stop_then(&self, callback: StopCallback) -> Result<(), ExecutorError> {
        self.on_stopped(callback);
        TaskExecutor::stop(self)
    }

    fn is_running(&self) -> bool {
        TaskExecutor::is_running(self)
    }

    fn is_auto_startup(&self) -> bool {
        self.inner.config.auto_startup
    }

    fn phase(&self) -> i32 {
        self.inner.config.phase
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        if self.state() != ExecutorState::Stopped {
            if let Err(e) = self.stop() {
                log::warn!("Executor '{}' did not stop cleanly: {}", self.name(), e);
            }
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("threads", &self.inner.threads)
            .finish()
    }
}
