//! Worker threads
//!
//! Each worker owns a queue consumer and runs jobs until the queue reports
//! closed-and-drained. A failing or panicking job is reported and the worker
//! moves on to the next one.

use crate::core::sync::lock_recovering;
use crate::queue::QueueConsumer;
use crate::task::{Job, TaskError, TaskErrorHandler};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

type LastExitHook = Box<dyn Fn(&Termination) + Send + Sync>;

/// Counts the live workers of one run and wakes waiters when the pool empties
///
/// A worker is counted from just before its thread is spawned until its
/// loop returns, so a waiter never sees zero while a spawn is in flight.
/// Each start of an executor gets a fresh `Termination`; it is finished
/// once the stop that emptied it has been fully reported.
pub(crate) struct Termination {
    run: Mutex<RunState>,
    changed: Condvar,
    on_last_exit: LastExitHook,
}

#[derive(Default)]
struct RunState {
    live: usize,
    finished: bool,
}

impl Termination {
    pub(crate) fn new(on_last_exit: impl Fn(&Termination) + Send + Sync + 'static) -> Self {
        Self {
            run: Mutex::new(RunState::default()),
            changed: Condvar::new(),
            on_last_exit: Box::new(on_last_exit),
        }
    }

    pub(crate) fn live(&self) -> usize {
        lock_recovering(&self.run, "worker count").live
    }

    fn enter(&self) {
        lock_recovering(&self.run, "worker count").live += 1;
    }

    /// Returns true when this was the last live worker
    fn leave(&self) -> bool {
        let mut run = lock_recovering(&self.run, "worker count");
        run.live = run.live.saturating_sub(1);
        let last = run.live == 0;
        drop(run);
        self.changed.notify_all();
        last
    }

    pub(crate) fn mark_finished(&self) {
        lock_recovering(&self.run, "worker count").finished = true;
        self.changed.notify_all();
    }

    /// Wait until no worker is live; false if `deadline` passed first
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> bool {
        self.wait_until(deadline, |run| run.live == 0)
    }

    /// Wait until the stop of this run has been reported
    pub(crate) fn wait_finished(&self, deadline: Option<Instant>) -> bool {
        self.wait_until(deadline, |run| run.finished)
    }

    fn wait_until(&self, deadline: Option<Instant>, done: impl Fn(&RunState) -> bool) -> bool {
        let mut run = lock_recovering(&self.run, "worker count");
        while !done(&run) {
            run = match deadline {
                None => self
                    .changed
                    .wait(run)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    self.changed
                        .wait_timeout(run, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
                }
            };
        }
        true
    }
}

/// Leaves the live count even when the worker loop unwinds
struct LiveGuard {
    termination: Arc<Termination>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        if self.termination.leave() {
            (self.termination.on_last_exit)(&self.termination);
        }
    }
}

/// Per-executor counters shared by every worker
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
}

#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) executor: String,
    pub(crate) error_handler: Arc<dyn TaskErrorHandler>,
    pub(crate) counters: Arc<WorkerCounters>,
}

pub(crate) fn spawn_worker(
    thread_name: String,
    consumer: QueueConsumer<Job>,
    context: WorkerContext,
    termination: &Arc<Termination>,
) -> std::io::Result<JoinHandle<()>> {
    termination.enter();
    let live = LiveGuard {
        termination: Arc::clone(termination),
    };
    // a failed spawn drops the closure, and with it the guard
    thread::Builder::new().name(thread_name).spawn(move || {
        let _live = live;
        run_worker(consumer, context)
    })
}

fn run_worker(consumer: QueueConsumer<Job>, context: WorkerContext) {
    log::trace!("Worker {} started", consumer.consumer_id());
    loop {
        match consumer.read() {
            Ok(Some(job)) => execute_job(job, &context),
            Ok(None) => break,
            Err(e) => {
                log::error!(
                    "Worker {} of '{}' cannot read its queue: {}",
                    consumer.consumer_id(),
                    context.executor,
                    e
                );
                break;
            }
        }
    }
    log::trace!("Worker {} exited", consumer.consumer_id());
}

pub(crate) fn execute_job(job: Job, context: &WorkerContext) {
    let outcome = catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));

    match outcome {
        Ok(()) => {
            context.counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(error) => {
            context.counters.failed.fetch_add(1, Ordering::Relaxed);
            report(context, &error);
        }
    }
}

fn report(context: &WorkerContext, error: &TaskError) {
    let handled = catch_unwind(AssertUnwindSafe(|| {
        context.error_handler.handle_error(&context.executor, error)
    }));
    if handled.is_err() {
        log::error!(
            "Error handler of '{}' panicked while reporting: {}",
            context.executor,
            error
        );
    }
}
