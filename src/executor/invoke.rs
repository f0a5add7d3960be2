//! Bulk invocation: run a group of tasks and wait for all or the first
//! success

use crate::executor::error::ExecutorError;
use crate::executor::engine::TaskExecutor;
use crate::task::{IntoTaskResult, TaskError, TaskHandle};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

fn remaining(deadline: Option<Instant>) -> Duration {
    deadline
        .map(|deadline| deadline.saturating_duration_since(Instant::now()))
        .unwrap_or(Duration::MAX)
}

fn cancel_all<T>(handles: &[Option<TaskHandle<T>>]) -> usize {
    handles.iter().flatten().filter(|handle| handle.cancel()).count()
}

impl TaskExecutor {
    /// Submit every task and wait until all are done
    ///
    /// Handles come back in submission order. If a submission fails, tasks
    /// already queued are cancelled and the error is returned.
    pub fn invoke_all<I, F, R>(&self, tasks: I) -> Result<Vec<TaskHandle<R::Output>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        let handles = self.submit_all(tasks)?;
        for handle in &handles {
            handle.wait();
        }
        Ok(handles)
    }

    /// Like [`invoke_all`](Self::invoke_all), cancelling whatever is still
    /// unfinished when `timeout` elapses
    pub fn invoke_all_timeout<I, F, R>(
        &self,
        tasks: I,
        timeout: Duration,
    ) -> Result<Vec<TaskHandle<R::Output>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        let deadline = Instant::now().checked_add(timeout);
        let handles = self.submit_all(tasks)?;
        for handle in &handles {
            if !handle.wait_timeout(remaining(deadline)) {
                let cancelled = handles.iter().filter(|handle| handle.cancel()).count();
                log::debug!(
                    "invoke_all on '{}' timed out after {:?}, {} task(s) cancelled",
                    self.name(),
                    timeout,
                    cancelled
                );
                break;
            }
        }
        Ok(handles)
    }

    /// Submit every task and return the result of the first to succeed
    ///
    /// The others are cancelled. Fails with [`ExecutorError::NoTasks`] for
    /// an empty input and with the last task error when every task fails.
    pub fn invoke_any<I, F, R>(&self, tasks: I) -> Result<R::Output, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        self.invoke_any_until(tasks, None)
    }

    /// Like [`invoke_any`](Self::invoke_any), giving up with
    /// [`ExecutorError::Timeout`] when nothing succeeds within `timeout`
    pub fn invoke_any_timeout<I, F, R>(&self, tasks: I, timeout: Duration) -> Result<R::Output, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        self.invoke_any_until(tasks, Some(timeout))
    }

    fn submit_all<I, F, R>(&self, tasks: I) -> Result<Vec<TaskHandle<R::Output>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        let mut handles = Vec::new();
        for task in tasks {
            match self.submit_result(task) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in &handles {
                        handle.cancel();
                    }
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }

    fn invoke_any_until<I, F, R>(&self, tasks: I, timeout: Option<Duration>) -> Result<R::Output, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> R + Send + 'static,
        R: IntoTaskResult,
        R::Output: Send + 'static,
    {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let (sender, receiver) = mpsc::channel::<(usize, Result<(), TaskError>)>();

        let mut handles: Vec<Option<TaskHandle<R::Output>>> = Vec::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let handle = match self.submit_result(task) {
                Ok(handle) => handle,
                Err(e) => {
                    cancel_all(&handles);
                    return Err(e);
                }
            };
            let sender = sender.clone();
            handle.on_complete(move |outcome| {
                let _ = sender.send((index, outcome.as_ref().map(|_| ()).map_err(Clone::clone)));
            });
            handles.push(Some(handle));
        }
        drop(sender);

        if handles.is_empty() {
            return Err(ExecutorError::NoTasks);
        }

        let mut failures = 0;
        let mut last_error = TaskError::Cancelled;
        loop {
            let message = match timeout {
                Some(_) => receiver.recv_timeout(remaining(deadline)),
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match message {
                Ok((index, Ok(()))) => {
                    let winner = handles[index].take();
                    let cancelled = cancel_all(&handles);
                    log::trace!("invoke_any: task {} won, {} cancelled", index, cancelled);
                    if let Some(winner) = winner {
                        return winner.get();
                    }
                }
                Ok((_, Err(error))) => {
                    failures += 1;
                    last_error = error;
                    if failures == handles.len() {
                        return Err(last_error.into());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancel_all(&handles);
                    return Err(ExecutorError::Timeout {
                        timeout: timeout.unwrap_or_default(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(last_error.into());
                }
            }
        }
    }
}
