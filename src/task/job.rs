//! Units of work carried by the executor queue

use crate::task::error::TaskError;
use crate::task::handle::TaskHandle;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A type-erased task as it travels through the queue
///
/// An `Err` return is routed to the executor's error handler.
pub type Job = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// Return types a task closure may have
///
/// `()` always succeeds; `Result<T, E>` fails with [`TaskError::Failed`]
/// carrying the error's display text.
pub trait IntoTaskResult {
    type Output;

    fn into_task_result(self) -> Result<Self::Output, TaskError>;
}

impl IntoTaskResult for () {
    type Output = ();

    fn into_task_result(self) -> Result<(), TaskError> {
        Ok(())
    }
}

impl<T, E: Display> IntoTaskResult for Result<T, E> {
    type Output = T;

    fn into_task_result(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::failed(e.to_string()))
    }
}

/// Run a task closure, turning panics into [`TaskError::Panicked`]
fn run_guarded<F, R>(task: F) -> Result<R::Output, TaskError>
where
    F: FnOnce() -> R,
    R: IntoTaskResult,
{
    catch_unwind(AssertUnwindSafe(task))
        .map_err(TaskError::from_panic)
        .and_then(IntoTaskResult::into_task_result)
}

/// Wrap a fire-and-forget task; its failure goes to the error handler
pub(crate) fn detached_job<F, R>(task: F) -> Job
where
    F: FnOnce() -> R + Send + 'static,
    R: IntoTaskResult,
{
    Box::new(move || run_guarded(task).map(|_| ()))
}

/// Wrap a task whose outcome is delivered through a [`TaskHandle`]
///
/// The job itself always returns `Ok`: the handle owner observes failures.
/// A job dropped before running completes its handle as cancelled.
pub(crate) fn completing_job<F, R>(task: F) -> (Job, TaskHandle<R::Output>)
where
    F: FnOnce() -> R + Send + 'static,
    R: IntoTaskResult,
    R::Output: Send + 'static,
{
    let (handle, completer) = TaskHandle::pair();
    let job: Job = Box::new(move || {
        if completer.begin() {
            completer.complete(run_guarded(task));
        } else {
            log::trace!("Skipping cancelled task");
        }
        Ok(())
    });
    (job, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_job_maps_outcomes() {
        assert_eq!(detached_job(|| ())(), Ok(()));
        assert_eq!(
            detached_job(|| Err::<(), _>("disk full"))(),
            Err(TaskError::failed("disk full"))
        );
        assert!(matches!(
            detached_job(|| -> () { panic!("kaboom") })(),
            Err(TaskError::Panicked { message }) if message == "kaboom"
        ));
    }

    #[test]
    fn test_completing_job_fills_handle() {
        let (job, handle) = completing_job(|| Ok::<_, String>(6 * 7));

        assert!(!handle.is_done());
        assert_eq!(job(), Ok(()));
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_completing_job_keeps_failure_off_the_error_path() {
        let (job, handle) = completing_job(|| Err::<u8, _>("bad input"));

        assert_eq!(job(), Ok(()), "failure belongs to the handle");
        let err = handle.get().unwrap_err();
        assert_eq!(err.to_string(), "Task failed: bad input");
    }

    #[test]
    fn test_dropped_job_cancels_handle() {
        let (job, handle) = completing_job(|| Ok::<_, String>(1));
        drop(job);

        assert!(handle.is_done());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancelled_job_is_skipped() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&ran);
        let (job, handle) = completing_job(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(handle.cancel());
        assert_eq!(job(), Ok(()));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
