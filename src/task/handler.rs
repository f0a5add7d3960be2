//! Error reporting hook and the dispatch seam used by the scheduler

use crate::executor::ExecutorError;
use crate::task::error::TaskError;
use crate::task::job::Job;

/// Receives failures nobody else can observe
///
/// Called for fire-and-forget and periodic tasks. Tasks submitted with a
/// handle report through the handle instead.
pub trait TaskErrorHandler: Send + Sync {
    fn handle_error(&self, executor: &str, error: &TaskError);
}

impl<F> TaskErrorHandler for F
where
    F: Fn(&str, &TaskError) + Send + Sync,
{
    fn handle_error(&self, executor: &str, error: &TaskError) {
        self(executor, error)
    }
}

/// Default handler: log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl TaskErrorHandler for LoggingErrorHandler {
    fn handle_error(&self, executor: &str, error: &TaskError) {
        log::error!("Unhandled task failure in executor '{}': {}", executor, error);
    }
}

/// Something that accepts jobs for execution
pub trait TaskDispatcher: Send + Sync {
    /// Name used in logs and events
    fn name(&self) -> &str;

    /// Hand a job to the workers, waiting for queue space if needed
    fn dispatch(&self, job: Job) -> Result<(), ExecutorError>;

    /// Told when a periodic schedule stops re-arming
    fn schedule_cancelled(&self, _schedule_id: u64, _reason: &str) {}
}
