//! Units of work, completion handles and the error reporting hook

mod error;
mod handle;
mod handler;
mod job;

pub use error::TaskError;
pub use handle::TaskHandle;
pub use handler::{LoggingErrorHandler, TaskDispatcher, TaskErrorHandler};
pub use job::{IntoTaskResult, Job};

pub(crate) use job::{completing_job, detached_job};
