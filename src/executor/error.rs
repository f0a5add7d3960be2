//! Executor Error Types

use crate::core::error_handling::ContextualError;
use crate::queue::QueueError;
use crate::task::TaskError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Illegal executor configuration: {message}")]
    IllegalConfiguration { message: String },

    #[error("Executor '{name}' is not running")]
    NotRunning { name: String },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("No tasks supplied")]
    NoTasks,

    #[error("Timer '{name}' has been shut down")]
    TimerStopped { name: String },

    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutorError {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        ExecutorError::IllegalConfiguration {
            message: message.into(),
        }
    }
}

impl ContextualError for ExecutorError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ExecutorError::Queue(e) => e.is_user_actionable(),
            ExecutorError::ThreadSpawn { .. } => false,
            _ => true,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            ExecutorError::Queue(e) => e.user_message(),
            ExecutorError::ThreadSpawn { .. } => None,
            other => Some(other.to_string()),
        }
    }
}
