//! Task Error Types

use crate::core::error_handling::ContextualError;
use std::any::Any;

/// Failure of a single task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Task panicked: {message}")]
    Panicked { message: String },

    #[error("Task failed: {message}")]
    Failed { message: String },

    #[error("Task was cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
        }
    }

    /// Build a `Panicked` error from a `catch_unwind` payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked { message }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

impl ContextualError for TaskError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}
