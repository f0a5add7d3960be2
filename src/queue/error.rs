//! Queue Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is full (capacity: {capacity})")]
    Full { capacity: usize },

    #[error("Queue is closed")]
    Closed,

    #[error("Queue capacity must be greater than zero")]
    InvalidCapacity,

    #[error("Consumer limit reached (max consumers: {limit})")]
    ConsumerLimit { limit: usize },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, QueueError::OperationFailed { .. })
    }

    fn user_message(&self) -> Option<String> {
        match self {
            QueueError::OperationFailed { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
