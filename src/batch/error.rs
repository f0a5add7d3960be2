//! Batch Error Types

use crate::core::error_handling::ContextualError;
use crate::task::TaskError;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Batch size must be at least 1 (got {size})")]
    InvalidBatchSize { size: usize },

    #[error("Batch handler failed: {source}")]
    Handler {
        #[source]
        source: TaskError,
    },

    #[error("Batch operation failed: {message}")]
    OperationFailed { message: String },
}

impl ContextualError for BatchError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, BatchError::InvalidBatchSize { .. })
    }

    fn user_message(&self) -> Option<String> {
        match self {
            BatchError::InvalidBatchSize { .. } => Some(self.to_string()),
            _ => None,
        }
    }
}
