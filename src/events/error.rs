//! Error types for event publishing

use crate::core::error_handling::ContextualError;
use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Event publisher '{name}' is not running")]
    NotRunning { name: String },

    #[error("Event queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to start event dispatcher '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContextualError for EventError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<String> {
        None
    }
}
