//! Error handler that turns task failures into events

use crate::events::event::ExecutorEvent;
use crate::events::traits::EventPublisher;
use crate::task::{LoggingErrorHandler, TaskError, TaskErrorHandler};
use std::sync::Arc;

/// Publishes `TaskFailed` events; logs when the publisher refuses
pub struct PublishingErrorHandler {
    publisher: Arc<dyn EventPublisher>,
}

impl PublishingErrorHandler {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

impl TaskErrorHandler for PublishingErrorHandler {
    fn handle_error(&self, executor: &str, error: &TaskError) {
        let event = ExecutorEvent::task_failed(executor, error.clone());
        if let Err(e) = self.publisher.publish(event) {
            log::debug!("Falling back to logging task failure: {}", e);
            LoggingErrorHandler.handle_error(executor, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::error::EventError;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<ExecutorEvent>>);

    impl EventPublisher for Recording {
        fn publish(&self, event: ExecutorEvent) -> Result<(), EventError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_failures_become_events() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let handler = PublishingErrorHandler::new(recording.clone());

        handler.handle_error("pool", &TaskError::failed("bad"));

        let events = recording.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "pool");
        assert_eq!(events[0].error, Some(TaskError::failed("bad")));
    }
}
