//! Listener and publisher traits

use crate::events::error::EventError;
use crate::events::event::ExecutorEvent;

/// Receives published events on the dispatcher thread
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ExecutorEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ExecutorEvent) + Send + Sync,
{
    fn on_event(&self, event: &ExecutorEvent) {
        self(event)
    }
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ExecutorEvent) -> Result<(), EventError>;
}
