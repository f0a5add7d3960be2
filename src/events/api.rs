//! Public API for executor events

pub use crate::events::error::EventError;
pub use crate::events::event::{EventFilter, ExecutorEvent, ExecutorEventType};
pub use crate::events::handler::PublishingErrorHandler;
pub use crate::events::publisher::{RingBufferEventPublisher, DEFAULT_EVENT_BACKLOG};
pub use crate::events::traits::{EventListener, EventPublisher};
