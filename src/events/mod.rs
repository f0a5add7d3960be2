//! Executor lifecycle and failure events
//!
//! Executors report `Started`/`Stopped` and schedule cancellations to an
//! [`EventPublisher`]; [`PublishingErrorHandler`] routes unhandled task
//! failures there too, so a host can observe them as application events.

pub mod api;
mod error;
mod event;
mod handler;
mod publisher;
mod traits;

pub use error::EventError;
pub use event::{EventFilter, ExecutorEvent, ExecutorEventType};
pub use handler::PublishingErrorHandler;
pub use publisher::{RingBufferEventPublisher, DEFAULT_EVENT_BACKLOG};
pub use traits::{EventListener, EventPublisher};
