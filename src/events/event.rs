//! Event types published by executors

use crate::task::TaskError;
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorEventType {
    Started,
    Stopped,
    TaskFailed,
    ScheduleCancelled,
}

impl ExecutorEventType {
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, ExecutorEventType::Started | ExecutorEventType::Stopped)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecutorEventType::TaskFailed | ExecutorEventType::ScheduleCancelled
        )
    }
}

#[derive(Clone, Debug)]
pub struct ExecutorEvent {
    pub event_type: ExecutorEventType,
    pub timestamp: SystemTime,
    /// Name of the executor the event came from
    pub source: String,
    pub error: Option<TaskError>,
    pub message: Option<String>,
}

impl ExecutorEvent {
    pub fn new(event_type: ExecutorEventType, source: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            source: source.into(),
            error: None,
            message: None,
        }
    }

    pub fn with_message(
        event_type: ExecutorEventType,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(event_type, source)
        }
    }

    pub fn task_failed(source: impl Into<String>, error: TaskError) -> Self {
        Self {
            message: Some(error.to_string()),
            error: Some(error),
            ..Self::new(ExecutorEventType::TaskFailed, source)
        }
    }
}

/// Event filtering options for listeners
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    LifecycleOnly,
    FailuresOnly,
}

impl EventFilter {
    pub fn matches(&self, event: &ExecutorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::LifecycleOnly => event.event_type.is_lifecycle(),
            EventFilter::FailuresOnly => event.event_type.is_failure(),
        }
    }
}
