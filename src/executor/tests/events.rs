//! Tests for executor event publication

use crate::core::lifecycle::Lifecycle;
use crate::events::api::{EventFilter, ExecutorEvent, ExecutorEventType, RingBufferEventPublisher};
use crate::executor::api::{ExecutorConfig, TaskError, TaskExecutor};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn recording_publisher(filter: EventFilter) -> (Arc<RingBufferEventPublisher>, Arc<Mutex<Vec<ExecutorEvent>>>) {
    let publisher = Arc::new(RingBufferEventPublisher::new("test-events", 64));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    publisher.subscribe(filter, move |event: &ExecutorEvent| {
        sink.lock().unwrap().push(event.clone())
    });
    publisher.start().unwrap();
    (publisher, events)
}

#[test]
fn test_lifecycle_and_failure_events() {
    let (publisher, events) = recording_publisher(EventFilter::All);
    let executor = TaskExecutor::builder(ExecutorConfig::work_queue("observed").with_backlog(8))
        .event_publisher(publisher.clone())
        .build()
        .unwrap();

    executor.start().unwrap();
    executor.execute(|| Err::<(), _>("broken")).unwrap();
    executor.stop().unwrap();
    publisher.stop().unwrap();

    let events = events.lock().unwrap();
    let types: Vec<ExecutorEventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            ExecutorEventType::Started,
            ExecutorEventType::TaskFailed,
            ExecutorEventType::Stopped
        ]
    );
    assert!(events.iter().all(|e| e.source == "observed"));
    assert_eq!(events[1].error, Some(TaskError::failed("broken")));
    println!("✓ Started, TaskFailed and Stopped events published in order");
}

#[test]
fn test_ended_schedule_publishes_cancellation() {
    let (publisher, events) = recording_publisher(EventFilter::All);
    let executor = TaskExecutor::builder(ExecutorConfig::work_queue("schedule-events").with_backlog(8))
        .event_publisher(publisher.clone())
        .build()
        .unwrap();
    executor.start().unwrap();

    let handle = executor
        .schedule_with_fixed_delay(|| Err::<(), _>("once is enough"), Duration::ZERO, Duration::from_millis(5))
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(handle.is_cancelled());
    executor.stop().unwrap();
    publisher.stop().unwrap();

    let events = events.lock().unwrap();
    let ended = events
        .iter()
        .find(|e| e.event_type == ExecutorEventType::ScheduleCancelled)
        .expect("schedule end published");
    assert!(ended.message.as_deref().unwrap_or("").contains("once is enough"));
    println!("✓ A schedule ended by failure publishes ScheduleCancelled");
}

#[test]
fn test_failure_filter_sees_only_failures() {
    let (publisher, events) = recording_publisher(EventFilter::FailuresOnly);
    let executor = TaskExecutor::builder(ExecutorConfig::work_queue("filtered").with_backlog(8))
        .event_publisher(publisher.clone())
        .build()
        .unwrap();

    executor.start().unwrap();
    executor.execute(|| -> Result<(), String> { panic!("filtered panic") }).unwrap();
    executor.stop().unwrap();
    publisher.stop().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].error, Some(TaskError::Panicked { .. })));
    println!("✓ Failure filter delivers only TaskFailed events");
}
