//! Executor feeding a batching consumer, observed through events

use std::sync::{Arc, Mutex};
use taskring::batch::{BatchingConsumer, Message, MessageHeaders};
use taskring::core::lifecycle::{start_all, stop_all, Lifecycle};
use taskring::events::api::{EventFilter, ExecutorEvent, ExecutorEventType, RingBufferEventPublisher};
use taskring::executor::api::{ExecutorConfig, ExecutorError, TaskExecutor};

#[test]
fn test_ring_buffer_executor_feeds_batches_in_order() {
    let executor = TaskExecutor::new(ExecutorConfig::ring_buffer("batch-feed").with_backlog(16)).unwrap();
    executor.start().unwrap();

    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let consumer = Arc::new(
        BatchingConsumer::new(
            move |batch: Message<Vec<u32>>| sink.lock().unwrap().push(batch),
            5,
        )
        .unwrap(),
    );

    for i in 0..12u32 {
        let consumer = Arc::clone(&consumer);
        let headers = MessageHeaders::new().with("seq", i.to_string());
        executor
            .execute(move || consumer.accept(Message::with_headers(i, headers)))
            .unwrap();
    }
    executor.stop().unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].payload, vec![0, 1, 2, 3, 4]);
    assert_eq!(batches[1].payload, vec![5, 6, 7, 8, 9]);
    assert_eq!(batches[1].header("seq"), Some("5"));
    assert_eq!(consumer.pending_len().unwrap(), 2);
    println!("✓ 12 messages through a ring buffer executor: 2 batches, 2 pending");
}

#[test]
fn test_lifecycle_events_reach_subscribers() {
    let publisher = Arc::new(RingBufferEventPublisher::new("pipeline-events", 32));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    publisher.subscribe(EventFilter::LifecycleOnly, move |event: &ExecutorEvent| {
        sink.lock().unwrap().push((event.source.clone(), event.event_type))
    });
    publisher.start().unwrap();

    let executors: Vec<TaskExecutor> = ["left", "right"]
        .into_iter()
        .map(|name| {
            TaskExecutor::builder(ExecutorConfig::work_queue(name).with_backlog(8))
                .event_publisher(publisher.clone())
                .build()
                .unwrap()
        })
        .collect();
    let components: Vec<&dyn Lifecycle<Error = ExecutorError>> =
        executors.iter().map(|e| e as &dyn Lifecycle<Error = ExecutorError>).collect();

    start_all(&components).unwrap();
    assert_eq!(executors[0].submit(|| "up").unwrap().get().unwrap(), "up");
    stop_all(&components).unwrap();
    publisher.stop().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    for name in ["left", "right"] {
        let types: Vec<ExecutorEventType> = seen
            .iter()
            .filter(|(source, _)| source == name)
            .map(|(_, event_type)| *event_type)
            .collect();
        assert_eq!(types, vec![ExecutorEventType::Started, ExecutorEventType::Stopped]);
    }
    println!("✓ Each executor published Started then Stopped");
}
