//! Ring-buffer backed event publisher
//!
//! Producers enqueue onto a single-consumer [`BoundedQueue`]; one dispatcher
//! thread drains it and fans each event out to the listeners whose filter
//! matches. Listeners see events in publish order.

use crate::core::lifecycle::Lifecycle;
use crate::core::sync::{handle_mutex_poison, lock_recovering};
use crate::events::error::EventError;
use crate::events::event::{EventFilter, ExecutorEvent};
use crate::events::traits::{EventListener, EventPublisher};
use crate::queue::{
    BoundedQueue, ConsumerType, QueueConfig, QueueConsumer, QueueError, QueuePublisher,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

pub const DEFAULT_EVENT_BACKLOG: usize = 1024;

struct Subscription {
    id: u64,
    filter: EventFilter,
    listener: Arc<dyn EventListener>,
}

type Subscriptions = Arc<RwLock<Vec<Subscription>>>;

struct Running {
    queue: Arc<BoundedQueue<ExecutorEvent>>,
    publisher: QueuePublisher<ExecutorEvent>,
    dispatcher: JoinHandle<()>,
}

pub struct RingBufferEventPublisher {
    name: String,
    backlog: usize,
    subscriptions: Subscriptions,
    running: Mutex<Option<Running>>,
    next_subscription: AtomicU64,
    delivered: Arc<AtomicU64>,
}

impl RingBufferEventPublisher {
    pub fn new(name: impl Into<String>, backlog: usize) -> Self {
        Self {
            name: name.into(),
            backlog,
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            running: Mutex::new(None),
            next_subscription: AtomicU64::new(1),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a listener; returns its subscription id
    pub fn subscribe<L>(&self, filter: EventFilter, listener: L) -> u64
    where
        L: EventListener + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscriptions.push(Subscription {
            id,
            filter,
            listener: Arc::new(listener),
        });
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .map(|subscriptions| subscriptions.len())
            .unwrap_or(0)
    }

    /// Listener invocations so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

fn dispatch_loop(
    name: String,
    consumer: QueueConsumer<ExecutorEvent>,
    subscriptions: Subscriptions,
    delivered: Arc<AtomicU64>,
) {
    loop {
        let event = match consumer.read() {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => {
                log::error!("Event dispatcher '{}' stopped: {}", name, e);
                break;
            }
        };

        let listeners: Vec<Arc<dyn EventListener>> = subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|subscription| subscription.filter.matches(&event))
            .map(|subscription| Arc::clone(&subscription.listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))).is_err() {
                log::warn!("Event listener panicked on {:?}", event.event_type);
            } else {
                delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    log::debug!("Event dispatcher '{}' exited", name);
}

impl EventPublisher for RingBufferEventPublisher {
    fn publish(&self, event: ExecutorEvent) -> Result<(), EventError> {
        let publisher = {
            let running = handle_mutex_poison(self.running.lock(), |message| {
                EventError::Queue(QueueError::OperationFailed { message })
            })?;
            match running.as_ref() {
                Some(running) => running.publisher.clone(),
                None => {
                    return Err(EventError::NotRunning {
                        name: self.name.clone(),
                    })
                }
            }
        };
        // Enqueue outside the lock so a full queue cannot block stop()
        publisher.publish(event)?;
        Ok(())
    }
}

impl Lifecycle for RingBufferEventPublisher {
    type Error = EventError;

    fn start(&self) -> Result<(), EventError> {
        let mut running = lock_recovering(&self.running, "event publisher");
        if running.is_some() {
            return Ok(());
        }

        let config = QueueConfig::new(format!("{}-queue", self.name), self.backlog)
            .with_consumer_type(ConsumerType::Single);
        let queue = Arc::new(BoundedQueue::new(config)?);
        let consumer = queue.consumer(format!("{}-dispatcher", self.name))?;

        let thread_name = format!("{}-events", self.name);
        let name = self.name.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let delivered = Arc::clone(&self.delivered);
        let dispatcher = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || dispatch_loop(name, consumer, subscriptions, delivered))
            .map_err(|source| EventError::ThreadSpawn {
                name: thread_name,
                source,
            })?;

        *running = Some(Running {
            publisher: queue.publisher(self.name.clone()),
            queue,
            dispatcher,
        });
        log::debug!("Event publisher '{}' started", self.name);
        Ok(())
    }

    /// Stop accepting events and deliver everything already queued
    fn stop(&self) -> Result<(), EventError> {
        let Some(running) = lock_recovering(&self.running, "event publisher").take() else {
            return Ok(());
        };
        let Running {
            queue, dispatcher, ..
        } = running;

        queue.close()?;
        if dispatcher.thread().id() != thread::current().id() && dispatcher.join().is_err() {
            log::warn!("Event dispatcher '{}' panicked", self.name);
        }
        log::debug!("Event publisher '{}' stopped", self.name);
        Ok(())
    }

    fn is_running(&self) -> bool {
        lock_recovering(&self.running, "event publisher").is_some()
    }

    /// Start before and stop after the executors that publish into it
    fn phase(&self) -> i32 {
        -100
    }
}

impl Drop for RingBufferEventPublisher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for RingBufferEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBufferEventPublisher")
            .field("name", &self.name)
            .field("backlog", &self.backlog)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::ExecutorEventType;
    use crate::task::TaskError;

    fn collector() -> (Arc<Mutex<Vec<ExecutorEventType>>>, impl Fn(&ExecutorEvent) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event: &ExecutorEvent| {
            sink.lock().unwrap().push(event.event_type)
        })
    }

    #[test]
    fn test_publish_requires_start() {
        let publisher = RingBufferEventPublisher::new("idle", 4);
        let result = publisher.publish(ExecutorEvent::new(ExecutorEventType::Started, "x"));
        assert!(matches!(result, Err(EventError::NotRunning { .. })));
    }

    #[test]
    fn test_filtered_delivery_in_order() {
        let publisher = RingBufferEventPublisher::new("events", 16);
        let (all, all_listener) = collector();
        let (failures, failure_listener) = collector();
        publisher.subscribe(EventFilter::All, all_listener);
        publisher.subscribe(EventFilter::FailuresOnly, failure_listener);

        publisher.start().unwrap();
        publisher
            .publish(ExecutorEvent::new(ExecutorEventType::Started, "pool"))
            .unwrap();
        publisher
            .publish(ExecutorEvent::task_failed("pool", TaskError::Cancelled))
            .unwrap();
        publisher
            .publish(ExecutorEvent::new(ExecutorEventType::Stopped, "pool"))
            .unwrap();
        publisher.stop().unwrap();

        assert_eq!(
            *all.lock().unwrap(),
            vec![
                ExecutorEventType::Started,
                ExecutorEventType::TaskFailed,
                ExecutorEventType::Stopped
            ]
        );
        assert_eq!(*failures.lock().unwrap(), vec![ExecutorEventType::TaskFailed]);
        assert_eq!(publisher.delivered(), 4);
        println!("✓ Events delivered in publish order to matching listeners");
    }

    #[test]
    fn test_unsubscribe_and_restart() {
        let publisher = RingBufferEventPublisher::new("restart", 4);
        let (seen, listener) = collector();
        let id = publisher.subscribe(EventFilter::LifecycleOnly, listener);

        publisher.start().unwrap();
        publisher.stop().unwrap();
        assert!(!publisher.is_running());

        publisher.start().unwrap();
        publisher
            .publish(ExecutorEvent::new(ExecutorEventType::Started, "pool"))
            .unwrap();
        publisher.stop().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        assert!(publisher.unsubscribe(id));
        assert!(!publisher.unsubscribe(id));
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
