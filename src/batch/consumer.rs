//! Fixed-size batching in front of a downstream handler
//!
//! Every `batch_size`-th accepted message flushes the pending payloads as one
//! `Message<Vec<T>>` carrying the headers of the batch's first message. The
//! sequence claim, header capture, append and flush share one lock, so
//! concurrent producers never duplicate or drop a payload.
//!
//! A trailing partial batch stays pending until more messages arrive; nothing
//! flushes it on idle. Callers that need it use [`BatchingConsumer::take_pending`].

use crate::batch::error::BatchError;
use crate::batch::message::{Message, MessageHeaders};
use crate::core::sync::handle_mutex_poison;
use crate::task::{IntoTaskResult, TaskError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

/// Downstream receiver of flushed batches
pub trait BatchHandler<T>: Send + Sync {
    fn handle_batch(&self, batch: Message<Vec<T>>) -> Result<(), TaskError>;
}

impl<T, F, R> BatchHandler<T> for F
where
    F: Fn(Message<Vec<T>>) -> R + Send + Sync,
    R: IntoTaskResult,
{
    fn handle_batch(&self, batch: Message<Vec<T>>) -> Result<(), TaskError> {
        self(batch).into_task_result().map(|_| ())
    }
}

struct Pending<T> {
    sequence: u64,
    headers: Option<MessageHeaders>,
    payloads: Vec<T>,
    flushed: u64,
}

pub struct BatchingConsumer<T, H> {
    handler: H,
    batch_size: usize,
    pending: Mutex<Pending<T>>,
}

impl<T, H> BatchingConsumer<T, H>
where
    H: BatchHandler<T>,
{
    pub fn new(handler: H, batch_size: usize) -> Result<Self, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::InvalidBatchSize { size: batch_size });
        }
        Ok(Self {
            handler,
            batch_size,
            pending: Mutex::new(Pending {
                sequence: 0,
                headers: None,
                payloads: Vec::with_capacity(batch_size),
                flushed: 0,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Pending<T>>, BatchError> {
        handle_mutex_poison(self.pending.lock(), |message| BatchError::OperationFailed { message })
    }

    /// Add one message; returns true when this call flushed a batch
    ///
    /// The handler runs synchronously on the calling thread while other
    /// producers wait, and must not call back into this consumer. A failing
    /// handler is reported here; the batch is not retried.
    pub fn accept(&self, message: Message<T>) -> Result<bool, BatchError> {
        let mut pending = self.lock()?;
        pending.sequence += 1;
        if pending.headers.is_none() {
            pending.headers = Some(message.headers);
        }
        pending.payloads.push(message.payload);

        if pending.sequence % self.batch_size as u64 != 0 {
            return Ok(false);
        }

        let batch = Self::reset(&mut pending, self.batch_size);
        pending.flushed += 1;
        log::trace!(
            "Flushing batch {} ({} payloads)",
            pending.flushed,
            batch.payload.len()
        );

        let delivered = catch_unwind(AssertUnwindSafe(|| self.handler.handle_batch(batch)))
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
        drop(pending);

        delivered
            .map(|()| true)
            .map_err(|source| BatchError::Handler { source })
    }

    fn reset(pending: &mut Pending<T>, capacity: usize) -> Message<Vec<T>> {
        let payloads = std::mem::replace(&mut pending.payloads, Vec::with_capacity(capacity));
        let headers = pending.headers.take().unwrap_or_default();
        Message::with_headers(payloads, headers)
    }

    /// Payloads waiting for the next flush
    pub fn pending_len(&self) -> Result<usize, BatchError> {
        Ok(self.lock()?.payloads.len())
    }

    /// Hand back the partial batch without delivering it
    ///
    /// The running count restarts so the next batch is a full one.
    pub fn take_pending(&self) -> Result<Option<Message<Vec<T>>>, BatchError> {
        let mut pending = self.lock()?;
        if pending.payloads.is_empty() {
            return Ok(None);
        }
        pending.sequence = 0;
        Ok(Some(Self::reset(&mut pending, self.batch_size)))
    }

    pub fn batches_flushed(&self) -> Result<u64, BatchError> {
        Ok(self.lock()?.flushed)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    type Batches = Arc<Mutex<Vec<Message<Vec<u32>>>>>;

    fn recording(batch_size: usize) -> (BatchingConsumer<u32, impl BatchHandler<u32>>, Batches) {
        let batches: Batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let consumer = BatchingConsumer::new(
            move |batch: Message<Vec<u32>>| sink.lock().unwrap().push(batch),
            batch_size,
        )
        .unwrap();
        (consumer, batches)
    }

    fn item(index: u32) -> Message<u32> {
        Message::with_headers(index, MessageHeaders::new().with("index", index.to_string()))
    }

    #[test]
    fn test_ten_items_make_two_batches() {
        let (consumer, batches) = recording(5);

        let flushes: Vec<bool> = (0..10).map(|i| consumer.accept(item(i)).unwrap()).collect();

        assert_eq!(flushes.iter().filter(|f| **f).count(), 2);
        assert!(flushes[4] && flushes[9]);
        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].payload, vec![0, 1, 2, 3, 4]);
        assert_eq!(batches[1].payload, vec![5, 6, 7, 8, 9]);
        assert_eq!(batches[0].header("index"), Some("0"));
        assert_eq!(batches[1].header("index"), Some("5"));
        assert_eq!(consumer.pending_len().unwrap(), 0);
    }

    #[test]
    fn test_partial_batch_is_never_flushed() {
        let (consumer, batches) = recording(5);

        for i in 0..7 {
            consumer.accept(item(i)).unwrap();
        }

        assert_eq!(batches.lock().unwrap().len(), 1);
        assert_eq!(consumer.pending_len().unwrap(), 2);
        assert_eq!(consumer.batches_flushed().unwrap(), 1);

        let rest = consumer.take_pending().unwrap().unwrap();
        assert_eq!(rest.payload, vec![5, 6]);
        assert_eq!(rest.header("index"), Some("5"));
        assert_eq!(batches.lock().unwrap().len(), 1, "taken batch is not delivered");
        assert!(consumer.take_pending().unwrap().is_none());
    }

    #[test]
    fn test_take_pending_restarts_count() {
        let (consumer, batches) = recording(3);
        consumer.accept(item(0)).unwrap();
        consumer.take_pending().unwrap();

        for i in 1..4 {
            consumer.accept(item(i)).unwrap();
        }
        assert_eq!(batches.lock().unwrap()[0].payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = BatchingConsumer::<u8, _>::new(|_: Message<Vec<u8>>| (), 0);
        assert!(matches!(result, Err(BatchError::InvalidBatchSize { size: 0 })));
    }

    #[test]
    fn test_handler_failure_is_returned_and_batch_reset() {
        let consumer = BatchingConsumer::<u8, _>::new(
            |batch: Message<Vec<u8>>| {
                if batch.payload[0] == 0 {
                    Err("downstream unavailable")
                } else {
                    Ok(())
                }
            },
            2,
        )
        .unwrap();

        consumer.accept(Message::new(0)).unwrap();
        let result = consumer.accept(Message::new(1));
        assert!(matches!(
            result,
            Err(BatchError::Handler { source: TaskError::Failed { .. } })
        ));
        assert_eq!(consumer.pending_len().unwrap(), 0);

        consumer.accept(Message::new(2)).unwrap();
        assert!(consumer.accept(Message::new(3)).unwrap());
    }

    #[test]
    fn test_panicking_handler_does_not_poison() {
        let consumer = BatchingConsumer::<u8, _>::new(
            |_: Message<Vec<u8>>| -> Result<(), String> { panic!("handler bug") },
            1,
        )
        .unwrap();

        let result = consumer.accept(Message::new(1));
        assert!(matches!(
            result,
            Err(BatchError::Handler { source: TaskError::Panicked { .. } })
        ));
        assert_eq!(consumer.pending_len().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_accept_loses_nothing() {
        let (consumer, batches) = recording(10);
        let consumer = Arc::new(consumer);

        let producers: Vec<_> = (0..4u32)
            .map(|producer| {
                let consumer = Arc::clone(&consumer);
                thread::spawn(move || {
                    for i in 0..250 {
                        consumer.accept(Message::new(producer * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 100);
        assert!(batches.iter().all(|batch| batch.payload.len() == 10));
        let mut seen: Vec<u32> = batches.iter().flat_map(|b| b.payload.iter().copied()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 1000);
        assert_eq!(consumer.pending_len().unwrap(), 0);
    }
}
