//! Executor configuration

use crate::executor::error::ExecutorError;
use crate::queue::{ConsumerType, ProducerType, QueueConfig, WaitStrategy};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKLOG: usize = 2048;

/// Which consumer arrangement the executor's queue uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// One worker thread; tasks run strictly in queue order
    RingBuffer,
    /// A pool of competing worker threads
    #[default]
    WorkQueue,
}

impl ExecutorKind {
    fn consumer_type(&self) -> ConsumerType {
        match self {
            ExecutorKind::RingBuffer => ConsumerType::Single,
            ExecutorKind::WorkQueue => ConsumerType::Shared,
        }
    }
}

/// What happens to queued tasks on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownMode {
    /// Run every queued task before the workers exit
    #[default]
    Graceful,
    /// Discard queued tasks; running tasks finish
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExecutorConfig {
    pub name: String,
    pub kind: ExecutorKind,
    /// Worker threads; `None` picks the kind's default
    pub threads: Option<usize>,
    /// Queue capacity
    pub backlog: usize,
    pub producer_type: ProducerType,
    pub wait_strategy: WaitStrategy,
    pub auto_startup: bool,
    pub phase: i32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new("taskring", ExecutorKind::default())
    }
}

impl ExecutorConfig {
    pub fn new(name: impl Into<String>, kind: ExecutorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            threads: None,
            backlog: DEFAULT_BACKLOG,
            producer_type: ProducerType::Multi,
            wait_strategy: WaitStrategy::Blocking,
            auto_startup: true,
            phase: 0,
        }
    }

    pub fn ring_buffer(name: impl Into<String>) -> Self {
        Self::new(name, ExecutorKind::RingBuffer)
    }

    pub fn work_queue(name: impl Into<String>) -> Self {
        Self::new(name, ExecutorKind::WorkQueue)
    }

    /// Set the worker count, rejecting counts the kind cannot honour
    pub fn set_threads(&mut self, threads: usize) -> Result<&mut Self, ExecutorError> {
        if self.kind == ExecutorKind::RingBuffer && threads != 1 {
            log::warn!(
                "Executor '{}' is a ring buffer executor and always uses one thread; refusing {}",
                self.name,
                threads
            );
            return Err(ExecutorError::illegal(format!(
                "ring buffer executor '{}' requires exactly 1 thread, got {}",
                self.name, threads
            )));
        }
        if threads == 0 {
            return Err(ExecutorError::illegal("thread count must be greater than zero"));
        }
        self.threads = Some(threads);
        Ok(self)
    }

    pub fn with_threads(mut self, threads: usize) -> Result<Self, ExecutorError> {
        self.set_threads(threads)?;
        Ok(self)
    }

    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategy) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn with_auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    pub fn with_phase(mut self, phase: i32) -> Self {
        self.phase = phase;
        self
    }

    /// Worker count after applying the kind's default
    pub fn effective_threads(&self) -> usize {
        match (self.kind, self.threads) {
            (ExecutorKind::RingBuffer, _) => 1,
            (ExecutorKind::WorkQueue, Some(threads)) => threads,
            (ExecutorKind::WorkQueue, None) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Check every field; values loaded from files bypass `set_threads`
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.name.trim().is_empty() {
            return Err(ExecutorError::illegal("executor name must not be empty"));
        }
        if self.backlog == 0 {
            return Err(ExecutorError::illegal("backlog must be greater than zero"));
        }
        match (self.kind, self.threads) {
            (_, Some(0)) => Err(ExecutorError::illegal(
                "thread count must be greater than zero",
            )),
            (ExecutorKind::RingBuffer, Some(threads)) if threads != 1 => {
                Err(ExecutorError::illegal(format!(
                    "ring buffer executor '{}' requires exactly 1 thread, got {}",
                    self.name, threads
                )))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(format!("{}-queue", self.name), self.backlog)
            .with_producer_type(self.producer_type)
            .with_consumer_type(self.kind.consumer_type())
            .with_wait_strategy(self.wait_strategy)
    }
}
