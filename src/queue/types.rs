//! Queue configuration types

use crate::queue::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};

/// Whether more than one thread may enqueue at the same time
///
/// `Single` is a caller contract. The queue stays correct either way, but
/// concurrent producers on a `Single` queue are reported at warn level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProducerType {
    Single,
    #[default]
    Multi,
}

/// How many consumers may pull from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumerType {
    /// Exactly one registered consumer (ring buffer)
    Single,
    /// Any number of competing consumers, each item goes to one (work queue)
    #[default]
    Shared,
}

impl ConsumerType {
    pub fn max_consumers(&self) -> Option<usize> {
        match self {
            ConsumerType::Single => Some(1),
            ConsumerType::Shared => None,
        }
    }
}

/// How producers wait on a full queue and consumers on an empty one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// Park on a condition variable until woken
    #[default]
    Blocking,
    /// Release the lock and yield the thread between checks
    Yielding,
    /// Release the lock and spin between checks
    BusySpin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueConfig {
    pub name: String,
    pub capacity: usize,
    #[serde(default)]
    pub producer_type: ProducerType,
    #[serde(default)]
    pub consumer_type: ConsumerType,
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            producer_type: ProducerType::default(),
            consumer_type: ConsumerType::default(),
            wait_strategy: WaitStrategy::default(),
        }
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_consumer_type(mut self, consumer_type: ConsumerType) -> Self {
        self.consumer_type = consumer_type;
        self
    }

    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategy) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_strategy_names() {
        #[derive(Deserialize)]
        struct Holder {
            strategy: WaitStrategy,
        }

        let parsed: Holder = toml::from_str("strategy = \"busy-spin\"").unwrap();
        assert_eq!(parsed.strategy, WaitStrategy::BusySpin);
        assert!(toml::from_str::<Holder>("strategy = \"sleeping\"").is_err());
    }

    #[test]
    fn test_queue_config_defaults() {
        let config: QueueConfig = toml::from_str("name = \"jobs\"\ncapacity = 16").unwrap();

        assert_eq!(config, QueueConfig::new("jobs", 16));
        assert_eq!(config.producer_type, ProducerType::Multi);
        assert_eq!(config.consumer_type.max_consumers(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = QueueConfig::new("empty", 0).validate();
        assert!(matches!(result, Err(QueueError::InvalidCapacity)));
    }
}
