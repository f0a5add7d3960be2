//! Messages and their headers

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Message metadata: string headers plus a process-unique id and a timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    id: u64,
    timestamp: SystemTime,
    values: BTreeMap<String, String>,
}

impl MessageHeaders {
    pub fn new() -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: SystemTime::now(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Headers in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for MessageHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T> {
    pub headers: MessageHeaders,
    pub payload: T,
}

impl<T> Message<T> {
    /// A message with fresh, empty headers
    pub fn new(payload: T) -> Self {
        Self::with_headers(payload, MessageHeaders::new())
    }

    pub fn with_headers(payload: T, headers: MessageHeaders) -> Self {
        Self { headers, payload }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }
}
