//! taskring: a bounded, backpressure-aware task execution engine
//!
//! - [`queue`]: the fixed-capacity queue everything is built on
//! - [`executor`]: worker pools with graceful and immediate shutdown
//! - [`scheduler`]: one-shot, fixed-rate and fixed-delay scheduling
//! - [`batch`]: fixed-size batching in front of a downstream handler
//! - [`events`]: lifecycle and failure events

pub mod app;
pub mod batch;
pub mod core;
pub mod events;
pub mod executor;
pub mod queue;
pub mod scheduler;
pub mod task;
