//! Batching consumer
//!
//! Accumulates messages and hands them downstream `batch_size` at a time.
//!
//! ```text
//!   producers ──accept──> [ p0 p1 p2 .. p(n-1) ] ──flush──> BatchHandler
//!                          headers of p0 ─────────────────^
//! ```

mod consumer;
mod error;
mod message;

pub use consumer::{BatchHandler, BatchingConsumer};
pub use error::BatchError;
pub use message::{Message, MessageHeaders};
