//! Engine integration test modules

pub mod pipeline;
pub mod scheduling;
pub mod shutdown;
