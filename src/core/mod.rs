//! Core services and infrastructure

pub mod error_handling;
pub mod lifecycle;
pub mod logging;
pub mod shutdown;
pub mod sync;
pub mod version;
