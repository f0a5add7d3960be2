//! Command line workload runner

pub mod args;
pub mod config;
pub mod error;
pub mod report;
pub mod startup;
pub mod workload;

pub use config::{AppConfig, WorkloadConfig, WorkloadKind};
pub use error::{AppError, ConfigError};
