//! Application error types

use crate::batch::BatchError;
use crate::core::error_handling::ContextualError;
use crate::executor::api::ExecutorError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to render configuration: {source}")]
    Render {
        #[source]
        source: toml::ser::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Render { .. })
    }

    fn user_message(&self) -> Option<String> {
        match self {
            ConfigError::Render { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Workload thread failed: {message}")]
    Workload { message: String },
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            AppError::Executor(e) => e.is_user_actionable(),
            AppError::Batch(e) => e.is_user_actionable(),
            AppError::Workload { .. } => false,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Executor(e) => e.user_message(),
            AppError::Batch(e) => e.user_message(),
            AppError::Workload { .. } => None,
        }
    }
}
