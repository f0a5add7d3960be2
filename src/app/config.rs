//! TOML configuration file loading
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "ext"
//!
//! [executor]
//! name = "bench"
//! kind = "work-queue"
//! threads = 4
//! backlog = 1024
//!
//! [workload]
//! kind = "throughput"
//! duration-secs = 10
//! ```

use crate::app::args::Args;
use crate::app::error::ConfigError;
use crate::core::logging::{LogFormat, LoggingConfig};
use crate::executor::api::{ExecutorConfig, ExecutorKind};
use crate::queue::WaitStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadKind {
    /// Submit no-op tasks as fast as possible
    #[default]
    Throughput,
    /// Push messages through a batching consumer
    Batch,
    /// Run fixed-rate and fixed-delay tickers
    Schedule,
}

impl FromStr for WorkloadKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throughput" => Ok(WorkloadKind::Throughput),
            "batch" => Ok(WorkloadKind::Batch),
            "schedule" => Ok(WorkloadKind::Schedule),
            other => Err(ConfigError::Invalid {
                message: format!("unknown workload '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkloadConfig {
    pub kind: WorkloadKind,
    pub duration_secs: u64,
    pub producers: usize,
    pub batch_size: usize,
    pub period_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            kind: WorkloadKind::default(),
            duration_secs: 5,
            producers: 2,
            batch_size: 100,
            period_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub executor: ExecutorConfig,
    pub workload: WorkloadConfig,
}

impl AppConfig {
    /// `<config_dir>/Taskring/taskring.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Taskring").join("taskring.toml"))
    }

    /// Load from `path`, or from the default location when present
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { source })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Render { source })
    }

    /// Overlay command line values onto the file configuration
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(level) = &args.log_level {
            self.logging.level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            self.logging.format = LogFormat::from_str(format).map_err(|message| ConfigError::Invalid { message })?;
        }
        match args.log_file.as_deref() {
            Some("none") => self.logging.file = None,
            Some(file) => self.logging.file = Some(file.to_string()),
            None => {}
        }
        if let Some(color) = args.color_override() {
            self.logging.color = Some(color);
        }

        if let Some(kind) = &args.kind {
            self.executor.kind = parse_executor_kind(kind)?;
        }
        if let Some(threads) = args.threads {
            self.executor
                .set_threads(threads)
                .map_err(|e| ConfigError::Invalid {
                    message: e.to_string(),
                })?;
        }
        if let Some(backlog) = args.backlog {
            self.executor.backlog = backlog;
        }
        if let Some(strategy) = &args.wait_strategy {
            self.executor.wait_strategy = parse_wait_strategy(strategy)?;
        }

        if let Some(workload) = &args.workload {
            self.workload.kind = workload.parse()?;
        }
        if let Some(duration) = args.duration {
            self.workload.duration_secs = duration;
        }
        if let Some(producers) = args.producers {
            self.workload.producers = producers;
        }
        if let Some(batch_size) = args.batch_size {
            self.workload.batch_size = batch_size;
        }
        if let Some(period_ms) = args.period_ms {
            self.workload.period_ms = period_ms;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.executor.validate().map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
        if self.workload.producers == 0 {
            return Err(ConfigError::Invalid {
                message: "workload needs at least one producer".to_string(),
            });
        }
        if self.workload.batch_size == 0 || self.workload.period_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "batch-size and period-ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_executor_kind(value: &str) -> Result<ExecutorKind, ConfigError> {
    match value {
        "ring-buffer" => Ok(ExecutorKind::RingBuffer),
        "work-queue" => Ok(ExecutorKind::WorkQueue),
        other => Err(ConfigError::Invalid {
            message: format!("unknown executor kind '{}'", other),
        }),
    }
}

fn parse_wait_strategy(value: &str) -> Result<WaitStrategy, ConfigError> {
    match value {
        "blocking" => Ok(WaitStrategy::Blocking),
        "yielding" => Ok(WaitStrategy::Yielding),
        "busy-spin" => Ok(WaitStrategy::BusySpin),
        other => Err(ConfigError::Invalid {
            message: format!("unknown wait strategy '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_parse_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [executor]
            name = "bench"
            kind = "ring-buffer"
            backlog = 64
            wait-strategy = "yielding"

            [workload]
            kind = "schedule"
            period-ms = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.executor.name, "bench");
        assert_eq!(config.executor.kind, ExecutorKind::RingBuffer);
        assert_eq!(config.executor.backlog, 64);
        assert_eq!(config.executor.wait_strategy, WaitStrategy::Yielding);
        assert_eq!(config.workload.kind, WorkloadKind::Schedule);
        assert_eq!(config.workload.period_ms, 25);
        assert_eq!(config.workload.duration_secs, 5, "unset fields keep defaults");
    }

    #[test]
    fn test_round_trip() {
        let mut config = AppConfig::default();
        config.executor.backlog = 512;
        config.workload.kind = WorkloadKind::Batch;

        let rendered = config.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workload]\nproducers = 8").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.workload.producers, 8);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[executor\nname ="),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_args_override_file() {
        let mut config = AppConfig::from_toml_str("[executor]\nbacklog = 8\n[logging]\nfile = \"run.log\"").unwrap();
        let args = Args::try_parse_from([
            "taskring", "-b", "32", "-w", "batch", "-f", "none", "-o", "ext",
        ])
        .unwrap();

        config.apply_args(&args).unwrap();
        assert_eq!(config.executor.backlog, 32);
        assert_eq!(config.workload.kind, WorkloadKind::Batch);
        assert_eq!(config.logging.file, None);
        assert_eq!(config.logging.format, LogFormat::Ext);
    }

    #[test]
    fn test_ring_buffer_threads_rejected() {
        let mut config = AppConfig::default();
        let args = Args::try_parse_from(["taskring", "-k", "ring-buffer", "-t", "4"]).unwrap();

        assert!(matches!(
            config.apply_args(&args),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_producers() {
        let mut config = AppConfig::default();
        config.workload.producers = 0;
        assert!(config.validate().is_err());
        config.workload.producers = 1;
        assert!(config.validate().is_ok());
    }
}
