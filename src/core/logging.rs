//! Logger setup on top of flexi_logger
//!
//! Four line formats: plain text, extended text (with source location),
//! coloured variants of both, and compact JSON.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};

/// The logger stops when its handle drops; kept for the life of the process
static LOGGER_HANDLE: OnceLock<Mutex<flexi_logger::LoggerHandle>> = OnceLock::new();

/// Line format for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Ext,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "ext" => Ok(LogFormat::Ext),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "Unknown log format '{}' (expected text, ext or json)",
                other
            )),
        }
    }
}

/// Logging settings, merged from the config file and command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: LogFormat,
    pub file: Option<String>,
    pub color: Option<bool>,
}

impl LoggingConfig {
    fn color_enabled(&self) -> bool {
        self.file.is_none() && self.color.unwrap_or(true)
    }
}

/// Start the global logger
///
/// Only the first call installs a logger; later calls fail with the
/// flexi_logger "already initialized" error.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let mut logger = Logger::try_with_str(config.level.as_deref().unwrap_or("info"))?;

    logger = match (config.format, config.color_enabled()) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(simple_color_format),
        (LogFormat::Text, false) => logger.format(simple_format),
    };

    if let Some(file_path) = &config.file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));

    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    use colored::Colorize;

    let abbr = level_abbr(level);
    match level {
        log::Level::Error => abbr.red().bold(),
        log::Level::Warn => abbr.yellow(),
        log::Level::Info => abbr.green(),
        log::Level::Debug => abbr.blue(),
        log::Level::Trace => abbr.magenta(),
    }
}

// "YYYY-MM-DD HH:mm:ss.fff INF message"
fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args()
    )
}

// "YYYY-MM-DD HH:mm:ss.fff INF message (executor/worker.rs:42)"
fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let json_obj = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line()),
        "thread": std::thread::current().name().unwrap_or("unnamed"),
    });

    match serde_json::to_string(&json_obj) {
        Ok(line) => w.write_all(line.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// taskring::executor::worker -> executor/worker.rs:42
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = match target.strip_prefix("taskring::") {
        Some(without_prefix) => without_prefix.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };

    match line {
        Some(line_num) => format!("{}:{}", path_like, line_num),
        None => path_like,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexi_logger::DeferredNow;

    fn render(
        formatter: fn(
            &mut dyn std::io::Write,
            &mut DeferredNow,
            &log::Record,
        ) -> Result<(), std::io::Error>,
        level: log::Level,
    ) -> String {
        let mut buffer = Vec::new();
        let mut now = DeferredNow::new();
        let record = log::Record::builder()
            .level(level)
            .target("taskring::executor::worker")
            .line(Some(42))
            .args(format_args!("worker started"))
            .build();

        formatter(&mut buffer, &mut now, &record).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_format_target_as_path() {
        assert_eq!(
            format_target_as_path("taskring::scheduler::timer", Some(7)),
            "scheduler/timer.rs:7"
        );
        assert_eq!(format_target_as_path("taskring", None), "taskring");
        assert_eq!(
            format_target_as_path("flexi_logger::primary", None),
            "flexi_logger/primary"
        );
    }

    #[test]
    fn test_simple_format_omits_target() {
        let output = render(simple_format, log::Level::Info);

        assert!(output.contains("INF worker started"), "got: {}", output);
        assert!(!output.contains("executor/worker.rs"));
    }

    #[test]
    fn test_extended_format_includes_location() {
        let output = render(extended_format, log::Level::Warn);

        assert!(
            output.ends_with("WRN worker started (executor/worker.rs:42)"),
            "got: {}",
            output
        );
    }

    #[test]
    fn test_json_format_is_single_compact_object() {
        let output = render(json_format, log::Level::Error);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert!(!output.contains('\n'));
        assert_eq!(value["level"], "ERR");
        assert_eq!(value["message"], "worker started");
        assert_eq!(value["target"], "executor/worker.rs:42");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("ext".parse::<LogFormat>(), Ok(LogFormat::Ext));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_color_disabled_for_file_output() {
        let config = LoggingConfig {
            file: Some("/tmp/taskring.log".to_string()),
            ..Default::default()
        };
        assert!(!config.color_enabled());
        assert!(LoggingConfig::default().color_enabled());
    }
}
