//! Command line arguments
//!
//! Every option also has a config file equivalent; values given here win.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "taskring")]
#[command(about = "Bounded task executor workload runner")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long = "print-config")]
    pub print_config: bool,

    /// Workload to run
    #[arg(short = 'w', long = "workload", value_name = "NAME", value_parser = ["throughput", "batch", "schedule"])]
    pub workload: Option<String>,

    /// How long to run the workload, in seconds
    #[arg(short = 'd', long = "duration", value_name = "SECS")]
    pub duration: Option<u64>,

    /// Producer threads submitting work
    #[arg(short = 'p', long = "producers", value_name = "COUNT")]
    pub producers: Option<usize>,

    /// Executor kind
    #[arg(short = 'k', long = "kind", value_name = "KIND", value_parser = ["ring-buffer", "work-queue"])]
    pub kind: Option<String>,

    /// Worker threads (work-queue only)
    #[arg(short = 't', long = "threads", value_name = "COUNT")]
    pub threads: Option<usize>,

    /// Executor queue capacity
    #[arg(short = 'b', long = "backlog", value_name = "SLOTS")]
    pub backlog: Option<usize>,

    /// Producer wait strategy when the queue is full
    #[arg(long = "wait-strategy", value_name = "STRATEGY", value_parser = ["blocking", "yielding", "busy-spin"])]
    pub wait_strategy: Option<String>,

    /// Messages per batch for the batch workload
    #[arg(long = "batch-size", value_name = "COUNT")]
    pub batch_size: Option<usize>,

    /// Tick period for the schedule workload, in milliseconds
    #[arg(long = "period-ms", value_name = "MILLIS")]
    pub period_ms: Option<u64>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Force coloured output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    /// Colour override from the flags; `None` leaves the decision to config or TTY
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
