//! Binary entry point wiring: arguments, configuration, logging and the
//! workload run under signal-driven shutdown

use crate::app::args::Args;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::report;
use crate::app::workload::{run_workload, WorkloadReport};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version;
use clap::Parser;
use std::io::IsTerminal;

/// Run the binary; returns the process exit code
pub fn startup() -> i32 {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    if args.print_config {
        return match config.to_toml_string() {
            Ok(rendered) => {
                print!("{}", rendered);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        return 1;
    }
    log::info!("taskring {} starting", version::long_version());

    let use_color = config
        .logging
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("FATAL: Unable to start async runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(report) => {
            println!("{}", report::render(&report));
            if report.interrupted {
                130
            } else {
                0
            }
        }
        Err(e) => {
            log_error_with_context(&e, "Workload failed");
            1
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load(args.config_file.as_deref())?;
    config.apply_args(args)?;
    config.validate()?;
    Ok(config)
}

/// Run the workload on a blocking thread; signals raise its shutdown flag
async fn run(config: AppConfig) -> Result<WorkloadReport, AppError> {
    ShutdownCoordinator::guard_with_coordinator(|coordinator, _shutdown_rx| async move {
        let flag = coordinator.flag();
        tokio::task::spawn_blocking(move || run_workload(&config, &flag))
            .await
            .map_err(|e| AppError::Workload {
                message: e.to_string(),
            })?
    })
    .await
}
