//! Terminal summary of a workload run

use crate::app::workload::WorkloadReport;
use colored::Colorize;

pub fn render(report: &WorkloadReport) -> String {
    let status = if report.interrupted {
        "interrupted".yellow().to_string()
    } else {
        "completed".green().to_string()
    };
    let failures = if report.failures > 0 {
        report.failures.to_string().red().to_string()
    } else {
        report.failures.to_string()
    };

    format!(
        "{} {:?} on '{}' {} in {:.2}s\n  operations: {} ({:.0}/s)\n  failures:   {}\n  {}",
        "taskring".bold(),
        report.kind,
        report.executor,
        status,
        report.elapsed.as_secs_f64(),
        report.operations,
        report.rate(),
        failures,
        report.detail.dimmed()
    )
}
