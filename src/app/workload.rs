//! Workloads driven by the runner binary
//!
//! Each workload runs on blocking threads until its duration elapses or the
//! shutdown flag is raised, then stops the executor gracefully.

use crate::app::config::{AppConfig, WorkloadConfig, WorkloadKind};
use crate::app::error::AppError;
use crate::batch::{BatchingConsumer, Message, MessageHeaders};
use crate::core::shutdown::ShutdownFlag;
use crate::executor::api::{ExecutorError, TaskExecutor};
use crate::queue::QueueError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one workload run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadReport {
    pub kind: WorkloadKind,
    pub executor: String,
    pub elapsed: Duration,
    /// Tasks run, payloads batched or ticks fired
    pub operations: u64,
    pub failures: u64,
    /// Workload-specific detail line
    pub detail: String,
    pub interrupted: bool,
}

impl WorkloadReport {
    pub fn rate(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.operations as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Sleep until `duration` elapses or shutdown is requested; true if interrupted
fn wait_for(duration: Duration, stop: &ShutdownFlag) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.is_set() {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

fn running_until(deadline: Instant, stop: &ShutdownFlag) -> bool {
    !stop.is_set() && Instant::now() < deadline
}

/// Submission rejected because the executor is shutting down
fn is_shutdown_rejection(error: &ExecutorError) -> bool {
    matches!(
        error,
        ExecutorError::NotRunning { .. } | ExecutorError::Queue(QueueError::Closed)
    )
}

pub fn run_workload(config: &AppConfig, stop: &ShutdownFlag) -> Result<WorkloadReport, AppError> {
    config.validate()?;
    let executor = TaskExecutor::new(config.executor.clone())?;
    executor.start()?;
    log::info!(
        "Running {:?} workload on '{}' ({} worker(s), backlog {}) for {}s",
        config.workload.kind,
        executor.name(),
        executor.threads(),
        config.executor.backlog,
        config.workload.duration_secs
    );

    let result = match config.workload.kind {
        WorkloadKind::Throughput => run_throughput(&executor, &config.workload, stop),
        WorkloadKind::Batch => run_batch(&executor, &config.workload, stop),
        WorkloadKind::Schedule => run_schedule(&executor, &config.workload, stop),
    };
    if let Err(e) = executor.stop() {
        log::warn!("Executor '{}' did not stop cleanly: {}", executor.name(), e);
    }
    result
}

/// Run `producers` threads calling `submit` until the deadline
fn produce<F>(workload: &WorkloadConfig, stop: &ShutdownFlag, submit: F) -> Result<bool, AppError>
where
    F: Fn(usize, u64) -> Result<(), ExecutorError> + Sync,
{
    let deadline = Instant::now() + Duration::from_secs(workload.duration_secs);
    let submit = &submit;
    let outcomes: Vec<Result<(), AppError>> = thread::scope(|scope| {
        let producers: Vec<_> = (0..workload.producers)
            .map(|producer| {
                scope.spawn(move || -> Result<(), ExecutorError> {
                    let mut sequence = 0u64;
                    while running_until(deadline, stop) {
                        match submit(producer, sequence) {
                            Ok(()) => sequence += 1,
                            Err(e) if is_shutdown_rejection(&e) => break,
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(())
                })
            })
            .collect();
        producers
            .into_iter()
            .map(|producer| match producer.join() {
                Ok(outcome) => outcome.map_err(AppError::from),
                Err(_) => Err(AppError::Workload {
                    message: "producer thread panicked".to_string(),
                }),
            })
            .collect()
    });

    for outcome in outcomes {
        outcome?;
    }
    Ok(stop.is_set())
}

fn run_throughput(
    executor: &TaskExecutor,
    workload: &WorkloadConfig,
    stop: &ShutdownFlag,
) -> Result<WorkloadReport, AppError> {
    let executed = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let interrupted = produce(workload, stop, |_, _| {
        let executed = Arc::clone(&executed);
        executor.execute(move || {
            executed.fetch_add(1, Ordering::Relaxed);
        })
    })?;
    executor.stop()?;

    let stats = executor.stats()?;
    Ok(WorkloadReport {
        kind: WorkloadKind::Throughput,
        executor: executor.name().to_string(),
        elapsed: started.elapsed(),
        operations: executed.load(Ordering::Relaxed),
        failures: stats.failed,
        detail: format!(
            "{} producer(s), backlog {}",
            workload.producers, stats.queue.capacity
        ),
        interrupted,
    })
}

fn run_batch(
    executor: &TaskExecutor,
    workload: &WorkloadConfig,
    stop: &ShutdownFlag,
) -> Result<WorkloadReport, AppError> {
    let batched = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&batched);
    let consumer = Arc::new(BatchingConsumer::new(
        move |batch: Message<Vec<u64>>| {
            sink.fetch_add(batch.payload.len() as u64, Ordering::Relaxed);
        },
        workload.batch_size,
    )?);
    let started = Instant::now();

    let interrupted = produce(workload, stop, |producer, sequence| {
        let consumer = Arc::clone(&consumer);
        let headers = MessageHeaders::new().with("producer", producer.to_string());
        executor.execute(move || consumer.accept(Message::with_headers(sequence, headers)))
    })?;
    executor.stop()?;

    let pending = consumer.pending_len()?;
    Ok(WorkloadReport {
        kind: WorkloadKind::Batch,
        executor: executor.name().to_string(),
        elapsed: started.elapsed(),
        operations: batched.load(Ordering::Relaxed),
        failures: executor.stats()?.failed,
        detail: format!(
            "{} batch(es) of {}, {} payload(s) left unflushed",
            consumer.batches_flushed()?,
            workload.batch_size,
            pending
        ),
        interrupted,
    })
}

fn run_schedule(
    executor: &TaskExecutor,
    workload: &WorkloadConfig,
    stop: &ShutdownFlag,
) -> Result<WorkloadReport, AppError> {
    let period = Duration::from_millis(workload.period_ms);
    let duration = Duration::from_secs(workload.duration_secs);
    let rate_ticks = Arc::new(AtomicU64::new(0));
    let delay_ticks = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let rate = {
        let ticks = Arc::clone(&rate_ticks);
        executor.schedule_at_fixed_rate(
            move || {
                ticks.fetch_add(1, Ordering::Relaxed);
            },
            period,
            period,
        )?
    };
    let delay = {
        let ticks = Arc::clone(&delay_ticks);
        executor.schedule_with_fixed_delay(
            move || {
                ticks.fetch_add(1, Ordering::Relaxed);
            },
            period,
            period,
        )?
    };

    let interrupted = wait_for(duration, stop);
    let elapsed = started.elapsed();
    rate.cancel();
    delay.cancel();
    executor.stop()?;

    let expected = elapsed.as_millis() / period.as_millis().max(1);
    let fixed_rate = rate_ticks.load(Ordering::Relaxed);
    let fixed_delay = delay_ticks.load(Ordering::Relaxed);
    Ok(WorkloadReport {
        kind: WorkloadKind::Schedule,
        executor: executor.name().to_string(),
        elapsed,
        operations: fixed_rate + fixed_delay,
        failures: executor.stats()?.failed,
        detail: format!(
            "fixed-rate {} tick(s) (expected ~{}), fixed-delay {} tick(s)",
            fixed_rate, expected, fixed_delay
        ),
        interrupted,
    })
}
