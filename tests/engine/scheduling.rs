//! Executors sharing timers from a pool

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use taskring::executor::api::{ExecutorConfig, TaskExecutor};
use taskring::scheduler::TimerPool;

fn counting_ticker(executor: &TaskExecutor, period: Duration) -> Arc<AtomicUsize> {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    executor
        .schedule_at_fixed_rate(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            period,
            period,
        )
        .unwrap();
    ticks
}

#[test]
fn test_stopping_one_executor_leaves_shared_timer_running() {
    let pool = TimerPool::new("shared", 1).unwrap();
    let build = |name: &str| {
        let executor = TaskExecutor::builder(ExecutorConfig::work_queue(name).with_backlog(8))
            .timer(pool.next_timer())
            .build()
            .unwrap();
        executor.start().unwrap();
        executor
    };
    let first = build("first");
    let second = build("second");
    assert!(Arc::ptr_eq(first.scheduler().timer(), second.scheduler().timer()));

    let first_ticks = counting_ticker(&first, Duration::from_millis(20));
    let second_ticks = counting_ticker(&second, Duration::from_millis(20));
    thread::sleep(Duration::from_millis(150));

    first.stop().unwrap();
    let first_after_stop = first_ticks.load(Ordering::SeqCst);
    let second_before = second_ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));

    assert_eq!(first_ticks.load(Ordering::SeqCst), first_after_stop);
    assert!(second_ticks.load(Ordering::SeqCst) > second_before);
    assert!(!second.scheduler().timer().is_shutdown());

    second.stop().unwrap();
    pool.shutdown();
    println!("✓ One executor's stop cancels only its own schedules");
}

#[test]
fn test_delayed_tasks_across_round_robin_timers() {
    let pool = TimerPool::new("spread", 3).unwrap();
    let executors: Vec<TaskExecutor> = (0..3)
        .map(|i| {
            let executor = TaskExecutor::builder(ExecutorConfig::work_queue(format!("spread-{}", i)))
                .timer(pool.next_timer())
                .build()
                .unwrap();
            executor.start().unwrap();
            executor
        })
        .collect();

    let handles: Vec<_> = executors
        .iter()
        .enumerate()
        .map(|(i, executor)| {
            executor
                .schedule(move || i * 10, Duration::from_millis(30))
                .unwrap()
        })
        .collect();
    let results: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.get_timeout(Duration::from_secs(5)).unwrap())
        .collect();

    assert_eq!(results, vec![0, 10, 20]);
    for executor in &executors {
        executor.stop().unwrap();
    }
    println!("✓ Three executors on three pooled timers each ran their delayed task");
}
