//! Tests for bounded submission and exactly-once execution

use super::running_executor;
use crate::executor::api::{ExecutorConfig, TaskExecutor};
use crate::queue::ProducerType;
use serial_test::serial;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
#[serial]
fn test_full_queue_blocks_fifth_submit() {
    let config = ExecutorConfig::ring_buffer("capacity-four").with_backlog(4);
    let executor = Arc::new(TaskExecutor::new(config).unwrap());
    executor.start().unwrap();

    let (release, gate) = mpsc::channel::<()>();
    let (started_tx, started) = mpsc::channel::<()>();
    executor
        .execute(move || {
            started_tx.send(()).unwrap();
            let _ = gate.recv();
        })
        .unwrap();
    started.recv_timeout(Duration::from_secs(5)).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let append = |index: usize| {
        let log = Arc::clone(&log);
        move || log.lock().unwrap().push(index)
    };
    for index in 0..4 {
        executor.execute(append(index)).unwrap();
    }

    let submitted = Arc::new(AtomicBool::new(false));
    let producer = {
        let executor = Arc::clone(&executor);
        let submitted = Arc::clone(&submitted);
        let task = append(4);
        thread::spawn(move || {
            executor.execute(task).unwrap();
            submitted.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!submitted.load(Ordering::SeqCst), "fifth submit must block on a full queue");

    release.send(()).unwrap();
    producer.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));

    executor.stop().unwrap();
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    println!("✓ Fifth submit waited for a free slot; log is [0, 1, 2, 3, 4]");
}

#[test]
#[serial]
fn test_single_producer_runs_each_task_once_in_order() {
    let config = ExecutorConfig::ring_buffer("in-order")
        .with_backlog(256)
        .with_producer_type(ProducerType::Single);
    let executor = TaskExecutor::new(config).unwrap();
    executor.start().unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for index in 0..200 {
        let log = Arc::clone(&log);
        executor.execute(move || log.lock().unwrap().push(index)).unwrap();
    }
    executor.stop().unwrap();

    assert_eq!(*log.lock().unwrap(), (0..200).collect::<Vec<_>>());
    println!("✓ 200 tasks ran exactly once in submission order");
}

#[test]
#[serial]
fn test_multi_producer_small_queue_loses_nothing() {
    let executor = Arc::new(running_executor("multi-producer", 3, 8));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let executor = Arc::clone(&executor);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for item in 0..250 {
                    let seen = Arc::clone(&seen);
                    let id = producer * 1000 + item;
                    executor.execute(move || seen.lock().unwrap().push(id)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    executor.stop().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1000, "no task lost or duplicated");
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 1000);
    println!("✓ 1000 tasks from 4 producers through an 8-slot queue ran exactly once");
}
