//! Signal-style shutdown of a running executor

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskring::core::shutdown::ShutdownCoordinator;
use taskring::executor::api::{ExecutorConfig, ExecutorState, TaskExecutor};

#[tokio::test]
async fn test_shutdown_broadcast_stops_executor_gracefully() {
    let (coordinator, mut shutdown_rx) = ShutdownCoordinator::new();
    let executor = Arc::new(TaskExecutor::new(ExecutorConfig::work_queue("signalled").with_backlog(128)).unwrap());
    executor.start().unwrap();

    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let completed = Arc::clone(&completed);
        executor
            .execute(move || {
                std::thread::sleep(Duration::from_millis(1));
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let stopper = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            tokio::task::spawn_blocking(move || executor.stop())
                .await
                .unwrap()
        })
    };
    coordinator.trigger_shutdown();
    tokio::time::timeout(Duration::from_secs(10), stopper)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 100);
    assert_eq!(executor.state(), ExecutorState::Stopped);
    println!("✓ Shutdown broadcast drained all 100 queued tasks");
}
