//! Shutdown coordination for the runner binary
//!
//! Signals flip a shared flag and broadcast to async subscribers. Blocking
//! workload threads poll the flag through [`ShutdownFlag`]; a second signal
//! exits the process immediately.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cloneable read side of the shutdown flag for non-async code
#[derive(Debug, Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let coordinator = Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, shutdown_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn flag(&self) -> ShutdownFlag {
        ShutdownFlag(Arc::clone(&self.shutdown_requested))
    }

    pub fn trigger_shutdown(&self) {
        // Release pairs with the Acquire loads in is_shutdown_requested / ShutdownFlag
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Run a future with signal handlers installed, handing it the coordinator
    ///
    /// Must be called from within a tokio runtime.
    pub async fn guard_with_coordinator<F, Fut, R, E>(future_fn: F) -> Result<R, E>
    where
        F: FnOnce(Self, broadcast::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = Result<R, E>>,
    {
        let (coordinator, shutdown_rx) = Self::new();
        install_signal_handlers(
            coordinator.shutdown_tx.clone(),
            Arc::clone(&coordinator.shutdown_requested),
        );
        future_fn(coordinator, shutdown_rx).await
    }
}

fn on_signal(
    tx: &broadcast::Sender<()>,
    requested: &AtomicBool,
    signal_count: &AtomicUsize,
    name: &str,
) {
    let previous = signal_count.fetch_add(1, Ordering::AcqRel);
    requested.store(true, Ordering::Release);
    let _ = tx.send(());
    if previous >= 1 {
        log::warn!("Second {} received; exiting without draining", name);
        std::process::exit(130);
    }
    log::info!("{} received; stopping executors", name);
}

fn install_signal_handlers(shutdown_tx: broadcast::Sender<()>, shutdown_requested: Arc<AtomicBool>) {
    let signal_count = Arc::new(AtomicUsize::new(0));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        // Restore default SIGPIPE so piping output to `head` terminates quietly
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        let signals = [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::hangup(), "SIGHUP"),
        ];
        for (kind, name) in signals {
            let tx = shutdown_tx.clone();
            let requested = Arc::clone(&shutdown_requested);
            let count = Arc::clone(&signal_count);
            tokio::spawn(async move {
                match signal(kind) {
                    Ok(mut stream) => {
                        while stream.recv().await.is_some() {
                            on_signal(&tx, &requested, &count, name);
                        }
                    }
                    Err(e) => log::warn!("Unable to install {} handler: {}", name, e),
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                on_signal(&shutdown_tx, &shutdown_requested, &signal_count, "Ctrl-C");
            }
        });
    }
}
