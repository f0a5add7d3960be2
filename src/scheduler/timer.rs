//! Single-threaded timer wheel replacement: a deadline heap on its own thread
//!
//! Callbacks are internal glue (they hand work to an executor) and run on the
//! timer thread in deadline order. Entries with equal deadlines fire in
//! submission order. Cancelled entries are swept from the heap once they
//! make up more than half of it, which releases their callbacks.

use crate::core::sync::lock_recovering;
use crate::executor::ExecutorError;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Cancellable reference to one timer entry
#[derive(Debug, Clone)]
pub struct TimerRegistration {
    state: Arc<AtomicU8>,
    core: Weak<TimerCore>,
}

impl TimerRegistration {
    fn new(core: Weak<TimerCore>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            core,
        }
    }

    /// Prevent the callback from firing; false if it already fired or was cancelled
    pub fn cancel(&self) -> bool {
        if !self.transition(CANCELLED) {
            return false;
        }
        if let Some(core) = self.core.upgrade() {
            core.note_cancelled();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    registration: TimerRegistration,
    callback: Box<dyn FnOnce() + Send + 'static>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

#[derive(Default)]
struct TimerState {
    entries: BinaryHeap<Reverse<TimerEntry>>,
    /// Cancelled entries still sitting in `entries`
    cancelled: usize,
    next_seq: u64,
    shutdown: bool,
}

struct TimerCore {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

impl TimerCore {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        lock_recovering(&self.state, "timer state")
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, TimerState>,
        timeout: Option<Duration>,
    ) -> MutexGuard<'a, TimerState> {
        match timeout {
            Some(timeout) => self
                .wakeup
                .wait_timeout(guard, timeout)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0),
            None => self
                .wakeup
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }

    fn note_cancelled(&self) {
        let swept = {
            let mut state = self.lock();
            if state.shutdown {
                return;
            }
            state.cancelled += 1;
            if state.cancelled * 2 <= state.entries.len() {
                return;
            }
            let (live, swept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.entries)
                .into_vec()
                .into_iter()
                .partition(|Reverse(entry)| entry.registration.is_pending());
            state.entries = BinaryHeap::from(live);
            state.cancelled = 0;
            swept
        };
        // callbacks may own handles whose drop runs user callbacks
        log::trace!("Swept {} cancelled timer entries", swept.len());
        drop(swept);
    }
}

/// A timer thread firing callbacks at their deadlines
pub struct Timer {
    name: String,
    core: Arc<TimerCore>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Result<Self, ExecutorError> {
        let name = name.into();
        let core = Arc::new(TimerCore {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });

        let thread_core = Arc::clone(&core);
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_timer(thread_core))
            .map_err(|source| ExecutorError::ThreadSpawn {
                name: name.clone(),
                source,
            })?;
        log::debug!("Timer '{}' started", name);

        Ok(Self {
            name,
            core,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire `callback` on the timer thread once `delay` has elapsed
    pub fn submit<F>(&self, delay: Duration, callback: F) -> Result<TimerRegistration, ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let registration = TimerRegistration::new(Arc::downgrade(&self.core));
        let deadline = Instant::now()
            .checked_add(delay)
            .ok_or_else(|| ExecutorError::IllegalConfiguration {
                message: format!("Delay {:?} is out of range", delay),
            })?;

        let mut state = self.core.lock();
        if state.shutdown {
            return Err(ExecutorError::TimerStopped {
                name: self.name.clone(),
            });
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let is_earliest = state
            .entries
            .peek()
            .map_or(true, |Reverse(head)| deadline < head.deadline);
        state.entries.push(Reverse(TimerEntry {
            deadline,
            seq,
            registration: registration.clone(),
            callback: Box::new(callback),
        }));
        drop(state);

        if is_earliest {
            self.core.wakeup.notify_one();
        }
        Ok(registration)
    }

    /// Number of entries still waiting to fire
    pub fn pending(&self) -> usize {
        self.core
            .lock()
            .entries
            .iter()
            .filter(|Reverse(entry)| entry.registration.is_pending())
            .count()
    }

    /// Entries held by the heap, cancelled ones not yet swept included
    pub fn queued(&self) -> usize {
        self.core.lock().entries.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.lock().shutdown
    }

    /// Stop the timer thread and drop every pending callback
    ///
    /// Safe to call from a timer callback; the thread is then left to exit
    /// on its own instead of being joined.
    pub fn shutdown(&self) {
        let abandoned = {
            let mut state = self.core.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.entries)
        };
        self.core.wakeup.notify_all();

        let count = abandoned.len();
        for Reverse(entry) in abandoned {
            entry.registration.cancel();
        }

        let handle = lock_recovering(&self.thread, "timer thread").take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                log::debug!("Timer '{}' shut down from its own thread", self.name);
            } else if handle.join().is_err() {
                log::warn!("Timer '{}' thread panicked", self.name);
            }
        }
        log::debug!("Timer '{}' stopped ({} entries dropped)", self.name, count);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").field("name", &self.name).finish()
    }
}

fn run_timer(core: Arc<TimerCore>) {
    let mut state = core.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = Instant::now();
        let next_deadline = state.entries.peek().map(|Reverse(entry)| entry.deadline);
        match next_deadline {
            None => state = core.wait(state, None),
            Some(deadline) if deadline > now => state = core.wait(state, Some(deadline - now)),
            Some(_) => {
                let Some(Reverse(entry)) = state.entries.pop() else {
                    continue;
                };
                if entry.registration.is_cancelled() {
                    state.cancelled = state.cancelled.saturating_sub(1);
                }
                drop(state);

                let TimerEntry {
                    registration,
                    callback,
                    ..
                } = entry;
                if registration.transition(FIRED) {
                    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                        log::warn!("Timer callback panicked");
                    }
                } else {
                    drop(callback);
                }

                state = core.lock();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_callbacks_fire_in_deadline_order() {
        let timer = Timer::new("order-timer").unwrap();
        let (tx, rx) = mpsc::channel();

        for (label, delay) in [("late", 60), ("early", 10), ("middle", 30)] {
            let tx = tx.clone();
            timer
                .submit(Duration::from_millis(delay), move || tx.send(label).unwrap())
                .unwrap();
        }

        let fired: Vec<&str> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(fired, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_cancelled_entry_never_fires() {
        let timer = Timer::new("cancel-timer").unwrap();
        let (tx, rx) = mpsc::channel::<()>();

        let registration = timer
            .submit(Duration::from_millis(30), move || tx.send(()).unwrap())
            .unwrap();
        assert_eq!(timer.pending(), 1);
        assert!(registration.cancel());
        assert!(!registration.cancel());
        assert_eq!(timer.pending(), 0);

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!registration.has_fired());
    }

    #[test]
    fn test_fired_entry_cannot_be_cancelled() {
        let timer = Timer::new("fired-timer").unwrap();
        let (tx, rx) = mpsc::channel();

        let registration = timer.submit(Duration::ZERO, move || tx.send(1).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);

        assert!(registration.has_fired());
        assert!(!registration.cancel());
    }

    #[test]
    fn test_shutdown_rejects_new_entries() {
        let timer = Timer::new("stopped-timer").unwrap();
        let registration = timer.submit(Duration::from_secs(60), || {}).unwrap();

        timer.shutdown();

        assert!(timer.is_shutdown());
        assert!(registration.is_cancelled());
        assert!(matches!(
            timer.submit(Duration::ZERO, || {}),
            Err(ExecutorError::TimerStopped { .. })
        ));
    }

    #[test]
    fn test_panicking_callback_keeps_timer_alive() {
        let timer = Timer::new("panic-timer").unwrap();
        let (tx, rx) = mpsc::channel();

        timer.submit(Duration::ZERO, || panic!("callback failure")).unwrap();
        timer
            .submit(Duration::from_millis(10), move || tx.send("after").unwrap())
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "after");
    }

    #[test]
    fn test_cancelled_entries_release_their_callbacks() {
        let timer = Timer::new("sweep-timer").unwrap();
        let payload = Arc::new(vec![0u8; 64]);

        let registrations: Vec<_> = (0..1000)
            .map(|_| {
                let held = Arc::clone(&payload);
                timer
                    .submit(Duration::from_secs(3600), move || drop(held))
                    .unwrap()
            })
            .collect();
        assert_eq!(Arc::strong_count(&payload), 1001);

        for registration in &registrations {
            assert!(registration.cancel());
        }

        assert_eq!(timer.pending(), 0);
        assert_eq!(timer.queued(), 0);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_sweep_keeps_live_entries() {
        let timer = Timer::new("partial-sweep").unwrap();
        let (tx, rx) = mpsc::channel();

        let doomed: Vec<_> = (0..6)
            .map(|_| timer.submit(Duration::from_secs(3600), || {}).unwrap())
            .collect();
        timer
            .submit(Duration::from_millis(40), move || tx.send("kept").unwrap())
            .unwrap();
        for registration in &doomed {
            registration.cancel();
        }

        assert_eq!(timer.queued(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "kept");
    }
}
