//! Synchronization utilities for robust lock handling
//!
//! Lock poisoning only happens when a thread panics while holding a lock.
//! These helpers turn it into a domain error, or recover the guard where the
//! protected state is always valid, instead of panicking a second time.

use std::sync::{LockResult, Mutex, MutexGuard};

/// Handle poisoned mutex (or condvar wait) results with consistent error handling
///
/// Works for anything that yields a [`LockResult`]: `Mutex::lock`,
/// `Condvar::wait`, `Condvar::wait_timeout`.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use taskring::core::sync::handle_mutex_poison;
/// use taskring::queue::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(
///     mutex.lock(),
///     |message| QueueError::OperationFailed { message }
/// ).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Lock a mutex whose protected state stays consistent even if a holder panicked
///
/// Used for bookkeeping (counters, callback lists, join handles) where the
/// last written value is always valid. Logs once per recovery.
pub fn lock_recovering<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned lock: {}", what);
        poisoned.into_inner()
    })
}
