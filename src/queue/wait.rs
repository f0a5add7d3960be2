//! Wait strategy implementations
//!
//! Each strategy takes the held guard, waits once, and hands back a fresh
//! guard. Callers re-check their condition in a loop.

use crate::core::sync::handle_mutex_poison;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::types::WaitStrategy;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

const SPIN_TRIES: u32 = 64;

impl WaitStrategy {
    pub(crate) fn idle<'a, S>(
        &self,
        mutex: &'a Mutex<S>,
        condvar: &Condvar,
        guard: MutexGuard<'a, S>,
        deadline: Option<Instant>,
    ) -> QueueResult<MutexGuard<'a, S>> {
        match self {
            WaitStrategy::Blocking => match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let (guard, _) =
                        handle_mutex_poison(condvar.wait_timeout(guard, remaining), poisoned)?;
                    Ok(guard)
                }
                None => handle_mutex_poison(condvar.wait(guard), poisoned),
            },
            WaitStrategy::Yielding => {
                drop(guard);
                std::thread::yield_now();
                handle_mutex_poison(mutex.lock(), poisoned)
            }
            WaitStrategy::BusySpin => {
                drop(guard);
                for _ in 0..SPIN_TRIES {
                    std::hint::spin_loop();
                }
                handle_mutex_poison(mutex.lock(), poisoned)
            }
        }
    }
}

pub(crate) fn poisoned(message: String) -> QueueError {
    QueueError::OperationFailed { message }
}
