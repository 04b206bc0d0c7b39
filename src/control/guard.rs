//! Single-flight guard around the control loop's entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

#[derive(Debug, Default)]
pub struct RunGuard {
    lock: Mutex<()>,
    busy: AtomicBool,
}

/// Held for the duration of one cycle.
#[derive(Debug)]
pub struct RunPermit<'a> {
    _lock: MutexGuard<'a, ()>,
    busy: &'a AtomicBool,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other cycle is running.
    pub fn acquire(&self) -> RunPermit<'_> {
        // A panicking cycle leaves no state behind the mutex.
        let lock = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.permit(lock)
    }

    /// `None` while another cycle is running.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        let lock = match self.lock.try_lock() {
            Ok(lock) => lock,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(self.permit(lock))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn permit<'a>(&'a self, lock: MutexGuard<'a, ()>) -> RunPermit<'a> {
        self.busy.store(true, Ordering::SeqCst);
        RunPermit {
            _lock: lock,
            busy: &self.busy,
        }
    }
}
