// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! CriticalSection — closure-scoped mutual exclusion.
//!
//! Owned by whichever component constructs the worker group and passed
//! explicitly; no hidden global lock. Closure-based access — no guard
//! objects, no escaping references.

use std::sync;

/// How a worker uses the group's critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Never touch the section.
    Unguarded,
    /// Hold the section for the entire logging loop, serializing all
    /// output from the worker group.
    HoldThroughout,
    /// Acquire and release once at a synchronization checkpoint, then
    /// run unguarded.
    Checkpoint,
}

/// Mutual-exclusion guard: at most one worker executes an entered region
/// at any instant. Acquisition order across contenders is whatever the
/// underlying mutex provides.
pub struct CriticalSection {
    inner: sync::Mutex<()>,
}

impl CriticalSection {
    pub fn new() -> Self {
        Self {
            inner: sync::Mutex::new(()),
        }
    }

    /// Acquire the section and run `f` with it held.
    pub fn enter<R, F: FnOnce() -> R>(&self, f: F) -> R {
        let _guard = match self.inner.lock() {
            Ok(guard) => guard,
            // Recover from poison — a panicked holder doesn't invalidate
            // the section, there is no protected data to corrupt.
            Err(poisoned) => poisoned.into_inner(),
        };
        f()
    }

    /// Try to acquire without blocking; returns None if contended.
    pub fn try_enter<R, F: FnOnce() -> R>(&self, f: F) -> Option<R> {
        match self.inner.try_lock() {
            Ok(_guard) => Some(f()),
            Err(sync::TryLockError::WouldBlock) => None,
            Err(sync::TryLockError::Poisoned(poisoned)) => {
                let _guard = poisoned.into_inner();
                Some(f())
            }
        }
    }

    /// Acquire and immediately release — a pure synchronization point.
    pub fn checkpoint(&self) {
        self.enter(|| ());
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}
