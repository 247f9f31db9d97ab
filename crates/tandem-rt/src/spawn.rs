// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Thread spawn with panic capture.
//!
//! `spawn` creates an OS thread; `TaskHandle` wraps its `JoinHandle` and
//! converts a panic into `JoinError::Panicked` so one worker's failure
//! stays with that worker.

use std::thread::{self, JoinHandle};

/// Error returned by `join()` when the task failed.
#[derive(Debug)]
pub enum JoinError {
    /// Task panicked with the given message.
    Panicked(String),
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::Panicked(msg) => write!(f, "task panicked: {}", msg),
        }
    }
}

impl std::error::Error for JoinError {}

/// Handle to a spawned task. Consumed via `join()` or `detach()`.
pub struct TaskHandle<T> {
    handle: JoinHandle<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to complete, returning its result.
    pub fn join(self) -> Result<T, JoinError> {
        match self.handle.join() {
            Ok(Ok(val)) => Ok(val),
            Ok(Err(msg)) => Err(JoinError::Panicked(msg)),
            Err(_) => Err(JoinError::Panicked("thread panicked".to_string())),
        }
    }

    /// Fire-and-forget — the thread continues running independently.
    pub fn detach(self) {
        drop(self.handle);
    }
}

/// Spawn a closure on a new OS thread, capturing panics into the result.
pub fn spawn<T, F>(f: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = thread::spawn(move || {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
            Ok(val) => Ok(val),
            Err(payload) => Err(panic_message(payload)),
        }
    });
    TaskHandle { handle }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_join() {
        let h = spawn(|| 42);
        assert_eq!(h.join().unwrap(), 42);
    }

    #[test]
    fn spawn_and_detach() {
        let h = spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(10));
        });
        h.detach();
    }

    #[test]
    fn spawn_panic_returns_join_error() {
        let h = spawn(|| -> i32 { panic!("boom") });
        match h.join() {
            Err(JoinError::Panicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected Panicked, got {:?}", other),
        }
    }

    #[test]
    fn panic_in_one_does_not_affect_another() {
        let bad = spawn(|| -> i32 { panic!("boom") });
        let good = spawn(|| 7);
        assert!(bad.join().is_err());
        assert_eq!(good.join().unwrap(), 7);
    }
}
