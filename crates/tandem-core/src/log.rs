// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! SharedLog — append-only, order-observable record sink.
//!
//! One mutex guards the record vector and the sink write together, so a
//! single `append` is atomic at line granularity: under concurrent writers
//! no two records interleave mid-line. This holds with or without a
//! `CriticalSection` around the caller's loop.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One log record: elapsed time since the log was created, the worker that
/// wrote it, and a free-form message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogRecord {
    /// Elapsed time from the log's creation instant (monotonic clock).
    pub at: Duration,
    pub worker: String,
    pub message: String,
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:8.3}s [{}] {}",
            self.at.as_secs_f64(),
            self.worker,
            self.message
        )
    }
}

enum Sink {
    Stdout,
    Memory,
}

struct LogInner {
    records: Vec<LogRecord>,
    sink: Sink,
}

/// The shared output sink. The only shared mutable resource under the
/// threaded model; a logging sink, not a data store — no transactions,
/// no rollback.
pub struct SharedLog {
    epoch: Instant,
    inner: Mutex<LogInner>,
}

impl SharedLog {
    /// Log that writes each record as one line to standard output.
    pub fn to_stdout() -> Self {
        Self::with_sink(Sink::Stdout)
    }

    /// Log that only retains records, for assertions in tests and reports.
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory)
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            epoch: Instant::now(),
            inner: Mutex::new(LogInner {
                records: Vec::new(),
                sink,
            }),
        }
    }

    /// Append one record. The timestamp is taken inside the critical
    /// region, so records in the vector are globally non-decreasing.
    pub fn append(&self, worker: &str, message: impl Into<String>) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            // Recover from poison — a panicked writer leaves prior records
            // intact, and the sink only ever sees whole lines.
            Err(poisoned) => poisoned.into_inner(),
        };
        let record = LogRecord {
            at: self.epoch.elapsed(),
            worker: worker.to_string(),
            message: message.into(),
        };
        if let Sink::Stdout = inner.sink {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", record);
        }
        inner.records.push(record);
    }

    /// Copy of every record appended so far, in append order.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        match self.inner.lock() {
            Ok(guard) => guard.records.clone(),
            Err(poisoned) => poisoned.into_inner().records.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.records.len(),
            Err(poisoned) => poisoned.into_inner().records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records attributed to `worker`.
    pub fn count_for(&self, worker: &str) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.records.iter().filter(|r| r.worker == worker).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .records
                .iter()
                .filter(|r| r.worker == worker)
                .count(),
        }
    }
}
