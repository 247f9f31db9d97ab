// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Worker specification.
//!
//! A worker is one unit of concurrent execution with a fixed program:
//! `iterations` repetitions of {suspend for `delay`; append one record}.
//! Specs are validated at construction and immutable afterwards, so a bad
//! parameter aborts before anything is scheduled.

use std::time::Duration;

use thiserror::Error;

/// Which engine a worker is meant to run under. Engines reject specs
/// tagged for a different mode; modes are never mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Preemptive OS thread sharing the parent's memory.
    Thread,
    /// Isolated child process, no shared memory.
    Process,
    /// Cooperative task on the single-threaded executor.
    Coroutine,
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecMode::Thread => write!(f, "thread"),
            ExecMode::Process => write!(f, "process"),
            ExecMode::Coroutine => write!(f, "coroutine"),
        }
    }
}

/// Errors from spec construction. Caller-visible and fatal — nothing has
/// been started when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("worker name must not be empty")]
    EmptyName,

    #[error("worker name {0:?} contains a newline")]
    NameContainsNewline(String),

    #[error("worker {0:?} must run at least one iteration")]
    ZeroIterations(String),
}

/// Immutable description of one worker: identity plus its delay-and-log
/// program and the engine it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    id: u32,
    name: String,
    iterations: u32,
    delay: Duration,
    mode: ExecMode,
}

impl WorkerSpec {
    /// Validate and build a spec. Names must be non-empty and single-line
    /// (a newline would break record atomicity at line granularity);
    /// iteration counts must be at least 1. Zero delay is allowed.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        iterations: u32,
        delay: Duration,
        mode: ExecMode,
    ) -> Result<Self, SpecError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        if name.contains('\n') {
            return Err(SpecError::NameContainsNewline(name));
        }
        if iterations == 0 {
            return Err(SpecError::ZeroIterations(name));
        }
        Ok(Self {
            id,
            name,
            iterations,
            delay,
            mode,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }
}
