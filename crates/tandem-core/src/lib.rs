// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tandem core — data model for the concurrent task runner.
//!
//! Components:
//! - worker  — WorkerSpec: identity, iteration program, execution-mode tag
//! - log     — SharedLog: append-atomic, order-observable record sink
//! - section — CriticalSection: closure-scoped mutual exclusion + LockPolicy

pub mod log;
pub mod section;
pub mod worker;

pub use log::{LogRecord, SharedLog};
pub use section::{CriticalSection, LockPolicy};
pub use worker::{ExecMode, SpecError, WorkerSpec};
