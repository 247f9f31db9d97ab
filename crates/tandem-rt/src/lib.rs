// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tandem runtime — the three execution engines.
//!
//! Each engine takes a set of validated `WorkerSpec`s, runs every worker's
//! delay-and-log loop to completion, and returns a `RunReport` after the
//! join barrier. Engines are never mixed within one run.
//!
//! Components:
//! - spawn   — panic-capturing thread spawn, TaskHandle join/detach
//! - driver  — worker loop, thread engine, barrier, RunReport
//! - coop    — single-threaded cooperative executor with a timer heap
//! - process — isolated child-process engine

pub mod coop;
pub mod driver;
pub mod process;
pub mod spawn;

pub use coop::run_coop;
pub use driver::{run_loop, run_threads, run_threads_with, DriverError, RunReport, WorkerOutcome};
pub use process::run_processes;
pub use spawn::{JoinError, TaskHandle};
