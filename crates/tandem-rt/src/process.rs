// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Isolated child-process engine.
//!
//! Each worker runs in its own process: no shared memory, no shared log
//! object. Children inherit stdout and write their own records; the OS
//! interleaves their output at line granularity. Completion is observable
//! only through the wait barrier.
//!
//! The caller supplies the spec-to-argv mapping, so the engine stays
//! independent of any particular re-exec protocol.

use std::process::{Child, Command};
use std::time::Instant;

use tandem_core::{ExecMode, WorkerSpec};

use crate::driver::{check_modes, DriverError, RunReport, WorkerOutcome};

/// Spawn one child per worker, then wait on each sequentially.
///
/// All children are started before any is waited on. A spawn failure is
/// fatal; a nonzero exit is that worker's failed outcome and never cancels
/// its siblings — the barrier still waits for every child.
pub fn run_processes<F>(specs: &[WorkerSpec], command_for: F) -> Result<RunReport, DriverError>
where
    F: Fn(&WorkerSpec) -> Command,
{
    check_modes(specs, ExecMode::Process)?;

    let start = Instant::now();

    let mut children: Vec<(String, Child)> = Vec::with_capacity(specs.len());
    for spec in specs {
        let child = command_for(spec).spawn()?;
        children.push((spec.name().to_string(), child));
    }

    let outcomes = children
        .into_iter()
        .map(|(name, mut child)| {
            let result = match child.wait() {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(format!("exited with {}", status)),
                Err(e) => Err(format!("wait failed: {}", e)),
            };
            WorkerOutcome { name, result }
        })
        .collect();

    Ok(RunReport {
        outcomes,
        wall: start.elapsed(),
    })
}
