// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Worker loop and the thread engine.
//!
//! The driver validates every spec's mode tag before starting anything,
//! starts all workers, then joins each one sequentially. It returns only
//! after every worker reached completion or failed — a worker that never
//! completes blocks the driver indefinitely (no timeout exists).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tandem_core::{CriticalSection, ExecMode, LockPolicy, SharedLog, WorkerSpec};
use thiserror::Error;

use crate::spawn::{self, TaskHandle};

/// Errors from driving a worker group. Worker-level failures are not
/// driver errors — they land in the report's outcomes.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("worker {name:?} is tagged {actual}, expected {expected}")]
    WrongMode {
        name: String,
        expected: ExecMode,
        actual: ExecMode,
    },

    #[error("failed to spawn worker process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Terminal result of one worker: completed, or failed with a message
/// (panic text or exit status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub name: String,
    pub result: Result<(), String>,
}

/// What the barrier hands back: one outcome per worker, in construction
/// order, plus the wall-clock duration of the whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<WorkerOutcome>,
    pub wall: Duration,
}

impl RunReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> Vec<&WorkerOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err()).collect()
    }
}

/// One worker's program: `iterations` repetitions of {sleep for `delay`;
/// append one record}. Exactly one record per iteration, counting down.
pub fn run_loop(spec: &WorkerSpec, log: &SharedLog) {
    for remaining in (1..=spec.iterations()).rev() {
        std::thread::sleep(spec.delay());
        log.append(spec.name(), format!("iterations left: {}", remaining));
    }
}

/// Reject any spec whose mode tag doesn't match the engine.
pub(crate) fn check_modes<'a>(
    specs: impl IntoIterator<Item = &'a WorkerSpec>,
    expected: ExecMode,
) -> Result<(), DriverError> {
    for spec in specs {
        if spec.mode() != expected {
            return Err(DriverError::WrongMode {
                name: spec.name().to_string(),
                expected,
                actual: spec.mode(),
            });
        }
    }
    Ok(())
}

/// Run every worker on its own OS thread under one group-wide lock
/// policy. See `run_threads_with` for the per-worker form.
pub fn run_threads(
    specs: &[WorkerSpec],
    policy: LockPolicy,
    log: &Arc<SharedLog>,
) -> Result<RunReport, DriverError> {
    let workers: Vec<(WorkerSpec, LockPolicy)> =
        specs.iter().map(|s| (s.clone(), policy)).collect();
    run_threads_with(&workers, log)
}

/// Run a worker group with a lock policy chosen per worker, and block
/// until all complete.
///
/// The critical section is owned by the group and passed to each worker
/// according to its policy: `HoldThroughout` wraps the whole loop in
/// `enter`, `Checkpoint` synchronizes once before an unguarded loop,
/// `Unguarded` never touches the section. Record-append atomicity holds
/// under all three — it comes from the log itself.
pub fn run_threads_with(
    workers: &[(WorkerSpec, LockPolicy)],
    log: &Arc<SharedLog>,
) -> Result<RunReport, DriverError> {
    check_modes(workers.iter().map(|(s, _)| s), ExecMode::Thread)?;

    let section = Arc::new(CriticalSection::new());
    let start = Instant::now();

    // Start all workers before joining any.
    let mut handles: Vec<(String, TaskHandle<()>)> = Vec::with_capacity(workers.len());
    for (spec, policy) in workers {
        let spec = spec.clone();
        let policy = *policy;
        let log = log.clone();
        let section = section.clone();
        let name = spec.name().to_string();
        let handle = spawn::spawn(move || match policy {
            LockPolicy::HoldThroughout => section.enter(|| run_loop(&spec, &log)),
            LockPolicy::Checkpoint => {
                section.checkpoint();
                run_loop(&spec, &log);
            }
            LockPolicy::Unguarded => run_loop(&spec, &log),
        });
        handles.push((name, handle));
    }

    let outcomes = join_all(handles);
    Ok(RunReport {
        outcomes,
        wall: start.elapsed(),
    })
}

/// Sequential join barrier. A panicked worker becomes a failed outcome;
/// it never cancels its siblings — every remaining handle is still joined.
pub(crate) fn join_all(handles: Vec<(String, TaskHandle<()>)>) -> Vec<WorkerOutcome> {
    handles
        .into_iter()
        .map(|(name, handle)| WorkerOutcome {
            name,
            result: handle.join().map_err(|e| e.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_spec(id: u32, name: &str, iterations: u32, delay_ms: u64) -> WorkerSpec {
        WorkerSpec::new(
            id,
            name,
            iterations,
            Duration::from_millis(delay_ms),
            ExecMode::Thread,
        )
        .unwrap()
    }

    #[test]
    fn record_count_matches_iterations() {
        let specs = vec![
            thread_spec(1, "A", 1, 2),
            thread_spec(2, "B", 2, 2),
            thread_spec(3, "C", 3, 2),
        ];
        let log = Arc::new(SharedLog::in_memory());
        let report = run_threads(&specs, LockPolicy::Unguarded, &log).unwrap();

        assert!(report.all_ok());
        // Barrier: by the time the report exists, every record is in.
        assert_eq!(log.len(), 1 + 2 + 3);
        assert_eq!(log.count_for("A"), 1);
        assert_eq!(log.count_for("B"), 2);
        assert_eq!(log.count_for("C"), 3);
    }

    #[test]
    fn per_worker_timestamps_monotonic() {
        let specs = vec![thread_spec(1, "A", 5, 1), thread_spec(2, "B", 5, 1)];
        let log = Arc::new(SharedLog::in_memory());
        run_threads(&specs, LockPolicy::Unguarded, &log).unwrap();

        for name in ["A", "B"] {
            let times: Vec<_> = log
                .snapshot()
                .into_iter()
                .filter(|r| r.worker == name)
                .map(|r| r.at)
                .collect();
            assert_eq!(times.len(), 5);
            for pair in times.windows(2) {
                assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn hold_throughout_keeps_workers_contiguous() {
        let specs = vec![
            thread_spec(1, "A", 4, 1),
            thread_spec(2, "B", 4, 1),
            thread_spec(3, "C", 4, 1),
        ];
        let log = Arc::new(SharedLog::in_memory());
        run_threads(&specs, LockPolicy::HoldThroughout, &log).unwrap();

        // Each worker's records must form one contiguous block.
        let records = log.snapshot();
        assert_eq!(records.len(), 12);
        let mut seen: Vec<String> = Vec::new();
        for r in &records {
            match seen.last() {
                Some(last) if *last == r.worker => {}
                _ => {
                    assert!(
                        !seen.contains(&r.worker),
                        "worker {} interleaved with another group",
                        r.worker
                    );
                    seen.push(r.worker.clone());
                }
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn checkpoint_policy_runs_all_workers() {
        let specs = vec![thread_spec(1, "A", 3, 1), thread_spec(2, "B", 2, 1)];
        let log = Arc::new(SharedLog::in_memory());
        let report = run_threads(&specs, LockPolicy::Checkpoint, &log).unwrap();
        assert!(report.all_ok());
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn mixed_policies_all_complete() {
        let workers = vec![
            (thread_spec(1, "Payment", 1, 1), LockPolicy::HoldThroughout),
            (thread_spec(2, "Sending Mail", 3, 1), LockPolicy::Checkpoint),
            (thread_spec(3, "Loading Page", 2, 1), LockPolicy::Checkpoint),
        ];
        let log = Arc::new(SharedLog::in_memory());
        let report = run_threads_with(&workers, &log).unwrap();
        assert!(report.all_ok());
        assert_eq!(log.count_for("Payment"), 1);
        assert_eq!(log.count_for("Sending Mail"), 3);
        assert_eq!(log.count_for("Loading Page"), 2);
    }

    #[test]
    fn wrong_mode_rejected_before_start() {
        let specs = vec![WorkerSpec::new(
            1,
            "Oops",
            1,
            Duration::from_millis(1),
            ExecMode::Coroutine,
        )
        .unwrap()];
        let log = Arc::new(SharedLog::in_memory());
        match run_threads(&specs, LockPolicy::Unguarded, &log) {
            Err(DriverError::WrongMode { name, .. }) => assert_eq!(name, "Oops"),
            other => panic!("expected WrongMode, got {:?}", other.map(|_| ())),
        }
        assert!(log.is_empty());
    }

    #[test]
    fn panicked_worker_does_not_cancel_siblings() {
        let handles = vec![
            ("bad".to_string(), spawn::spawn(|| panic!("boom"))),
            ("good".to_string(), spawn::spawn(|| ())),
        ];
        let outcomes = join_all(handles);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.as_ref().unwrap_err().contains("boom"));
        assert!(outcomes[1].result.is_ok());
    }

    #[test]
    fn report_failures_lists_only_failed() {
        let report = RunReport {
            outcomes: vec![
                WorkerOutcome {
                    name: "ok".into(),
                    result: Ok(()),
                },
                WorkerOutcome {
                    name: "bad".into(),
                    result: Err("boom".into()),
                },
            ],
            wall: Duration::ZERO,
        };
        assert!(!report.all_ok());
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "bad");
    }
}
