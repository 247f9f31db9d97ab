// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Scenario definitions.
//!
//! Worker names, iteration counts, and relative delays mirror the
//! classic demos: a plain two-thread run, a three-way lock demo
//! (Payment / Sending Mail / Loading Page), a two-process run, and a
//! three-task cooperative run whose elapsed time shows the overlap.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tandem_core::{ExecMode, LockPolicy, SharedLog, SpecError, WorkerSpec};
use tandem_rt::{run_coop, run_loop, run_processes, run_threads_with, DriverError, RunReport};

/// Options shared by all scenarios.
pub struct Options {
    /// Base delay; each worker's delay is a fixed multiple of this.
    pub tick: Duration,
    /// Collect records in memory and dump them as JSON lines at the end,
    /// instead of streaming human-readable lines.
    pub json: bool,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut tick = Duration::from_millis(1000);
        let mut json = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--tick-ms" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| "--tick-ms requires a value".to_string())?;
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| format!("invalid --tick-ms value: {}", value))?;
                    tick = Duration::from_millis(ms);
                }
                "--json" => json = true,
                other => return Err(format!("unknown option: {}", other)),
            }
        }
        Ok(Self { tick, json })
    }

    fn log(&self) -> Arc<SharedLog> {
        if self.json {
            Arc::new(SharedLog::in_memory())
        } else {
            Arc::new(SharedLog::to_stdout())
        }
    }
}

/// (id, name, iterations, delay as a multiple of the tick)
type WorkerRow = (u32, &'static str, u32, f64);

fn build(rows: &[WorkerRow], tick: Duration, mode: ExecMode) -> Result<Vec<WorkerSpec>, SpecError> {
    rows.iter()
        .map(|&(id, name, iterations, factor)| {
            WorkerSpec::new(id, name, iterations, tick.mul_f64(factor), mode)
        })
        .collect()
}

/// Two thread workers with different iteration counts, no lock.
pub fn threads(opts: &Options) -> i32 {
    banner("threads: two preemptive workers");
    let specs = match build(
        &[(1, "Thread-1", 1, 1.0), (2, "Thread-2", 2, 1.0)],
        opts.tick,
        ExecMode::Thread,
    ) {
        Ok(specs) => specs,
        Err(e) => return spec_error(&e),
    };
    let workers: Vec<_> = specs
        .into_iter()
        .map(|s| (s, LockPolicy::Unguarded))
        .collect();

    let log = opts.log();
    match run_threads_with(&workers, &log) {
        Ok(report) => finish(&report, Some(&log), opts),
        Err(e) => driver_error(&e),
    }
}

/// Three thread workers sharing one critical section: Payment holds it
/// for its whole loop, the other two only synchronize at a checkpoint.
pub fn locked(opts: &Options) -> i32 {
    banner("locked: three workers, one critical section");
    let specs = match build(
        &[
            (1, "Payment", 1, 1.0),
            (2, "Sending Mail", 5, 1.0),
            (3, "Loading Page", 3, 1.0),
        ],
        opts.tick,
        ExecMode::Thread,
    ) {
        Ok(specs) => specs,
        Err(e) => return spec_error(&e),
    };
    let policies = [
        LockPolicy::HoldThroughout,
        LockPolicy::Checkpoint,
        LockPolicy::Checkpoint,
    ];
    let workers: Vec<_> = specs.into_iter().zip(policies).collect();

    let log = opts.log();
    match run_threads_with(&workers, &log) {
        Ok(report) => finish(&report, Some(&log), opts),
        Err(e) => driver_error(&e),
    }
}

/// Two isolated child processes, each re-execing this binary with the
/// hidden `__worker` argv. Children write to their own stdout; the OS
/// interleaves lines.
pub fn processes(opts: &Options) -> i32 {
    banner("processes: two isolated workers");
    let specs = match build(
        &[(1, "Process-1", 5, 1.0), (2, "Process-2", 5, 2.0)],
        opts.tick,
        ExecMode::Process,
    ) {
        Ok(specs) => specs,
        Err(e) => return spec_error(&e),
    };

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("{} cannot locate own executable: {}", error_label(), e);
            return 1;
        }
    };

    let report = run_processes(&specs, |spec| {
        let mut cmd = Command::new(&exe);
        cmd.arg("__worker")
            .arg(spec.id().to_string())
            .arg(spec.name())
            .arg(spec.iterations().to_string())
            .arg(spec.delay().as_millis().to_string());
        cmd
    });
    match report {
        Ok(report) => finish(&report, None, opts),
        Err(e) => driver_error(&e),
    }
}

/// Three cooperative tasks on one thread. The elapsed time in the summary
/// approximates the longest task's total, not the sum of all of them.
pub fn coop(opts: &Options) -> i32 {
    banner("coop: three cooperative tasks, one thread");
    let specs = match build(
        &[
            (1, "Task-A", 5, 1.0),
            (2, "Task-B", 5, 2.0),
            (3, "Task-C", 4, 1.5),
        ],
        opts.tick,
        ExecMode::Coroutine,
    ) {
        Ok(specs) => specs,
        Err(e) => return spec_error(&e),
    };

    let log = opts.log();
    match run_coop(&specs, &log) {
        Ok(report) => finish(&report, Some(&log), opts),
        Err(e) => driver_error(&e),
    }
}

/// Hidden child entry: `tandem __worker <id> <name> <iterations> <delay-ms>`.
/// Runs one worker loop against its own stdout log and exits 0.
pub fn child_worker(args: &[String]) -> i32 {
    let [id, name, iterations, delay_ms] = args else {
        eprintln!("Usage: tandem __worker <id> <name> <iterations> <delay-ms>");
        return 1;
    };
    let parsed = (|| -> Result<(u32, u32, u64), std::num::ParseIntError> {
        Ok((id.parse()?, iterations.parse()?, delay_ms.parse()?))
    })();
    let (id, iterations, delay_ms) = match parsed {
        Ok(values) => values,
        Err(e) => {
            eprintln!("{} invalid worker argument: {}", error_label(), e);
            return 1;
        }
    };

    let spec = match WorkerSpec::new(
        id,
        name.as_str(),
        iterations,
        Duration::from_millis(delay_ms),
        ExecMode::Process,
    ) {
        Ok(spec) => spec,
        Err(e) => return spec_error(&e),
    };

    let log = SharedLog::to_stdout();
    run_loop(&spec, &log);
    0
}

fn banner(title: &str) {
    println!("=== {} ===", title);
}

fn error_label() -> colored::ColoredString {
    "error:".red().bold()
}

fn spec_error(e: &SpecError) -> i32 {
    eprintln!("{} {}", error_label(), e);
    1
}

fn driver_error(e: &DriverError) -> i32 {
    eprintln!("{} {}", error_label(), e);
    1
}

/// Print the post-barrier summary (and the JSON dump when asked for).
/// Returns the scenario's exit code: 1 if any worker failed.
fn finish(report: &RunReport, log: Option<&Arc<SharedLog>>, opts: &Options) -> i32 {
    if opts.json {
        if let Some(log) = log {
            for record in log.snapshot() {
                if let Ok(line) = serde_json::to_string(&record) {
                    println!("{}", line);
                }
            }
        }
    }

    let records = log.map(|l| l.len()).unwrap_or(0);
    println!(
        "{} {} workers, {} records, {:.2}s elapsed",
        "done:".green().bold(),
        report.outcomes.len(),
        records,
        report.wall.as_secs_f64()
    );

    let failures = report.failures();
    if failures.is_empty() {
        0
    } else {
        for outcome in failures {
            if let Err(msg) = &outcome.result {
                eprintln!("{} worker {:?} failed: {}", error_label(), outcome.name, msg);
            }
        }
        1
    }
}
