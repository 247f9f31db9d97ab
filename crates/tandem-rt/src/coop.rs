// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Single-threaded cooperative engine.
//!
//! Every worker becomes a boxed future polled on the calling thread. The
//! only suspension point is `Sleep`, which registers (deadline, waker) in
//! a min-heap timer queue. When no task is ready the executor sleeps
//! until the earliest deadline, fires the due timers, and resumes — so
//! ordering of records across tasks is fully determined by delay values
//! and wake order, and the run's wall clock tracks the longest task
//! rather than the sum of all of them.

use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::time::{Duration, Instant};

use tandem_core::{ExecMode, SharedLog, WorkerSpec};

use crate::driver::{check_modes, DriverError, RunReport, WorkerOutcome};
use crate::spawn::panic_message;

/// Type-erased worker future. Tasks produce `()`; failures surface as
/// panics caught at the poll site.
type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Deadline-ordered timer queue shared between the executor and every
/// `Sleep` future it hands out.
pub(crate) struct TimerQueue {
    heap: Mutex<BinaryHeap<TimerEntry>>,
    next_seq: Mutex<u64>,
}

struct TimerEntry {
    deadline: Instant,
    /// Registration order, so equal deadlines fire first-come-first-served.
    seq: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse order for min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TimerQueue {
    fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            next_seq: Mutex::new(0),
        }
    }

    fn register(&self, deadline: Instant, waker: Waker) {
        let seq = {
            let mut next = self.next_seq.lock().unwrap();
            let seq = *next;
            *next += 1;
            seq
        };
        self.heap.lock().unwrap().push(TimerEntry {
            deadline,
            seq,
            waker,
        });
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap.lock().unwrap().peek().map(|e| e.deadline)
    }

    /// Wake every entry whose deadline has passed. Returns the number of
    /// timers fired.
    fn fire_due(&self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            let entry = {
                let mut heap = self.heap.lock().unwrap();
                match heap.peek() {
                    Some(e) if e.deadline <= now => heap.pop(),
                    _ => break,
                }
            };
            if let Some(entry) = entry {
                // Wake outside the lock; the waker touches the ready queue.
                entry.waker.wake();
                fired += 1;
            }
        }
        fired
    }

    fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }
}

/// Future that completes once its deadline has passed. Registers with the
/// timer queue on every pending poll.
struct Sleep {
    deadline: Instant,
    timers: Arc<TimerQueue>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= self.deadline {
            Poll::Ready(())
        } else {
            self.timers.register(self.deadline, cx.waker().clone());
            Poll::Pending
        }
    }
}

fn sleep(timers: &Arc<TimerQueue>, duration: Duration) -> Sleep {
    Sleep {
        deadline: Instant::now() + duration,
        timers: timers.clone(),
    }
}

/// The cooperative rendition of the worker loop: same program as
/// `driver::run_loop`, with the suspension point yielding to the executor
/// instead of blocking the thread.
async fn coop_worker(spec: WorkerSpec, log: Arc<SharedLog>, timers: Arc<TimerQueue>) {
    for remaining in (1..=spec.iterations()).rev() {
        sleep(&timers, spec.delay()).await;
        log.append(spec.name(), format!("iterations left: {}", remaining));
    }
}

/// Ready-task indexes. Wakers push here; the executor drains it.
struct ReadyQueue {
    queue: Mutex<VecDeque<usize>>,
}

impl ReadyQueue {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, index: usize) {
        self.queue.lock().unwrap().push_back(index);
    }

    fn pop(&self) -> Option<usize> {
        self.queue.lock().unwrap().pop_front()
    }
}

/// Waker that marks one task ready again.
struct IndexWaker {
    index: usize,
    ready: Arc<ReadyQueue>,
}

impl Wake for IndexWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.push(self.index);
    }
}

/// Run every worker as a cooperative task on the calling thread and block
/// until all complete. Only one task executes at any instant; a panic
/// while polling one task fails that task only.
pub fn run_coop(specs: &[WorkerSpec], log: &Arc<SharedLog>) -> Result<RunReport, DriverError> {
    check_modes(specs, ExecMode::Coroutine)?;

    let timers = Arc::new(TimerQueue::new());
    let start = Instant::now();

    let mut tasks: Vec<Option<TaskFuture>> = specs
        .iter()
        .map(|spec| {
            let fut = coop_worker(spec.clone(), log.clone(), timers.clone());
            Some(Box::pin(fut) as TaskFuture)
        })
        .collect();
    let mut results: Vec<Option<Result<(), String>>> = vec![None; tasks.len()];

    let ready = Arc::new(ReadyQueue::new());
    for index in 0..tasks.len() {
        ready.push(index);
    }

    let mut remaining = tasks.len();
    while remaining > 0 {
        // Poll everything that is ready.
        while let Some(index) = ready.pop() {
            let Some(fut) = tasks[index].as_mut() else {
                continue; // stale wake for a finished task
            };
            let waker = Waker::from(Arc::new(IndexWaker {
                index,
                ready: ready.clone(),
            }));
            let mut cx = Context::from_waker(&waker);
            match catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx))) {
                Ok(Poll::Ready(())) => {
                    tasks[index] = None;
                    results[index] = Some(Ok(()));
                    remaining -= 1;
                }
                Ok(Poll::Pending) => {}
                Err(payload) => {
                    tasks[index] = None;
                    results[index] = Some(Err(panic_message(payload)));
                    remaining -= 1;
                }
            }
        }

        if remaining == 0 {
            break;
        }

        // Nothing ready: sleep until the earliest deadline, then fire.
        match timers.next_deadline() {
            Some(deadline) => {
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                timers.fire_due(Instant::now());
            }
            None => {
                // Pending tasks with no timer to wake them can never
                // progress on a single thread; record them as stalled
                // rather than spinning forever.
                for (index, slot) in tasks.iter_mut().enumerate() {
                    if slot.take().is_some() {
                        results[index] =
                            Some(Err("task stalled with no pending timer".to_string()));
                        remaining -= 1;
                    }
                }
            }
        }
    }

    let outcomes = specs
        .iter()
        .zip(results)
        .map(|(spec, result)| WorkerOutcome {
            name: spec.name().to_string(),
            result: result.unwrap_or(Ok(())),
        })
        .collect();

    Ok(RunReport {
        outcomes,
        wall: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coop_spec(id: u32, name: &str, iterations: u32, delay_ms: u64) -> WorkerSpec {
        WorkerSpec::new(
            id,
            name,
            iterations,
            Duration::from_millis(delay_ms),
            ExecMode::Coroutine,
        )
        .unwrap()
    }

    #[test]
    fn all_records_emitted() {
        let specs = vec![
            coop_spec(1, "Task-A", 3, 2),
            coop_spec(2, "Task-B", 2, 3),
            coop_spec(3, "Task-C", 4, 1),
        ];
        let log = Arc::new(SharedLog::in_memory());
        let report = run_coop(&specs, &log).unwrap();
        assert!(report.all_ok());
        assert_eq!(log.len(), 3 + 2 + 4);
        assert_eq!(log.count_for("Task-A"), 3);
        assert_eq!(log.count_for("Task-B"), 2);
        assert_eq!(log.count_for("Task-C"), 4);
    }

    #[test]
    fn wall_clock_tracks_longest_task_not_sum() {
        // Per-task totals: 5*20=100ms, 5*40=200ms, 4*30=120ms.
        // Concurrent overlap: the run should take ~200ms, not 420ms.
        let specs = vec![
            coop_spec(1, "Task-A", 5, 20),
            coop_spec(2, "Task-B", 5, 40),
            coop_spec(3, "Task-C", 4, 30),
        ];
        let log = Arc::new(SharedLog::in_memory());
        let report = run_coop(&specs, &log).unwrap();
        assert!(report.all_ok());
        assert!(
            report.wall >= Duration::from_millis(190),
            "finished before the longest task could have: {:?}",
            report.wall
        );
        assert!(
            report.wall < Duration::from_millis(350),
            "tasks ran sequentially instead of overlapping: {:?}",
            report.wall
        );
    }

    #[test]
    fn ordering_deterministic_for_fixed_delays() {
        // Deadlines land at 20, 40, 50, 75, 100ms — far enough apart that
        // scheduling jitter cannot reorder them.
        let run = || {
            let specs = vec![
                coop_spec(1, "A", 2, 20),
                coop_spec(2, "B", 2, 50),
                coop_spec(3, "C", 1, 75),
            ];
            let log = Arc::new(SharedLog::in_memory());
            run_coop(&specs, &log).unwrap();
            log.snapshot()
                .into_iter()
                .map(|r| (r.worker, r.message))
                .collect::<Vec<_>>()
        };
        let first = run();
        let workers: Vec<_> = first.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(workers, ["A", "A", "B", "C", "B"]);
        assert_eq!(first, run());
    }

    #[test]
    fn per_task_records_in_sequence() {
        let specs = vec![coop_spec(1, "A", 4, 5), coop_spec(2, "B", 4, 7)];
        let log = Arc::new(SharedLog::in_memory());
        run_coop(&specs, &log).unwrap();

        for name in ["A", "B"] {
            let messages: Vec<_> = log
                .snapshot()
                .into_iter()
                .filter(|r| r.worker == name)
                .map(|r| r.message)
                .collect();
            let expected: Vec<_> = (1..=4)
                .rev()
                .map(|n| format!("iterations left: {}", n))
                .collect();
            assert_eq!(messages, expected);
        }
    }

    #[test]
    fn wrong_mode_rejected() {
        let specs = vec![WorkerSpec::new(
            1,
            "T",
            1,
            Duration::from_millis(1),
            ExecMode::Thread,
        )
        .unwrap()];
        let log = Arc::new(SharedLog::in_memory());
        assert!(matches!(
            run_coop(&specs, &log),
            Err(DriverError::WrongMode { .. })
        ));
    }

    #[test]
    fn timer_queue_fires_in_deadline_order() {
        let timers = TimerQueue::new();
        let ready = Arc::new(ReadyQueue::new());
        let now = Instant::now();

        for (index, offset_ms) in [(0usize, 30u64), (1, 10), (2, 20)] {
            let waker = Waker::from(Arc::new(IndexWaker {
                index,
                ready: ready.clone(),
            }));
            timers.register(now + Duration::from_millis(offset_ms), waker);
        }

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(10)));
        // Fire only what is due at +20ms.
        let fired = timers.fire_due(now + Duration::from_millis(20));
        assert_eq!(fired, 2);
        assert_eq!(ready.pop(), Some(1));
        assert_eq!(ready.pop(), Some(2));
        assert_eq!(ready.pop(), None);
        assert!(!timers.is_empty());
    }

    #[test]
    fn empty_group_returns_immediately() {
        let log = Arc::new(SharedLog::in_memory());
        let report = run_coop(&[], &log).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(log.is_empty());
    }
}
