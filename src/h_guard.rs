//! Test-time leak guard for Rust test suites.
//!
//! Snapshots the current process's threads and resident memory, runs some
//! code, and fails when either grew past the configured limits. Threads are
//! enumerated through `sysinfo`, which only lists them on Linux; elsewhere the
//! thread set is empty and only memory is checked.
//!
//! ```no_run
//! use heapcheck::h_guard::{verify_none, GuardOptions};
//!
//! let opts = GuardOptions::default().max_memory_mb(64);
//! verify_none(&opts, || {
//!     std::thread::spawn(|| ()).join().unwrap();
//! })
//! .expect("no leaks");
//! ```

use crate::h_fmt::{format_bytes, format_signed_bytes};
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};

const MIB: u64 = 1024 * 1024;
/// Growth that [`analyze`] reports as a memory leak.
pub const MEMORY_LEAK_THRESHOLD: u64 = 10 * MIB;
/// Pause before re-measuring in [`Snapshot::compare`].
const COMPARE_PAUSE: Duration = Duration::from_millis(10);

/// Point-in-time view of this process.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub threads: BTreeSet<u32>,
    pub memory_bytes: u64,
    pub taken_at: Instant,
}

/// Change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub thread_growth: i64,
    /// Threads present now but not at the earlier snapshot, ascending.
    pub new_threads: Vec<u32>,
    pub memory_growth_bytes: i64,
    pub elapsed: Duration,
}

impl Snapshot {
    pub fn take() -> Self {
        let mut threads = BTreeSet::new();
        let mut memory_bytes = 0;
        match sysinfo::get_current_pid() {
            Ok(pid) => {
                let mut sys = System::new();
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                if let Some(process) = sys.process(pid) {
                    memory_bytes = process.memory();
                    if let Some(tasks) = process.tasks() {
                        threads.extend(tasks.iter().map(|t| t.as_u32()));
                    }
                }
            }
            Err(e) => log::warn!("cannot identify current process: {}", e),
        }
        Snapshot {
            threads,
            memory_bytes,
            taken_at: Instant::now(),
        }
    }

    /// Measure again and diff against this snapshot.
    pub fn compare(&self) -> SnapshotDiff {
        thread::sleep(COMPARE_PAUSE);
        self.diff(&Snapshot::take())
    }

    /// Pure difference between this snapshot and a later one.
    pub fn diff(&self, later: &Snapshot) -> SnapshotDiff {
        SnapshotDiff {
            thread_growth: later.threads.len() as i64 - self.threads.len() as i64,
            new_threads: later.threads.difference(&self.threads).copied().collect(),
            memory_growth_bytes: later.memory_bytes as i64 - self.memory_bytes as i64,
            elapsed: later.taken_at.saturating_duration_since(self.taken_at),
        }
    }
}

/// Limits for [`verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    pub max_thread_growth: i64,
    /// Zero means unlimited.
    pub max_memory_mb: u64,
    pub settle_time: Duration,
    pub retry_count: usize,
}

impl Default for GuardOptions {
    fn default() -> Self {
        GuardOptions {
            max_thread_growth: 0,
            max_memory_mb: 0,
            settle_time: Duration::from_millis(100),
            retry_count: 3,
        }
    }
}

impl GuardOptions {
    pub fn max_thread_growth(mut self, n: i64) -> Self {
        self.max_thread_growth = n;
        self
    }

    pub fn max_memory_mb(mut self, mb: u64) -> Self {
        self.max_memory_mb = mb;
        self
    }

    pub fn settle_time(mut self, d: Duration) -> Self {
        self.settle_time = d;
        self
    }

    pub fn retry_count(mut self, n: usize) -> Self {
        self.retry_count = n;
        self
    }

    fn thread_ok(&self, diff: &SnapshotDiff) -> bool {
        diff.thread_growth <= self.max_thread_growth
    }

    fn memory_ok(&self, diff: &SnapshotDiff) -> bool {
        self.max_memory_mb == 0 || diff.memory_growth_bytes <= self.max_memory_bytes()
    }

    fn max_memory_bytes(&self) -> i64 {
        self.max_memory_mb.saturating_mul(MIB).min(i64::MAX as u64) as i64
    }
}

/// Judge a diff against the limits, describing every exceeded one.
pub fn evaluate(diff: &SnapshotDiff, opts: &GuardOptions) -> Result<()> {
    let mut problems = Vec::new();
    if !opts.thread_ok(diff) {
        problems.push(format!(
            "thread leak detected: grew by {} (max allowed: {})\n  new threads: {:?}",
            diff.thread_growth, opts.max_thread_growth, diff.new_threads
        ));
    }
    if !opts.memory_ok(diff) {
        problems.push(format!(
            "memory leak detected: grew by {:.2} MB (max allowed: {} MB)",
            diff.memory_growth_bytes as f64 / MIB as f64,
            opts.max_memory_mb
        ));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        bail!("heapcheck: {}", problems.join("\n"))
    }
}

/// Re-measure up to `retry_count` times, pausing `settle_time` before each,
/// and pass as soon as growth is within limits.
pub fn verify(snapshot: &Snapshot, opts: &GuardOptions) -> Result<SnapshotDiff> {
    let attempts = opts.retry_count.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        thread::sleep(opts.settle_time);
        let diff = snapshot.compare();
        if opts.thread_ok(&diff) && opts.memory_ok(&diff) {
            return Ok(diff);
        }
        log::debug!(
            "leak check attempt {}/{}: threads {:+}, memory {}",
            attempt,
            attempts,
            diff.thread_growth,
            format_signed_bytes(diff.memory_growth_bytes)
        );
        last = Some(diff);
    }
    match last {
        Some(diff) => {
            evaluate(&diff, opts)?;
            Ok(diff)
        }
        None => Ok(snapshot.compare()),
    }
}

/// Run `body` between a snapshot and [`verify`].
pub fn verify_none<T, F>(opts: &GuardOptions, body: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let snapshot = Snapshot::take();
    let value = body();
    verify(&snapshot, opts)?;
    Ok(value)
}

/// A snapshot that can be checked repeatedly while a test runs.
#[derive(Debug, Clone)]
pub struct Guard {
    opts: GuardOptions,
    snapshot: Snapshot,
}

impl Guard {
    pub fn new(opts: GuardOptions) -> Self {
        Guard {
            opts,
            snapshot: Snapshot::take(),
        }
    }

    /// Log growth so far under `label`.
    pub fn checkpoint(&self, label: &str) -> SnapshotDiff {
        let diff = self.snapshot.compare();
        log::info!(
            "heapcheck checkpoint [{}]: threads={:+}, memory={}",
            label,
            diff.thread_growth,
            format_signed_bytes(diff.memory_growth_bytes)
        );
        diff
    }

    pub fn verify(&self) -> Result<SnapshotDiff> {
        verify(&self.snapshot, &self.opts)
    }

    /// Start measuring from now.
    pub fn reset(&mut self) {
        self.snapshot = Snapshot::take();
    }

    pub fn diff(&self) -> SnapshotDiff {
        self.snapshot.compare()
    }
}

/// Before/after figures for one [`analyze`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeReport {
    pub thread_start: usize,
    pub thread_end: usize,
    pub thread_growth: i64,
    pub thread_leak: bool,
    pub memory_start_bytes: u64,
    pub memory_end_bytes: u64,
    pub memory_growth_bytes: i64,
    pub memory_leak: bool,
    pub elapsed: Duration,
    pub leaked_count: usize,
}

impl RuntimeReport {
    pub fn from_snapshots(before: &Snapshot, after: &Snapshot) -> Self {
        let diff = before.diff(after);
        RuntimeReport {
            thread_start: before.threads.len(),
            thread_end: after.threads.len(),
            thread_growth: diff.thread_growth,
            thread_leak: diff.thread_growth > 0 && !diff.new_threads.is_empty(),
            memory_start_bytes: before.memory_bytes,
            memory_end_bytes: after.memory_bytes,
            memory_growth_bytes: diff.memory_growth_bytes,
            memory_leak: diff.memory_growth_bytes > MEMORY_LEAK_THRESHOLD as i64,
            elapsed: diff.elapsed,
            leaked_count: diff.new_threads.len(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "threads {} -> {} ({:+}), memory {} -> {} ({})",
            self.thread_start,
            self.thread_end,
            self.thread_growth,
            format_bytes(self.memory_start_bytes),
            format_bytes(self.memory_end_bytes),
            format_signed_bytes(self.memory_growth_bytes)
        )
    }
}

/// Run `body` once and report what it left behind, without failing.
pub fn analyze<F: FnOnce()>(body: F) -> RuntimeReport {
    let before = Snapshot::take();
    body();
    thread::sleep(COMPARE_PAUSE);
    let after = Snapshot::take();
    RuntimeReport::from_snapshots(&before, &after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(threads: &[u32], memory_bytes: u64, at: Instant) -> Snapshot {
        Snapshot {
            threads: threads.iter().copied().collect(),
            memory_bytes,
            taken_at: at,
        }
    }

    #[test]
    fn diff_reports_new_threads_sorted() {
        let t0 = Instant::now();
        let before = snap(&[1, 2], 10 * MIB, t0);
        let after = snap(&[9, 1, 5, 2], 12 * MIB, t0 + Duration::from_millis(5));
        let diff = before.diff(&after);
        assert_eq!(diff.thread_growth, 2);
        assert_eq!(diff.new_threads, vec![5, 9]);
        assert_eq!(diff.memory_growth_bytes, (2 * MIB) as i64);
        assert_eq!(diff.elapsed, Duration::from_millis(5));
    }

    #[test]
    fn default_limits() {
        let opts = GuardOptions::default();
        assert_eq!(opts.max_thread_growth, 0);
        assert_eq!(opts.max_memory_mb, 0);
        assert_eq!(opts.settle_time, Duration::from_millis(100));
        assert_eq!(opts.retry_count, 3);
    }

    #[test]
    fn huge_memory_limit_saturates() {
        let t0 = Instant::now();
        let diff = snap(&[1], 0, t0).diff(&snap(&[1], 4096 * MIB, t0));
        let opts = GuardOptions::default().max_memory_mb(u64::MAX);
        assert_eq!(opts.max_memory_bytes(), i64::MAX);
        assert!(evaluate(&diff, &opts).is_ok());
        assert!(evaluate(&diff, &GuardOptions::default().max_memory_mb(1)).is_err());
    }

    #[test]
    fn evaluate_passes_within_limits() {
        let t0 = Instant::now();
        let diff = snap(&[1], 0, t0).diff(&snap(&[1], 500 * MIB, t0));
        // memory is unlimited by default
        assert!(evaluate(&diff, &GuardOptions::default()).is_ok());
        let shrink = snap(&[1, 2, 3], 0, t0).diff(&snap(&[1], 0, t0));
        assert!(evaluate(&shrink, &GuardOptions::default()).is_ok());
    }

    #[test]
    fn evaluate_reports_thread_growth() {
        let t0 = Instant::now();
        let diff = snap(&[1], 0, t0).diff(&snap(&[1, 7], 0, t0));
        let err = evaluate(&diff, &GuardOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("thread leak detected: grew by 1 (max allowed: 0)"));
        assert!(msg.contains("[7]"));
        assert!(evaluate(&diff, &GuardOptions::default().max_thread_growth(1)).is_ok());
    }

    #[test]
    fn evaluate_reports_both_problems() {
        let t0 = Instant::now();
        let diff = snap(&[1], 0, t0).diff(&snap(&[1, 2], 20 * MIB, t0));
        let opts = GuardOptions::default().max_memory_mb(5);
        let msg = evaluate(&diff, &opts).unwrap_err().to_string();
        assert!(msg.contains("thread leak detected"));
        assert!(msg.contains("memory leak detected: grew by 20.00 MB (max allowed: 5 MB)"));
    }

    #[test]
    fn runtime_report_flags_large_growth() {
        let t0 = Instant::now();
        let before = snap(&[1], MIB, t0);
        let after = snap(&[1, 4], 12 * MIB, t0);
        let report = RuntimeReport::from_snapshots(&before, &after);
        assert_eq!(report.thread_start, 1);
        assert_eq!(report.thread_end, 2);
        assert!(report.thread_leak);
        assert!(report.memory_leak);
        assert_eq!(report.leaked_count, 1);
        assert!(report.summary().contains("threads 1 -> 2 (+1)"));

        let quiet = RuntimeReport::from_snapshots(&before, &snap(&[1], 2 * MIB, t0));
        assert!(!quiet.thread_leak);
        assert!(!quiet.memory_leak);
    }

    #[test]
    fn builder_setters() {
        let opts = GuardOptions::default()
            .max_thread_growth(2)
            .max_memory_mb(64)
            .settle_time(Duration::from_millis(1))
            .retry_count(1);
        assert_eq!(opts.max_thread_growth, 2);
        assert_eq!(opts.max_memory_mb, 64);
        assert_eq!(opts.settle_time, Duration::from_millis(1));
        assert_eq!(opts.retry_count, 1);
    }
}
