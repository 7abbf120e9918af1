// Copyright (c) 2025 Sprocket Contributors
//
// Job record: the scheduler-owned state for a submitted unit of work.
// Shared via `Arc` by the job table, the owning worker's deque slot,
// dependents' dependency sets, and any registered continuations — the record
// is reclaimed once the last of those references drops. Dependencies only
// ever point at earlier-submitted handles, so cycles are structurally
// impossible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::concurrent::SpinLock;
use crate::error::JobError;
use crate::scheduler::continuation::Continuation;

use super::capability::{Job, JobCategory, JobPriority};
use super::dependency::DependencySet;
use super::handle::JobHandle;

/// `submitted ≤ started ≤ finished` once all three are set; `0` means unset.
#[derive(Default)]
struct Timestamps {
    submitted_at: AtomicU64,
    started_at: AtomicU64,
    finished_at: AtomicU64,
}

pub struct JobRecord {
    pub handle: JobHandle,
    pub name: String,
    pub category: JobCategory,
    pub priority: JobPriority,
    pub dependencies: DependencySet,

    complete: std::sync::atomic::AtomicBool,
    running: std::sync::atomic::AtomicBool,
    failed: std::sync::atomic::AtomicBool,
    cancelled: std::sync::atomic::AtomicBool,

    timestamps: Timestamps,
    continuations: SpinLock<Vec<Continuation>>,

    /// Set when `execute` returns `Err` or panics; `None` until completion.
    failure_reason: Mutex<Option<String>>,

    /// The user work object. Taken out (and dropped) by the worker right
    /// before execution, so the record's cached `name`/`category` remain
    /// valid even though the work object itself no longer exists.
    work: Mutex<Option<Box<dyn Job>>>,
}

impl JobRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: JobHandle,
        name: String,
        category: JobCategory,
        priority: JobPriority,
        dependencies: DependencySet,
        work: Box<dyn Job>,
        submitted_at_micros: u64,
    ) -> Self {
        let timestamps = Timestamps::default();
        timestamps.submitted_at.store(submitted_at_micros, Ordering::Relaxed);

        Self {
            handle,
            name,
            category,
            priority,
            dependencies,
            complete: std::sync::atomic::AtomicBool::new(false),
            running: std::sync::atomic::AtomicBool::new(false),
            failed: std::sync::atomic::AtomicBool::new(false),
            cancelled: std::sync::atomic::AtomicBool::new(false),
            timestamps,
            continuations: SpinLock::new(Vec::new()),
            failure_reason: Mutex::new(None),
            work: Mutex::new(Some(work)),
        }
    }

    /// Take the work object out, leaving `None` behind. Returns `None` if
    /// already taken (a job is only ever executed once).
    pub(crate) fn take_work(&self) -> Option<Box<dyn Job>> {
        self.work.lock().unwrap().take()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.failure_reason.lock().unwrap().clone()
    }

    pub fn submitted_at_micros(&self) -> u64 {
        self.timestamps.submitted_at.load(Ordering::Relaxed)
    }

    pub fn started_at_micros(&self) -> u64 {
        self.timestamps.started_at.load(Ordering::Relaxed)
    }

    pub fn finished_at_micros(&self) -> u64 {
        self.timestamps.finished_at.load(Ordering::Relaxed)
    }

    /// Advisory cancellation. No-op once the job has started or completed.
    pub fn cancel(&self) {
        if !self.is_running() && !self.is_complete() {
            self.cancelled.store(true, Ordering::Release);
        }
    }

    /// Mark the record as a cancelled no-op completion: `complete` becomes
    /// true, `running` stays false, `failed` stays false.
    pub(crate) fn complete_as_cancelled(&self, now_micros: u64) {
        self.timestamps.finished_at.store(now_micros, Ordering::Relaxed);
        self.complete.store(true, Ordering::Release);
    }

    pub(crate) fn mark_started(&self, now_micros: u64) {
        self.running.store(true, Ordering::Release);
        self.timestamps.started_at.store(now_micros, Ordering::Relaxed);
    }

    pub(crate) fn mark_finished(&self, now_micros: u64, result: Result<(), JobError>) {
        if let Err(e) = result {
            *self.failure_reason.lock().unwrap() = Some(e.to_string());
            self.failed.store(true, Ordering::Release);
        }
        self.timestamps.finished_at.store(now_micros, Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
        self.complete.store(true, Ordering::Release);
    }

    /// Register a continuation to run once this job completes. If the job is
    /// already complete, returns the continuation back so the caller can
    /// invoke it immediately, outside of any lock.
    pub(crate) fn register_continuation(&self, cont: Continuation) -> Option<Continuation> {
        let mut guard = self.continuations.lock();
        if self.is_complete() {
            drop(guard);
            return Some(cont);
        }
        guard.push(cont);
        None
    }

    /// Drain all registered continuations. The caller is responsible for
    /// invoking each one outside of any lock to avoid recursive deadlocks.
    pub(crate) fn drain_continuations(&self) -> Vec<Continuation> {
        std::mem::take(&mut *self.continuations.lock())
    }
}
