// Copyright (c) 2025 Sprocket Contributors
//
// Performance counters: scheduler-wide aggregate stats and per-worker
// breakdowns, both exposed as plain snapshot structs so callers never see a
// lock or an atomic.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of scheduler-wide counters, returned by `Scheduler::performance_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub total_execution_time_micros: u64,
    pub average_job_time_micros: u64,
    pub overflow_placements: u64,
    pub active_jobs: u64,
}

/// Live per-worker counters. Most fields are only ever written by the
/// owning worker's own thread; `jobs_stolen_by_others` is the one exception,
/// bumped by whichever thread's steal attempt against this worker succeeds.
pub struct WorkerCounters {
    pub id: usize,
    jobs_executed: AtomicU64,
    jobs_stolen_from_others: AtomicU64,
    jobs_stolen_by_others: AtomicU64,
    steal_attempts: AtomicU64,
    idle_spins: AtomicU64,
}

impl WorkerCounters {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            jobs_executed: AtomicU64::new(0),
            jobs_stolen_from_others: AtomicU64::new(0),
            jobs_stolen_by_others: AtomicU64::new(0),
            steal_attempts: AtomicU64::new(0),
            idle_spins: AtomicU64::new(0),
        }
    }

    pub fn record_executed(&self) {
        self.jobs_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Called by the thief's own counters when a steal against some victim
    /// succeeds.
    pub fn record_stole(&self) {
        self.jobs_stolen_from_others.fetch_add(1, Ordering::Relaxed);
    }

    /// Called on the victim's counters (from the thief's thread) when a
    /// steal against it succeeds.
    pub fn record_stolen_from(&self) {
        self.jobs_stolen_by_others.fetch_add(1, Ordering::Relaxed);
    }

    /// Called on the victim's counters (from the thief's thread) for every
    /// steal attempt, successful or not.
    pub fn record_steal_attempt(&self) {
        self.steal_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_spin(&self) {
        self.idle_spins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            jobs_stolen_from_others: self.jobs_stolen_from_others.load(Ordering::Relaxed),
            jobs_stolen_by_others: self.jobs_stolen_by_others.load(Ordering::Relaxed),
            steal_attempts: self.steal_attempts.load(Ordering::Relaxed),
            idle_spins: self.idle_spins.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    pub id: usize,
    pub jobs_executed: u64,
    pub jobs_stolen_from_others: u64,
    pub jobs_stolen_by_others: u64,
    pub steal_attempts: u64,
    pub idle_spins: u64,
}
