// Copyright (c) 2025 Sprocket Contributors
//
// Scheduler core (C5) and public surface (C8): submission, placement,
// dependency promotion, cancellation, wait/wait-all, shutdown, and stats
// snapshots.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::concurrent::{BoundedDeque, PushError, SpinLock};
use crate::error::{Result, SchedulerError};
use crate::job::{DependencySet, Job, JobHandle, JobPriority, JobRecord};
use crate::time;

use super::continuation::{self, Continuation};
use super::stats::{PerformanceStats, WorkerCounters, WorkerStats};
use super::worker;

/// How a worker picks the order in which it probes peers for stealable work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VictimSelection {
    RoundRobin,
    Randomized,
}

/// Scheduler configuration. `Default` gives sane out-of-the-box values;
/// `worker_count: 0` resolves to hardware concurrency at `Scheduler::new`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub max_jobs: usize,
    pub per_worker_queue_capacity: usize,
    pub enable_work_stealing: bool,
    pub steal_victim_selection: VictimSelection,
    pub idle_yield_threshold: u32,
    pub idle_sleep_micros: u64,
    pub wait_timeout_default_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_jobs: 4096,
            per_worker_queue_capacity: 1024,
            enable_work_stealing: true,
            steal_victim_selection: VictimSelection::Randomized,
            idle_yield_threshold: 64,
            idle_sleep_micros: 500,
            wait_timeout_default_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    fn resolved(mut self) -> Result<Self> {
        if self.worker_count == 0 {
            self.worker_count = num_cpus::get().max(1);
        }
        if self.per_worker_queue_capacity == 0
            || !self.per_worker_queue_capacity.is_power_of_two()
        {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "per_worker_queue_capacity must be a power of two, got {}",
                self.per_worker_queue_capacity
            )));
        }
        Ok(self)
    }
}

#[derive(Default)]
struct SchedulerStats {
    jobs_submitted: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_cancelled: AtomicU64,
    total_execution_time_micros: AtomicU64,
    overflow_placements: AtomicU64,
}

type WorkerThreads = Vec<(thread::JoinHandle<()>, mpsc::Receiver<()>)>;

/// Bounded timeout used when waiting for a single worker thread to notice
/// shutdown and return, mirroring the source's per-worker join timeout.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Scheduler {
    pub(crate) config: SchedulerConfig,
    job_table: RwLock<HashMap<u64, Arc<JobRecord>>>,
    pending: SpinLock<Vec<Arc<JobRecord>>>,
    overflow: SpinLock<VecDeque<Arc<JobRecord>>>,
    completed: SpinLock<VecDeque<Arc<JobRecord>>>,

    pub(crate) deques: Vec<Arc<BoundedDeque<Arc<JobRecord>>>>,
    pub(crate) worker_counters: Vec<Arc<WorkerCounters>>,

    job_counter: AtomicU64,
    running: AtomicBool,
    stats: SchedulerStats,
    round_robin_cursor: AtomicUsize,

    threads: Mutex<Option<WorkerThreads>>,
}

impl Scheduler {
    /// Construct and start the scheduler: spawns one worker thread per
    /// configured slot. Equivalent to the source's `Initialize` followed by
    /// `StartWorkers`.
    pub fn new(config: SchedulerConfig) -> Result<Arc<Self>> {
        let config = config.resolved()?;
        let worker_count = config.worker_count;

        let deques: Vec<_> = (0..worker_count)
            .map(|_| Arc::new(BoundedDeque::new(config.per_worker_queue_capacity)))
            .collect();
        let worker_counters: Vec<_> =
            (0..worker_count).map(|id| Arc::new(WorkerCounters::new(id))).collect();

        let scheduler = Arc::new(Scheduler {
            job_table: RwLock::new(HashMap::with_capacity(config.max_jobs)),
            pending: SpinLock::new(Vec::new()),
            overflow: SpinLock::new(VecDeque::new()),
            completed: SpinLock::new(VecDeque::new()),
            deques,
            worker_counters,
            job_counter: AtomicU64::new(1),
            running: AtomicBool::new(true),
            stats: SchedulerStats::default(),
            round_robin_cursor: AtomicUsize::new(0),
            threads: Mutex::new(None),
            config,
        });

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel();
            let sched = scheduler.clone();
            let join = thread::Builder::new()
                .name(format!("sprocket-worker-{id}"))
                .spawn(move || {
                    worker::run(sched, id);
                    let _ = tx.send(());
                })
                .map_err(|e| {
                    SchedulerError::InvalidConfiguration(format!(
                        "failed to spawn worker thread {id}: {e}"
                    ))
                })?;
            handles.push((join, rx));
        }
        *scheduler.threads.lock().unwrap() = Some(handles);

        tracing::info!(
            workers = worker_count,
            max_jobs = scheduler.config.max_jobs,
            "scheduler started"
        );

        Ok(scheduler)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Submit a job with the given dependencies and priority. Returns an
    /// invalid handle if the scheduler is not running.
    pub fn submit<J: Job + 'static>(
        &self,
        job: J,
        deps: &[JobHandle],
        priority: JobPriority,
    ) -> JobHandle {
        if !self.is_running() {
            tracing::error!("submit rejected: scheduler is not running");
            return JobHandle::INVALID;
        }

        let mut job = job;
        let name = job.name().to_string();
        let category = job.category();
        let id = self.job_counter.fetch_add(1, Ordering::Relaxed);
        let handle = JobHandle::new(id);
        let dependencies = DependencySet::from_slice(deps);
        let ready_now = dependencies.is_empty() || dependencies.all_complete(|h| self.is_complete(h));

        let record = Arc::new(JobRecord::new(
            handle,
            name,
            category,
            priority,
            dependencies,
            Box::new(job),
            time::now_micros(),
        ));

        self.job_table.write().insert(id, record.clone());
        self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);

        if ready_now {
            self.place(record);
        } else {
            self.pending.lock().push(record);
        }

        handle
    }

    /// Advisory cancellation: sets the record's `cancelled` flag if the job
    /// has not started running and has not completed. A no-op if the handle
    /// is invalid, unknown, or the job is already running/complete.
    pub fn cancel(&self, handle: JobHandle) {
        if let Some(record) = self.lookup(handle) {
            record.cancel();
        }
    }

    pub fn is_complete(&self, handle: JobHandle) -> bool {
        if !handle.is_valid() {
            return true;
        }
        match self.lookup(handle) {
            Some(record) => record.is_complete(),
            None => true,
        }
    }

    pub fn has_failed(&self, handle: JobHandle) -> bool {
        self.lookup(handle).map(|r| r.has_failed()).unwrap_or(false)
    }

    /// Register `cont` to run once `handle` completes. If `handle` is
    /// invalid, unknown to the job table, or already complete, `cont` runs
    /// immediately on the calling thread.
    pub fn register_continuation(&self, handle: JobHandle, cont: Continuation) {
        match self.lookup(handle) {
            Some(record) => continuation::register(&record, cont),
            None => cont(),
        }
    }

    /// Block the calling thread until `handle` completes, performing useful
    /// scheduler work (dependency promotion, overflow drain) between
    /// attempts instead of purely spinning.
    pub fn wait_for_job(&self, handle: JobHandle) {
        while !self.is_complete(handle) {
            self.try_drain();
            time::yield_now();
        }
    }

    /// As [`Self::wait_for_job`], but gives up after `timeout_ms` and returns
    /// `false`. The deadline is computed once at entry; no spurious timeouts.
    pub fn try_wait_for_job(&self, handle: JobHandle, timeout_ms: u64) -> bool {
        if self.is_complete(handle) {
            return true;
        }
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.is_complete(handle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.try_drain();
            time::yield_now();
        }
    }

    /// As [`Self::try_wait_for_job`], using `config.wait_timeout_default_ms`.
    pub fn try_wait_for_job_default(&self, handle: JobHandle) -> bool {
        self.try_wait_for_job(handle, self.config.wait_timeout_default_ms)
    }

    pub fn wait_for_all(&self) {
        while self.active_job_count() > 0 {
            self.try_drain();
            time::sleep_micros(1_000);
        }
    }

    pub fn active_job_count(&self) -> usize {
        let submitted = self.stats.jobs_submitted.load(Ordering::Relaxed);
        let terminal = self.stats.jobs_succeeded.load(Ordering::Relaxed)
            + self.stats.jobs_failed.load(Ordering::Relaxed)
            + self.stats.jobs_cancelled.load(Ordering::Relaxed);
        submitted.saturating_sub(terminal) as usize
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.lock().len()
    }

    pub fn worker_count(&self) -> usize {
        self.deques.len()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let succeeded = self.stats.jobs_succeeded.load(Ordering::Relaxed);
        let total_exec = self.stats.total_execution_time_micros.load(Ordering::Relaxed);
        PerformanceStats {
            jobs_submitted: self.stats.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: succeeded,
            jobs_failed: self.stats.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.stats.jobs_cancelled.load(Ordering::Relaxed),
            total_execution_time_micros: total_exec,
            average_job_time_micros: if succeeded > 0 { total_exec / succeeded } else { 0 },
            overflow_placements: self.stats.overflow_placements.load(Ordering::Relaxed),
            active_jobs: self.active_job_count() as u64,
        }
    }

    pub fn per_worker_stats(&self) -> Vec<WorkerStats> {
        self.worker_counters.iter().map(|c| c.snapshot()).collect()
    }

    /// Stop accepting useful work, wait for all in-flight jobs to finish,
    /// join worker threads (bounded per-worker timeout), and clear the job
    /// tables.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return; // already shut down
        }

        self.wait_for_all();

        if let Some(handles) = self.threads.lock().unwrap().take() {
            for (join, rx) in handles {
                match rx.recv_timeout(SHUTDOWN_JOIN_TIMEOUT) {
                    Ok(()) => {
                        let _ = join.join();
                    }
                    Err(_) => {
                        tracing::warn!("worker exceeded shutdown timeout, detaching");
                    }
                }
            }
        }

        self.job_table.write().clear();
        self.pending.lock().clear();
        self.overflow.lock().clear();
        self.completed.lock().clear();

        tracing::info!("scheduler shut down");
    }

    fn lookup(&self, handle: JobHandle) -> Option<Arc<JobRecord>> {
        if !handle.is_valid() {
            return None;
        }
        self.job_table.read().get(&handle.id()).cloned()
    }

    /// Place a record on a worker deque, choosing the numerically smallest
    /// index with fewer items than the running median depth (falling back to
    /// the smallest least-loaded index if no worker is below the median),
    /// trying subsequent workers on a race loss, and finally routing to the
    /// overflow queue if every deque is full.
    pub(crate) fn place(&self, mut record: Arc<JobRecord>) {
        let start = self.choose_worker();
        let n = self.deques.len();

        for offset in 0..n {
            let idx = (start + offset) % n;
            match self.deques[idx].push_bottom(record) {
                Ok(()) => return,
                Err(PushError(returned)) => record = returned,
            }
        }

        self.overflow.lock().push_back(record);
        self.stats.overflow_placements.fetch_add(1, Ordering::Relaxed);
    }

    fn choose_worker(&self) -> usize {
        let lens: Vec<usize> = self.deques.iter().map(|d| d.len()).collect();
        let mut sorted = lens.clone();
        sorted.sort_unstable();
        let median = sorted[sorted.len() / 2];

        for (i, &len) in lens.iter().enumerate() {
            if len < median {
                return i;
            }
        }

        lens.iter()
            .enumerate()
            .min_by_key(|&(_, &len)| len)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Move every pending record whose dependencies are now all complete
    /// onto a worker deque.
    pub(crate) fn promote_pending(&self) {
        let ready: Vec<Arc<JobRecord>> = {
            let mut pending = self.pending.lock();
            let mut ready = Vec::new();
            let mut i = 0;
            while i < pending.len() {
                if pending[i].dependencies.all_complete(|h| self.is_complete(h)) {
                    ready.push(pending.remove(i));
                } else {
                    i += 1;
                }
            }
            ready
        };

        for record in ready {
            self.place(record);
        }
    }

    /// One unit of opportunistic scheduler work: promote ready pending jobs,
    /// then move one overflow job back onto a worker deque.
    pub(crate) fn try_drain(&self) {
        self.promote_pending();
        let next = self.overflow.lock().pop_front();
        if let Some(record) = next {
            self.place(record);
        }
    }

    pub(crate) fn push_completed(&self, record: Arc<JobRecord>) {
        self.completed.lock().push_back(record);
    }

    pub(crate) fn record_completion(&self, failed: bool, cancelled: bool, exec_micros: u64) {
        if cancelled {
            self.stats.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
        } else if failed {
            self.stats.jobs_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
            self.stats.total_execution_time_micros.fetch_add(exec_micros, Ordering::Relaxed);
        }
    }

    /// Round-robin starting index for steal-order selection; advances once
    /// per call so repeated victim scans rotate fairly across workers.
    pub(crate) fn next_round_robin_start(&self) -> usize {
        self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % self.deques.len().max(1)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
