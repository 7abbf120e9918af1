// Copyright (c) 2025 Sprocket Contributors
//
// Optional process-wide scheduler facade, for call sites that prefer the
// original's free-function `Init`/`Shutdown` surface over holding an
// `Arc<Scheduler>` explicitly. Both styles are fully supported; this module
// is a thin wrapper around a lazily-settable global instance.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{Result, SchedulerError};
use crate::job::{Job, JobHandle, JobPriority};
use crate::scheduler::{Continuation, PerformanceStats, Scheduler, SchedulerConfig, WorkerStats};

static GLOBAL: OnceCell<Arc<Scheduler>> = OnceCell::new();

/// Initialize the global scheduler. Returns `SchedulerError::AlreadyInitialized`
/// if called more than once.
pub fn init(config: SchedulerConfig) -> Result<()> {
    let scheduler = Scheduler::new(config)?;
    GLOBAL
        .set(scheduler)
        .map_err(|_| SchedulerError::AlreadyInitialized)
}

fn get() -> Result<&'static Arc<Scheduler>> {
    GLOBAL.get().ok_or(SchedulerError::NotInitialized)
}

pub fn submit<J: Job + 'static>(job: J, deps: &[JobHandle], priority: JobPriority) -> Result<JobHandle> {
    Ok(get()?.submit(job, deps, priority))
}

pub fn cancel(handle: JobHandle) -> Result<()> {
    get()?.cancel(handle);
    Ok(())
}

pub fn is_complete(handle: JobHandle) -> Result<bool> {
    Ok(get()?.is_complete(handle))
}

pub fn wait_for_job(handle: JobHandle) -> Result<()> {
    get()?.wait_for_job(handle);
    Ok(())
}

pub fn try_wait_for_job(handle: JobHandle, timeout_ms: u64) -> Result<bool> {
    Ok(get()?.try_wait_for_job(handle, timeout_ms))
}

pub fn wait_for_all() -> Result<()> {
    get()?.wait_for_all();
    Ok(())
}

pub fn register_continuation(handle: JobHandle, cont: Continuation) -> Result<()> {
    get()?.register_continuation(handle, cont);
    Ok(())
}

pub fn performance_stats() -> Result<PerformanceStats> {
    Ok(get()?.performance_stats())
}

pub fn per_worker_stats() -> Result<Vec<WorkerStats>> {
    Ok(get()?.per_worker_stats())
}

/// Shut down the global scheduler in place. A no-op if never initialized.
/// `init` cannot be called again afterward within the same process — the
/// global cell, once set, is never cleared.
pub fn shutdown() -> Result<()> {
    if let Some(scheduler) = GLOBAL.get() {
        scheduler.shutdown();
    }
    Ok(())
}
