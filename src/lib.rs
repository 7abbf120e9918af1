// Copyright (c) 2025 Sprocket Contributors
//
// Sprocket: a parallel work-stealing job scheduler core for real-time engine
// workloads. Submit units of work with optional dependencies, and the
// scheduler places them on worker-owned deques, promoting dependents once
// their predecessors complete and balancing load through stealing when a
// worker runs dry.
//
// ```no_run
// use sprocket::{JobError, JobPriority, Scheduler, SchedulerConfig};
//
// let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
// let handle = scheduler.submit(
//     || -> Result<(), JobError> {
//         println!("hello from a worker thread");
//         Ok(())
//     },
//     &[],
//     JobPriority::Normal,
// );
// scheduler.wait_for_job(handle);
// scheduler.shutdown();
// ```

pub mod concurrent;
pub mod error;
pub mod global;
pub mod job;
pub mod scheduler;
pub mod time;

pub use error::{JobError, Result, SchedulerError};
pub use job::{DependencySet, Job, JobCategory, JobHandle, JobPriority};
pub use scheduler::{
    Continuation, PerformanceStats, Scheduler, SchedulerConfig, VictimSelection, WorkerStats,
};
