// Copyright (c) 2025 Sprocket Contributors
//
// Integration tests driving the scheduler through a real thread pool.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sprocket::{JobError, JobHandle, JobPriority, Scheduler, SchedulerConfig, VictimSelection};

fn scheduler(config: SchedulerConfig) -> Arc<Scheduler> {
    Scheduler::new(config).expect("scheduler should start")
}

#[test]
fn fan_out_fan_in() {
    let sched = scheduler(SchedulerConfig { worker_count: 4, ..Default::default() });

    let sum = Arc::new(AtomicU32::new(0));
    let mut leaves = Vec::new();
    for i in 0..8u32 {
        let sum = sum.clone();
        let handle = sched.submit(
            move || -> Result<(), JobError> {
                sum.fetch_add(i, Ordering::Relaxed);
                Ok(())
            },
            &[],
            JobPriority::Normal,
        );
        leaves.push(handle);
    }

    let join = sched.submit(|| -> Result<(), JobError> { Ok(()) }, &leaves, JobPriority::Normal);
    sched.wait_for_job(join);

    assert!(sched.is_complete(join));
    assert_eq!(sum.load(Ordering::Relaxed), (0..8).sum::<u32>());

    sched.shutdown();
}

#[test]
fn deque_overflow_routes_through_overflow_queue() {
    let sched = scheduler(SchedulerConfig {
        worker_count: 1,
        per_worker_queue_capacity: 8,
        ..Default::default()
    });

    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..100 {
        let completed = completed.clone();
        handles.push(sched.submit(
            move || -> Result<(), JobError> {
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            &[],
            JobPriority::Normal,
        ));
    }

    for h in handles {
        sched.wait_for_job(h);
    }

    assert_eq!(completed.load(Ordering::Relaxed), 100);
    sched.shutdown();
}

#[test]
fn work_stealing_distributes_across_workers() {
    let sched = scheduler(SchedulerConfig {
        worker_count: 2,
        enable_work_stealing: true,
        steal_victim_selection: VictimSelection::Randomized,
        ..Default::default()
    });

    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..1000 {
        let completed = completed.clone();
        handles.push(sched.submit(
            move || -> Result<(), JobError> {
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            &[],
            JobPriority::Normal,
        ));
    }

    for h in handles {
        sched.wait_for_job(h);
    }

    assert_eq!(completed.load(Ordering::Relaxed), 1000);

    let stats = sched.per_worker_stats();
    let total_stolen: u64 = stats.iter().map(|w| w.jobs_stolen_from_others).sum();
    assert!(total_stolen > 0, "expected at least some jobs to have been stolen");

    sched.shutdown();
}

#[test]
fn failure_does_not_block_dependents() {
    let sched = scheduler(SchedulerConfig { worker_count: 2, ..Default::default() });

    let failing = sched.submit(
        || -> Result<(), JobError> { Err(JobError::msg("boom")) },
        &[],
        JobPriority::Normal,
    );

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();
    let dependent = sched.submit(
        move || -> Result<(), JobError> {
            ran_clone.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
        &[failing],
        JobPriority::Normal,
    );

    sched.wait_for_job(dependent);

    assert!(sched.has_failed(failing));
    assert!(!sched.has_failed(dependent));
    assert_eq!(ran.load(Ordering::Relaxed), 1);

    sched.shutdown();
}

#[test]
fn cancellation_before_run_prevents_execution() {
    let sched = scheduler(SchedulerConfig { worker_count: 2, ..Default::default() });

    let gate = Arc::new(Mutex::new(()));
    let gate_guard = gate.lock().unwrap();
    let gate_clone = gate.clone();

    let sentinel = sched.submit(
        move || -> Result<(), JobError> {
            drop(gate_clone.lock().unwrap());
            Ok(())
        },
        &[],
        JobPriority::Normal,
    );

    let ran = Arc::new(AtomicUsize::new(0));
    let mut dependents = Vec::new();
    for _ in 0..10 {
        let ran = ran.clone();
        dependents.push(sched.submit(
            move || -> Result<(), JobError> {
                ran.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            &[sentinel],
            JobPriority::Normal,
        ));
    }

    for &h in &dependents {
        sched.cancel(h);
    }

    drop(gate_guard);
    sched.wait_for_job(sentinel);
    for h in dependents {
        sched.wait_for_job(h);
    }

    assert_eq!(ran.load(Ordering::Relaxed), 0);
    sched.shutdown();
}

#[test]
fn wait_with_timeout_gives_up_on_a_held_job() {
    let sched = scheduler(SchedulerConfig { worker_count: 1, ..Default::default() });

    let gate = Arc::new(Mutex::new(()));
    let gate_guard = gate.lock().unwrap();
    let gate_clone = gate.clone();

    let slow = sched.submit(
        move || -> Result<(), JobError> {
            drop(gate_clone.lock().unwrap());
            Ok(())
        },
        &[],
        JobPriority::Normal,
    );

    let timed_out = !sched.try_wait_for_job(slow, 50);
    assert!(timed_out);

    drop(gate_guard);
    assert!(sched.try_wait_for_job(slow, 1000));

    sched.shutdown();
}

#[test]
fn nested_submit_from_within_a_running_job() {
    let sched = scheduler(SchedulerConfig { worker_count: 2, ..Default::default() });

    let inner_ran = Arc::new(AtomicUsize::new(0));
    let inner_ran_clone = inner_ran.clone();
    let sched_for_outer = sched.clone();

    let outer = sched.submit(
        move || -> Result<(), JobError> {
            let inner_ran = inner_ran_clone.clone();
            let inner = sched_for_outer.submit(
                move || -> Result<(), JobError> {
                    inner_ran.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                &[],
                JobPriority::Normal,
            );
            sched_for_outer.wait_for_job(inner);
            Ok(())
        },
        &[],
        JobPriority::Normal,
    );

    sched.wait_for_job(outer);
    assert_eq!(inner_ran.load(Ordering::Relaxed), 1);

    sched.shutdown();
}

#[test]
fn shutdown_is_idempotent_and_waits_for_in_flight_work() {
    let sched = scheduler(SchedulerConfig { worker_count: 2, ..Default::default() });
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let done = done.clone();
        sched.submit(
            move || -> Result<(), JobError> {
                std::thread::sleep(Duration::from_millis(1));
                done.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            &[],
            JobPriority::Normal,
        );
    }

    sched.shutdown();
    sched.shutdown();

    assert_eq!(done.load(Ordering::Relaxed), 20);
}

#[test]
fn register_continuation_by_handle_resumes_on_completion() {
    let sched = scheduler(SchedulerConfig { worker_count: 2, ..Default::default() });

    let handle = sched.submit(|| -> Result<(), JobError> { Ok(()) }, &[], JobPriority::Normal);

    let resumed = Arc::new(AtomicUsize::new(0));
    let resumed_clone = resumed.clone();
    sched.register_continuation(handle, Box::new(move || {
        resumed_clone.fetch_add(1, Ordering::Relaxed);
    }));

    sched.wait_for_job(handle);
    // The continuation runs off the worker that completes the job; give it
    // a moment to be resumed if it hasn't already.
    for _ in 0..1000 {
        if resumed.load(Ordering::Relaxed) == 1 {
            break;
        }
        std::thread::yield_now();
    }

    assert_eq!(resumed.load(Ordering::Relaxed), 1);
    sched.shutdown();
}

#[test]
fn register_continuation_on_unknown_handle_resumes_immediately() {
    let sched = scheduler(SchedulerConfig { worker_count: 1, ..Default::default() });

    let resumed = Arc::new(AtomicUsize::new(0));
    let resumed_clone = resumed.clone();
    sched.register_continuation(JobHandle::INVALID, Box::new(move || {
        resumed_clone.fetch_add(1, Ordering::Relaxed);
    }));

    assert_eq!(resumed.load(Ordering::Relaxed), 1);
    sched.shutdown();
}
