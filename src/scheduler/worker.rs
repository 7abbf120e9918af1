// Copyright (c) 2025 Sprocket Contributors
//
// Worker loop (C6): pop from the owned deque, else steal from a peer, else
// promote ready pending jobs and drain overflow, else idle with bounded
// backoff. Execution is wrapped in `catch_unwind` so a panicking job becomes
// a `JobError::Panicked` instead of taking down the worker thread.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use rand::seq::SliceRandom;

use crate::concurrent::{Backoff, Steal};
use crate::error::JobError;
use crate::job::JobRecord;
use crate::time;

use super::continuation;
use super::core::{Scheduler, VictimSelection};

thread_local! {
    static CURRENT_SCHEDULER: RefCell<Option<Weak<Scheduler>>> = const { RefCell::new(None) };
}

/// The scheduler a nested `submit()` call from inside a running job should
/// target. Only set while a worker thread is executing a job.
pub fn current() -> Option<Weak<Scheduler>> {
    CURRENT_SCHEDULER.with(|cell| cell.borrow().clone())
}

struct CurrentGuard(Option<Weak<Scheduler>>);

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT_SCHEDULER.with(|cell| *cell.borrow_mut() = self.0.take());
    }
}

fn set_current(scheduler: &Arc<Scheduler>) -> CurrentGuard {
    let previous = CURRENT_SCHEDULER.with(|cell| {
        cell.borrow_mut().replace(Arc::downgrade(scheduler))
    });
    CurrentGuard(previous)
}

/// Entry point spawned once per worker thread by `Scheduler::new`.
pub fn run(scheduler: Arc<Scheduler>, id: usize) {
    let mut backoff = Backoff::new();
    let counters = scheduler.worker_counters[id].clone();

    while scheduler.is_running() || scheduler.active_job_count() > 0 {
        if let Some(record) = scheduler.deques[id].pop_bottom() {
            backoff.reset();
            execute_one(&scheduler, record, &counters);
            continue;
        }

        if scheduler.config.enable_work_stealing {
            if let Some(record) = try_steal(&scheduler, id) {
                backoff.reset();
                counters.record_stole();
                execute_one(&scheduler, record, &counters);
                continue;
            }
        }

        scheduler.try_drain();

        if let Some(record) = scheduler.deques[id].pop_bottom() {
            backoff.reset();
            execute_one(&scheduler, record, &counters);
            continue;
        }

        counters.record_idle_spin();
        if backoff.should_yield() {
            time::sleep_micros(scheduler.config.idle_sleep_micros);
        } else {
            backoff.spin();
        }

        if !scheduler.is_running() && scheduler.active_job_count() == 0 {
            break;
        }
    }
}

fn try_steal(scheduler: &Arc<Scheduler>, self_id: usize) -> Option<Arc<JobRecord>> {
    let n = scheduler.deques.len();
    if n <= 1 {
        return None;
    }

    let order = victim_order(scheduler, self_id, n);

    for victim in order {
        if victim == self_id {
            continue;
        }
        loop {
            scheduler.worker_counters[victim].record_steal_attempt();
            match scheduler.deques[victim].steal_top() {
                Steal::Success(record) => {
                    scheduler.worker_counters[victim].record_stolen_from();
                    return Some(record);
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }
    None
}

fn victim_order(scheduler: &Arc<Scheduler>, self_id: usize, n: usize) -> Vec<usize> {
    match scheduler.config.steal_victim_selection {
        VictimSelection::RoundRobin => {
            let start = scheduler.next_round_robin_start();
            (0..n).map(|offset| (start + offset) % n).collect()
        }
        VictimSelection::Randomized => {
            let mut order: Vec<usize> = (0..n).filter(|&i| i != self_id).collect();
            order.shuffle(&mut rand::rng());
            order
        }
    }
}

fn execute_one(scheduler: &Arc<Scheduler>, record: Arc<JobRecord>, counters: &Arc<super::stats::WorkerCounters>) {
    if record.is_cancelled() {
        record.complete_as_cancelled(time::now_micros());
        scheduler.record_completion(false, true, 0);
        scheduler.push_completed(record.clone());
        continuation::notify_all(&record);
        return;
    }

    let Some(mut work) = record.take_work() else {
        return; // already executed; defensive against double-placement
    };

    let started = time::now_micros();
    record.mark_started(started);

    let _guard = set_current(scheduler);
    let result = catch_unwind(AssertUnwindSafe(|| work.execute()));
    drop(_guard);

    let outcome = match result {
        Ok(inner) => inner,
        Err(payload) => {
            let message = panic_message(&payload);
            tracing::error!(job = %record.name, panic = %message, "job panicked");
            Err(JobError::Panicked(message))
        }
    };

    let finished = time::now_micros();
    let failed = outcome.is_err();
    if let Err(ref e) = outcome {
        tracing::warn!(job = %record.name, error = %e, "job failed");
    }

    record.mark_finished(finished, outcome);
    counters.record_executed();
    scheduler.record_completion(failed, false, finished.saturating_sub(started));
    scheduler.push_completed(record.clone());
    continuation::notify_all(&record);
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
