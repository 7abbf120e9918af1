// Copyright (c) 2025 Sprocket Contributors
//
// Cooperative continuation bridge (C7): lets code waiting on a job handle
// suspend without blocking a worker thread. A continuation is an opaque
// resumable closure — the idiomatic Rust expression of spec §9's "abstract
// coroutine handles as an opaque resumable value with a Resume() operation".
//
// Ordering guarantee: no continuation is resumed before the record's
// `complete` flag would be observable with acquire ordering (registration
// and draining both go through the record's spin lock, and `complete` itself
// is set with release ordering — see job::record), and no continuation is
// ever resumed more than once, since the list is drained with
// `mem::take` under the lock before any resume happens.

use std::sync::Arc;

use crate::job::JobRecord;

/// An opaque resumable value. Boxed `FnOnce` is sufficient here: the core
/// does not require stackful coroutine machinery, only "run this once, off
/// the record's lock, when the job completes."
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Register `cont` to run when `record` completes. If the record is already
/// complete, `cont` runs immediately (outside any lock, per the ordering
/// guarantee above).
pub fn register(record: &Arc<JobRecord>, cont: Continuation) {
    if let Some(cont) = record.register_continuation(cont) {
        cont();
    }
}

/// Drain and resume every continuation registered on `record`, in insertion
/// order. Called by the worker immediately after marking the job complete.
pub fn notify_all(record: &Arc<JobRecord>) {
    for cont in record.drain_continuations() {
        cont();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::JobError;
    use crate::job::{DependencySet, Job, JobCategory, JobHandle, JobPriority};

    struct NoopJob;
    impl Job for NoopJob {
        fn execute(&mut self) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn new_record() -> Arc<JobRecord> {
        Arc::new(JobRecord::new(
            JobHandle::new(1),
            "test-job".to_string(),
            JobCategory::General,
            JobPriority::Normal,
            DependencySet::new(),
            Box::new(NoopJob),
            0,
        ))
    }

    fn complete(record: &Arc<JobRecord>) {
        record.mark_started(0);
        record.mark_finished(1, Ok(()));
    }

    #[test]
    fn register_before_complete_resumes_once_on_completion() {
        let record = new_record();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_clone = ran.clone();
        register(&record, Box::new(move || {
            ran_clone.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(ran.load(Ordering::Relaxed), 0);

        complete(&record);
        notify_all(&record);
        assert_eq!(ran.load(Ordering::Relaxed), 1);

        // A second drain must not resume it again.
        notify_all(&record);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn register_after_complete_resumes_immediately() {
        let record = new_record();
        complete(&record);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        register(&record, Box::new(move || {
            ran_clone.fetch_add(1, Ordering::Relaxed);
        }));

        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn continuations_resume_in_insertion_order() {
        let record = new_record();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            register(&record, Box::new(move || {
                order.lock().unwrap().push(i);
            }));
        }

        complete(&record);
        notify_all(&record);

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
