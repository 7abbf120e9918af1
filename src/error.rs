// Error taxonomy for the job scheduler core.
//
// Per the propagation policy: a failed `Job::execute` never crosses a thread
// boundary as a thrown error. `JobError` is what user work returns and the
// scheduler only inspects `is_err()` / logs its `Display` impl. `SchedulerError`
// is the narrower surface actually returned to a caller, which is limited to
// configuration validation at construction time.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("scheduler is not running")]
    NotRunning,

    #[error("scheduler already initialized")]
    AlreadyInitialized,

    #[error("scheduler not initialized")]
    NotInitialized,
}

/// Error type returned by [`crate::job::Job::execute`].
///
/// The scheduler treats any `Err` identically to a caught panic: the job
/// transitions to `COMPLETED { failed: true }` and the error is logged.
/// There is no downstream retry mechanism in the core.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn msg(text: impl Into<String>) -> Self {
        JobError::Failed(text.into())
    }
}
