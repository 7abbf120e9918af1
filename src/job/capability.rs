// Copyright (c) 2025 Sprocket Contributors
//
// The user work capability. Modeled as a trait object rather than an
// inheritance hierarchy (spec §9): implementations provide `execute`/`name`/
// `category` directly instead of deriving from a base job class.

use crate::error::JobError;

/// Relative scheduling priority. Informational: the core does not currently
/// implement priority-aware placement (see DESIGN.md Open Questions), but
/// the field is carried on every job record for callers and future policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

/// Informational category tag, surfaced through stats/telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobCategory {
    General,
    Render,
    Physics,
    Audio,
    Io,
    Streaming,
    Ai,
    Custom(u32),
}

impl Default for JobCategory {
    fn default() -> Self {
        JobCategory::General
    }
}

/// The unit of work the scheduler executes.
///
/// `execute` runs to completion on a worker thread. It MUST NOT block on the
/// completion of a sibling job handle — a job that needs to wait on another
/// job's result registers a continuation instead (see
/// [`crate::scheduler::continuation`]) and returns.
///
/// A panic raised out of `execute` is caught by the worker and treated
/// identically to a returned `Err`: the job completes with `failed = true`
/// and the panic payload is logged.
pub trait Job: Send {
    /// Run the unit of work. Returning `Err` marks the job failed; dependents
    /// are still considered unblocked (a failed predecessor counts as
    /// complete for dependency-satisfaction purposes).
    fn execute(&mut self) -> Result<(), JobError>;

    /// Human-readable name, captured once at submission time and cached on
    /// the job record for logging/telemetry even after the job object itself
    /// is dropped.
    fn name(&self) -> &str {
        "unnamed-job"
    }

    /// Informational category tag.
    fn category(&self) -> JobCategory {
        JobCategory::General
    }
}

/// Convenience blanket impl so a plain closure can be submitted directly.
impl<F> Job for F
where
    F: FnMut() -> Result<(), JobError> + Send,
{
    fn execute(&mut self) -> Result<(), JobError> {
        self()
    }
}
