// Copyright (c) 2025 Sprocket Contributors
//
// The scheduler: placement, dependency promotion, the worker loop, the
// continuation bridge, and performance counters.

pub mod continuation;
pub mod core;
pub mod stats;
pub mod worker;

pub use continuation::Continuation;
pub use core::{Scheduler, SchedulerConfig, VictimSelection};
pub use stats::{PerformanceStats, WorkerStats};
pub use worker::current;
