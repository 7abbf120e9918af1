// Monotonic time source and yield/sleep hooks used by the worker idle protocol.
//
// All timestamps recorded on a job record are microseconds since the first
// call into this module (process-relative, not wall-clock), which keeps the
// hot path to a single `Instant::elapsed` call and sidesteps the UNIX-epoch
// rounding `SystemTime` would require.

use once_cell::sync::Lazy;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Microseconds elapsed since the scheduler's process-relative epoch.
#[inline]
pub fn now_micros() -> u64 {
    EPOCH.elapsed().as_micros() as u64
}

/// Cooperative yield, used between idle-loop iterations before the idle
/// threshold is reached.
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}

/// Bounded sleep, used once a worker has been idle for
/// `idle_yield_threshold` consecutive iterations.
#[inline]
pub fn sleep_micros(micros: u64) {
    std::thread::sleep(std::time::Duration::from_micros(micros));
}
