//! Wall-clock pacing primitives: a `timerfd`-backed `Timer` tick source and
//! a `TokenBucket` rate limiter built on top of it.

pub mod error;
pub mod timer;
pub mod token_bucket;

pub use error::{PacingError, Result};
pub use timer::Timer;
pub use token_bucket::TokenBucket;

/// Current monotonic timestamp in nanoseconds, matching the clock source
/// used to arm `Timer` (`CLOCK_MONOTONIC`), so timestamps and tick counts
/// stay comparable.
pub fn now_ns() -> i64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64
}
