//! Millisecond timestamps
//!
//! All timestamps in the core are `u32` milliseconds from an arbitrary
//! epoch that wraps roughly every 49.7 days. Every comparison goes through
//! the helpers here so wraparound is handled in one place.

/// Millisecond timestamp
pub type Millis = u32;

/// How far a writer's clock may run ahead of a reader's before the age is
/// treated as a real (wrapped) value instead of zero
pub const CLOCK_SKEW_TOLERANCE_MS: u32 = 50;

/// Milliseconds elapsed from `since` to `now`, modulo 2^32
#[inline]
pub fn elapsed(now: Millis, since: Millis) -> u32 {
    now.wrapping_sub(since)
}

/// Age of a sample stamped at `stamp`, as seen at `now`
///
/// A stamp slightly in the future (within [`CLOCK_SKEW_TOLERANCE_MS`]) has
/// age zero rather than an enormous wrapped age.
#[inline]
pub fn age(now: Millis, stamp: Millis) -> u32 {
    let diff = now.wrapping_sub(stamp);
    if diff > u32::MAX - CLOCK_SKEW_TOLERANCE_MS {
        0
    } else {
        diff
    }
}

/// Check whether `deadline` has been reached at `now`
///
/// Valid while the two instants are less than 2^31 ms apart.
#[inline]
pub fn reached(now: Millis, deadline: Millis) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}
