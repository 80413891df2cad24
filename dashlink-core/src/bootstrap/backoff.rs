//! Exponential retry delays

/// Doubling delay, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Backoff {
    base_ms: u32,
    max_ms: u32,
    attempts: u8,
}

impl Backoff {
    pub const fn new(base_ms: u32, max_ms: u32) -> Self {
        Self {
            base_ms,
            max_ms,
            attempts: 0,
        }
    }

    /// Delay for the next attempt, then count it
    ///
    /// `base`, `2 × base`, `4 × base`, … up to `max`.
    pub fn next_delay(&mut self) -> u32 {
        let delay = self.peek();
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Delay the next attempt would get
    pub fn peek(&self) -> u32 {
        let shift = u32::from(self.attempts.min(31));
        let factor = 1u64 << shift;
        (u64::from(self.base_ms) * factor).min(u64::from(self.max_ms)) as u32
    }

    /// Consecutive attempts since the last reset
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
