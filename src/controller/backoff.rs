//! # Fibonacci Backoff
//!
//! Progressive backoff for failing resources. The sequence grows as
//! `min, min, 2·min, 3·min, 5·min, ...` and is capped at `max`.
//!
//! Each resource keeps its own instance so one failing object never slows
//! down the others.

/// Fibonacci backoff calculator, in seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// A zero minimum is raised to one second
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: min_secs,
        }
    }

    /// Return the next backoff and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let backoff = self.current.min(self.max_secs);
        if self.current < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        backoff
    }

    /// Restart the sequence after a success
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.min_secs;
    }
}
