//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliations. Grows more slowly than
//! exponential backoff, so a SecretMangler whose store writes keep failing is
//! retried regularly without hammering the API server.
//!
//! Sequence with a 5s minimum and 300s maximum:
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max)
//!
//! ```rust
//! use secret_mangler_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_secs(5), Duration::from_secs(300));
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// First delay in seconds (restored on reset)
    min_seconds: u64,
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and capped at `max`
    ///
    /// A zero `min` is raised to one second, otherwise the sequence would
    /// never grow. A `max` below `min` is raised to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_seconds = min.as_secs().max(1);
        Self {
            min_seconds,
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds: max.as_secs().max(min_seconds),
        }
    }

    /// Return the current delay in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;
        let next = self.prev_seconds.saturating_add(self.current_seconds);
        self.prev_seconds = self.current_seconds;
        self.current_seconds = next.min(self.max_seconds);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence, called after a successful reconciliation
    pub fn reset(&mut self) {
        self.prev_seconds = 0;
        self.current_seconds = self.min_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> FibonacciBackoff {
        FibonacciBackoff::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    #[test]
    fn test_fibonacci_backoff_sequence_and_cap() {
        let mut backoff = backoff();
        let sequence: Vec<u64> = (0..13).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(
            sequence,
            vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300, 300, 300]
        );
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = backoff();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_fibonacci_backoff_degenerate_bounds() {
        let mut zero = FibonacciBackoff::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(zero.next_backoff_seconds(), 1);
        assert_eq!(zero.next_backoff_seconds(), 1);
        assert_eq!(zero.next_backoff_seconds(), 1);

        let mut inverted = FibonacciBackoff::new(Duration::from_secs(30), Duration::from_secs(10));
        assert_eq!(inverted.next_backoff_seconds(), 30);
        assert_eq!(inverted.next_backoff_seconds(), 30);
        assert_eq!(inverted.next_backoff_seconds(), 30);
    }
}
