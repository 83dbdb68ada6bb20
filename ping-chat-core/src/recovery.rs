//! Reconnection policy for the realtime channel
//!
//! Bounded attempts separated by a fixed delay. The strategy is reset after
//! every successful connect, so each outage gets every attempt again.

use std::time::Duration;

/// Maximum number of reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay between reconnection attempts
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Time allowed for a single connection handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Reconnection strategy with a fixed delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectionStrategy {
    /// Current reconnection attempt number
    pub attempt: u32,
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::new(MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY)
    }
}

impl ReconnectionStrategy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            delay,
        }
    }

    /// Reset after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Check if more attempts are available
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Consume one attempt and return the delay to wait before it
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.has_attempts_remaining() {
            return None;
        }

        self.attempt += 1;
        Some(self.delay)
    }

    /// Get human-readable status
    pub fn status(&self) -> String {
        format!(
            "Attempt {}/{}, delay: {:?}",
            self.attempt, self.max_attempts, self.delay
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnection_strategy() {
        let mut strategy = ReconnectionStrategy::default();

        for _ in 0..MAX_RECONNECT_ATTEMPTS {
            assert_eq!(strategy.next_delay(), Some(RECONNECT_DELAY));
        }

        assert!(!strategy.has_attempts_remaining());
        assert_eq!(strategy.next_delay(), None);
        assert_eq!(strategy.status(), "Attempt 5/5, delay: 1s");
    }

    #[test]
    fn test_reconnection_strategy_reset() {
        let mut strategy = ReconnectionStrategy::new(2, Duration::from_millis(10));

        strategy.next_delay();
        strategy.next_delay();
        assert!(!strategy.has_attempts_remaining());

        strategy.reset();
        assert!(strategy.has_attempts_remaining());
        assert_eq!(strategy.attempt, 0);
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let mut strategy = ReconnectionStrategy::new(0, RECONNECT_DELAY);
        assert_eq!(strategy.next_delay(), None);
    }
}
