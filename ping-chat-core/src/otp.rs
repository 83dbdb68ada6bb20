//! One-time password input
//!
//! Login is two-step: the user service mails a 6-digit code, the user types
//! (or pastes) it back. Codes are validated locally so malformed input never
//! reaches the service. Resending is gated by a countdown.

use crate::{ChatError, Result};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Number of digits in a verification code
pub const OTP_LENGTH: usize = 6;

/// Minimum time between two resend requests
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// A syntactically valid verification code
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Parse typed input: exactly six ASCII digits, surrounding whitespace ignored
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim();
        if code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(ChatError::InvalidOtp(format!(
                "expected {} digits, got {:?}",
                OTP_LENGTH, code
            )))
        }
    }

    /// Parse pasted input: non-digits are dropped, the first six digits kept
    ///
    /// ```rust
    /// use ping_chat_core::otp::OtpCode;
    ///
    /// let code = OtpCode::from_pasted("Your code: 123-456").unwrap();
    /// assert_eq!(code.as_str(), "123456");
    /// ```
    pub fn from_pasted(input: &str) -> Result<Self> {
        let digits: String = input
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(OTP_LENGTH)
            .collect();
        Self::parse(&digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are secrets; keep them out of logs
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Countdown gating the "resend code" action
#[derive(Debug, Clone)]
pub struct ResendCountdown {
    started_at: Instant,
    cooldown: Duration,
}

impl ResendCountdown {
    /// Start a countdown at `now` (a code has just been sent)
    pub fn start(now: Instant) -> Self {
        Self::with_cooldown(now, RESEND_COOLDOWN)
    }

    pub fn with_cooldown(now: Instant, cooldown: Duration) -> Self {
        Self {
            started_at: now,
            cooldown,
        }
    }

    /// Time left before a resend is allowed
    pub fn remaining(&self, now: Instant) -> Duration {
        self.cooldown
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }

    /// Whole seconds left, rounded up, for display
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let remaining = self.remaining(now);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    pub fn can_resend(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Restart after a successful resend
    pub fn restart(&mut self, now: Instant) {
        self.started_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_code() {
        let code = OtpCode::parse(" 042917 ").unwrap();
        assert_eq!(code.as_str(), "042917");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "12345", "1234567", "12a456", "١٢٣٤٥٦"] {
            assert!(
                matches!(OtpCode::parse(input), Err(ChatError::InvalidOtp(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_from_pasted() {
        assert_eq!(
            OtpCode::from_pasted("12 34 56 78").unwrap().as_str(),
            "123456"
        );
        assert!(OtpCode::from_pasted("code: 12-34").is_err());
    }

    #[test]
    fn test_debug_hides_code() {
        let code = OtpCode::parse("123456").unwrap();
        assert!(!format!("{:?}", code).contains("123456"));
    }

    #[test]
    fn test_resend_countdown() {
        let start = Instant::now();
        let mut countdown = ResendCountdown::start(start);

        assert!(!countdown.can_resend(start));
        assert_eq!(countdown.remaining_secs(start), 60);
        assert_eq!(
            countdown.remaining_secs(start + Duration::from_millis(59_500)),
            1
        );
        assert!(countdown.can_resend(start + RESEND_COOLDOWN));

        let later = start + Duration::from_secs(90);
        countdown.restart(later);
        assert!(!countdown.can_resend(later + Duration::from_secs(10)));
    }
}
