//! Centralized error handling and transient notifications
//!
//! Every failure that reaches the app loop goes through [`ErrorHandler`]:
//! it is logged at a level matching its classification and surfaced to the
//! user as a toast. Nothing here ends the process.

use ping_chat_core::ChatError;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// How long a toast stays visible
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

/// Maximum number of toasts kept at once
const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A transient notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
    pub expires_at: Instant,
}

/// Queue of transient notifications
#[derive(Debug, Clone)]
pub struct Toasts {
    items: VecDeque<Toast>,
    duration: Duration,
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new(TOAST_DURATION)
    }
}

impl Toasts {
    pub fn new(duration: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            duration,
        }
    }

    pub fn push(&mut self, level: ToastLevel, text: impl Into<String>, now: Instant) {
        self.prune(now);
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            level,
            text: text.into(),
            expires_at: now + self.duration,
        });
    }

    pub fn info(&mut self, text: impl Into<String>, now: Instant) {
        self.push(ToastLevel::Info, text, now);
    }

    pub fn success(&mut self, text: impl Into<String>, now: Instant) {
        self.push(ToastLevel::Success, text, now);
    }

    /// Drop expired toasts
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|toast| toast.expires_at > now);
    }

    /// Toasts still visible at `now`
    pub fn visible(&self, now: Instant) -> impl Iterator<Item = &Toast> {
        self.items.iter().filter(move |toast| toast.expires_at > now)
    }

    /// When the earliest visible toast expires
    pub fn next_expiry(&self) -> Option<Instant> {
        self.items.iter().map(|toast| toast.expires_at).min()
    }
}

/// Central error handler for the app loop
#[derive(Debug, Default)]
pub struct ErrorHandler {
    toasts: Toasts,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> &Toasts {
        &self.toasts
    }

    pub fn toasts_mut(&mut self) -> &mut Toasts {
        &mut self.toasts
    }

    /// Log `error`, show it as a toast and report whether the user must log in again
    pub fn handle_error(&mut self, error: &ChatError, context: &str, now: Instant) -> bool {
        if error.is_validation() {
            debug!("Rejected input {}: {}", context, error);
        } else if error.is_recoverable() || error.requires_reauth() {
            warn!("Error {}: {}", context, error);
        } else {
            error!("Error {}: {}", context, error);
        }

        self.toasts
            .push(ToastLevel::Error, error.user_message(), now);

        error.requires_reauth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_expiry() {
        let now = Instant::now();
        let mut toasts = Toasts::default();

        toasts.info("Logged out", now);
        toasts.success("Code sent", now + Duration::from_secs(2));

        assert_eq!(toasts.visible(now + Duration::from_secs(3)).count(), 2);
        assert_eq!(toasts.next_expiry(), Some(now + TOAST_DURATION));

        let later = now + Duration::from_secs(5);
        let visible: Vec<&str> = toasts.visible(later).map(|t| t.text.as_str()).collect();
        assert_eq!(visible, ["Code sent"]);

        toasts.prune(now + Duration::from_secs(10));
        assert_eq!(toasts.next_expiry(), None);
    }

    #[test]
    fn test_toast_capacity() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        for i in 0..8 {
            toasts.info(format!("toast {}", i), now);
        }

        let texts: Vec<&str> = toasts.visible(now).map(|t| t.text.as_str()).collect();
        assert_eq!(texts.len(), MAX_TOASTS);
        assert_eq!(texts[0], "toast 3");
    }

    #[test]
    fn test_handle_error_reports_reauth() {
        let now = Instant::now();
        let mut handler = ErrorHandler::new();

        let relogin = handler.handle_error(
            &ChatError::Unauthorized("jwt expired".to_string()),
            "fetching conversations",
            now,
        );
        assert!(relogin);

        let relogin = handler.handle_error(
            &ChatError::Server {
                status: 400,
                message: "Invalid OTP".to_string(),
            },
            "verifying code",
            now,
        );
        assert!(!relogin);

        let texts: Vec<&str> = handler
            .toasts()
            .visible(now)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(texts, ["Session expired. Please log in again.", "Invalid OTP"]);
        assert!(handler
            .toasts()
            .visible(now)
            .all(|t| t.level == ToastLevel::Error));
    }
}
