//! Typing indicator debounce
//!
//! Composer input emits `typing` and (re)arms a one-shot idle timer. When the
//! timer expires `stopTyping` is emitted once. Sending a message stops typing
//! explicitly; changing the selection cancels the timer silently.
//!
//! The debouncer is a plain state machine driven with explicit instants; the
//! owner sleeps until [`TypingDebouncer::deadline`] and then calls
//! [`TypingDebouncer::poll`].

use crate::models::{ChatId, UserId};
use crate::realtime::OutgoingEvent;
use std::time::Duration;
use tokio::time::Instant;

/// Idle time after the last input before typing is considered stopped
pub const TYPING_IDLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct PendingStop {
    user_id: UserId,
    chat_id: ChatId,
    deadline: Instant,
}

impl PendingStop {
    fn into_event(self) -> OutgoingEvent {
        OutgoingEvent::StopTyping {
            user_id: self.user_id,
            chat_id: self.chat_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypingDebouncer {
    idle: Duration,
    pending: Option<PendingStop>,
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(TYPING_IDLE)
    }
}

impl TypingDebouncer {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            pending: None,
        }
    }

    /// Record composer input and return the events to emit
    ///
    /// Input in a different conversation than the pending one stops typing
    /// there first.
    pub fn input(&mut self, user_id: &str, chat_id: &str, now: Instant) -> Vec<OutgoingEvent> {
        let mut events = Vec::with_capacity(2);

        if let Some(pending) = self.pending.take() {
            if pending.chat_id != chat_id || pending.user_id != user_id {
                events.push(pending.into_event());
            }
        }

        events.push(OutgoingEvent::Typing {
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
        });

        self.pending = Some(PendingStop {
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            deadline: now + self.idle,
        });

        events
    }

    /// When the pending stop fires, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Fire the stop event if the idle window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<OutgoingEvent> {
        match &self.pending {
            Some(pending) if now >= pending.deadline => {
                self.pending.take().map(PendingStop::into_event)
            }
            _ => None,
        }
    }

    /// A message was sent: cancel the timer and stop typing now
    pub fn finish(&mut self, user_id: &str, chat_id: &str) -> OutgoingEvent {
        self.pending = None;
        OutgoingEvent::StopTyping {
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    /// Selection changed or the view is torn down: drop the timer
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(chat_id: &str) -> OutgoingEvent {
        OutgoingEvent::StopTyping {
            user_id: "u1".to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    #[test]
    fn test_idle_emits_stop_exactly_once() {
        let start = Instant::now();
        let mut debouncer = TypingDebouncer::default();

        let events = debouncer.input("u1", "c1", start);
        assert_eq!(
            events,
            vec![OutgoingEvent::Typing {
                user_id: "u1".to_string(),
                chat_id: "c1".to_string(),
            }]
        );

        assert_eq!(debouncer.poll(start + Duration::from_millis(1999)), None);
        assert_eq!(debouncer.poll(start + TYPING_IDLE), Some(stop("c1")));
        assert_eq!(debouncer.poll(start + Duration::from_secs(10)), None);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_input_rearms_timer() {
        let start = Instant::now();
        let mut debouncer = TypingDebouncer::default();

        debouncer.input("u1", "c1", start);
        debouncer.input("u1", "c1", start + Duration::from_millis(1500));

        assert_eq!(debouncer.poll(start + TYPING_IDLE), None);
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(3500))
        );
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(3500)),
            Some(stop("c1"))
        );
    }

    #[test]
    fn test_send_stops_and_cancels() {
        let start = Instant::now();
        let mut debouncer = TypingDebouncer::default();

        debouncer.input("u1", "c1", start);
        assert_eq!(debouncer.finish("u1", "c1"), stop("c1"));
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_cancel_is_silent() {
        let start = Instant::now();
        let mut debouncer = TypingDebouncer::default();

        debouncer.input("u1", "c1", start);
        debouncer.cancel();
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_switching_conversation_stops_previous() {
        let start = Instant::now();
        let mut debouncer = TypingDebouncer::default();

        debouncer.input("u1", "c1", start);
        let events = debouncer.input("u1", "c2", start + Duration::from_millis(100));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], stop("c1"));
        assert_eq!(events[1].name(), "typing");
    }
}
