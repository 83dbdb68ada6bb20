//! Handler registry for incoming realtime events
//!
//! Handlers are mpsc senders registered per [`EventKind`]. Registration hands
//! back a [`HandlerId`] which is the only way to remove the handler again.
//! Senders whose receiver has gone away are pruned on the next dispatch.

use super::{EventKind, IncomingEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifies one handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender a handler registers; the handler owns the matching receiver
pub type EventSender = mpsc::UnboundedSender<IncomingEvent>;

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Vec<(HandlerId, EventSender)>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for events of `kind`
    pub fn on(&mut self, kind: EventKind, sender: EventSender) -> HandlerId {
        let id = HandlerId::new();
        debug!("Registered {} handler {}", kind, id);
        self.handlers.entry(kind).or_default().push((id, sender));
        id
    }

    /// Remove a registration; returns whether it existed
    pub fn off(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        for handlers in self.handlers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
        }

        if removed {
            debug!("Removed handler {}", id);
        }
        removed
    }

    /// Deliver `event` to every handler of its kind
    ///
    /// Returns the number of handlers that received it.
    pub fn dispatch(&mut self, event: &IncomingEvent) -> usize {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            trace!("No handler for {}", kind);
            return 0;
        };

        handlers.retain(|(id, sender)| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                debug!("Dropping closed {} handler {}", kind, id);
            }
            alive
        });

        handlers.len()
    }
}
