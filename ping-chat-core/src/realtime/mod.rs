//! Realtime event channel to the chat service
//!
//! - [`event`]: wire envelope and typed events
//! - [`router`]: handler registration and dispatch
//! - [`transport`]: transport traits and the WebSocket implementation
//! - [`channel`]: the long-lived connection task and its handle

pub mod channel;
pub mod event;
pub mod router;
pub mod transport;

pub use channel::{ChannelEvent, RealtimeChannel, RealtimeConfig};
pub use event::{Envelope, EventKind, IncomingEvent, OutgoingEvent, SeenUpdate, TypingUpdate};
pub use router::{EventSender, HandlerId, HandlerRegistry};
pub use transport::{
    connection_url, Transport, TransportFactory, WebSocketTransport, WebSocketTransportFactory,
};
