//! Realtime event envelope
//!
//! Events travel as one WebSocket text frame each:
//!
//! ```json
//! {"event": "typing", "data": {"userId": "u1", "chatId": "c1"}}
//! ```
//!
//! [`Envelope`] is the untyped frame; [`OutgoingEvent`] and [`IncomingEvent`]
//! are the typed events the client emits and consumes.
//!
//! # Examples
//!
//! ```
//! use ping_chat_core::realtime::{Envelope, OutgoingEvent};
//!
//! let event = OutgoingEvent::JoinChat { chat_id: "c1".to_string() };
//! let text = event.to_envelope().unwrap().to_text().unwrap();
//!
//! let parsed = Envelope::from_text(&text).unwrap();
//! assert_eq!(parsed.event, "joinChat");
//! assert_eq!(parsed.data["chatId"], "c1");
//! ```

use crate::models::{ChatId, Message, MessageId, UserId};
use crate::{ChatError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One realtime frame: an event name and its JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,

    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize into a text frame
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a text frame
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEvent`] for frames that are not a JSON
    /// object with a non-empty `event` name.
    pub fn from_text(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text.trim())
            .map_err(|e| ChatError::InvalidEvent(format!("malformed frame: {}", e)))?;

        if envelope.event.is_empty() {
            return Err(ChatError::InvalidEvent("frame has no event name".to_string()));
        }

        Ok(envelope)
    }

    /// Decode the payload into `T`
    pub fn data_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            ChatError::InvalidEvent(format!("invalid {} payload: {}", self.event, e))
        })
    }
}

/// Kinds of incoming events handlers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewMessage,
    MessageSeen,
    UserTyping,
    UserStoppedTyping,
    OnlineUsers,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::NewMessage,
        EventKind::MessageSeen,
        EventKind::UserTyping,
        EventKind::UserStoppedTyping,
        EventKind::OnlineUsers,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewMessage => "newMessage",
            EventKind::MessageSeen => "messageSeen",
            EventKind::UserTyping => "userTyping",
            EventKind::UserStoppedTyping => "userStoppedTyping",
            EventKind::OnlineUsers => "getOnlineUser",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Someone saw messages in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenUpdate {
    pub chat_id: ChatId,
    /// Who saw the messages
    pub user_id: UserId,
    /// Messages that were seen; absent means "everything"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ids: Option<Vec<MessageId>>,
}

/// A user started or stopped typing in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomPayload<'a> {
    chat_id: &'a str,
}

/// Events the client emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingEvent {
    Typing { user_id: UserId, chat_id: ChatId },
    StopTyping { user_id: UserId, chat_id: ChatId },
    JoinChat { chat_id: ChatId },
    LeaveChat { chat_id: ChatId },
}

impl OutgoingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutgoingEvent::Typing { .. } => "typing",
            OutgoingEvent::StopTyping { .. } => "stopTyping",
            OutgoingEvent::JoinChat { .. } => "joinChat",
            OutgoingEvent::LeaveChat { .. } => "leaveChat",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope> {
        let data = match self {
            OutgoingEvent::Typing { user_id, chat_id }
            | OutgoingEvent::StopTyping { user_id, chat_id } => {
                serde_json::to_value(TypingUpdate {
                    chat_id: chat_id.clone(),
                    user_id: user_id.clone(),
                })?
            }
            OutgoingEvent::JoinChat { chat_id } | OutgoingEvent::LeaveChat { chat_id } => {
                serde_json::to_value(RoomPayload { chat_id })?
            }
        };

        Ok(Envelope::new(self.name(), data))
    }
}

/// Events the client consumes
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    NewMessage(Message),
    MessageSeen(SeenUpdate),
    UserTyping(TypingUpdate),
    UserStoppedTyping(TypingUpdate),
    /// Full set of online user ids
    OnlineUsers(Vec<UserId>),
}

impl IncomingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            IncomingEvent::NewMessage(_) => EventKind::NewMessage,
            IncomingEvent::MessageSeen(_) => EventKind::MessageSeen,
            IncomingEvent::UserTyping(_) => EventKind::UserTyping,
            IncomingEvent::UserStoppedTyping(_) => EventKind::UserStoppedTyping,
            IncomingEvent::OnlineUsers(_) => EventKind::OnlineUsers,
        }
    }

    /// Decode a typed event from a frame
    ///
    /// Returns `Ok(None)` for event names this client does not handle.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>> {
        let Some(kind) = EventKind::from_name(&envelope.event) else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::NewMessage => {
                let message: Message = envelope.data_as()?;
                message.validate()?;
                IncomingEvent::NewMessage(message)
            }
            EventKind::MessageSeen => IncomingEvent::MessageSeen(envelope.data_as()?),
            EventKind::UserTyping => IncomingEvent::UserTyping(envelope.data_as()?),
            EventKind::UserStoppedTyping => {
                IncomingEvent::UserStoppedTyping(envelope.data_as()?)
            }
            EventKind::OnlineUsers => IncomingEvent::OnlineUsers(envelope.data_as()?),
        };

        Ok(Some(event))
    }
}
